use proptest::prelude::*;
use statewatch::{AnalysisVerdict, StateRecord, VerdictStatus};

/// Strategy for free-text diagnostics, including empty and non-ASCII text
pub fn message_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[a-zA-Z0-9 .,:/_-]{0,120}",
        any::<String>(),
    ]
}

/// Strategy for arbitrary state records
pub fn state_record_strategy() -> impl Strategy<Value = StateRecord> {
    (any::<i64>(), "[a-zA-Z0-9 ]{0,40}", any::<bool>(), message_strategy())
        .prop_map(|(id, name, is_healthy, message)| {
            StateRecord::new(id, name, is_healthy, message)
        })
}

/// Strategy for arbitrary verdicts
pub fn verdict_strategy() -> impl Strategy<Value = AnalysisVerdict> {
    (
        any::<i64>(),
        prop_oneof![Just(VerdictStatus::Ok), Just(VerdictStatus::Issue)],
        message_strategy(),
    )
        .prop_map(|(id, status, message)| AnalysisVerdict::new(id, status, message))
}
