//! # Pipeline Models
//!
//! Wire types carried on the two pipeline streams. Both are immutable once
//! published and serialize to the JSON shapes shared with the external source
//! and sink.

pub mod analysis_verdict;
pub mod state_record;

pub use analysis_verdict::{AnalysisVerdict, VerdictStatus};
pub use state_record::StateRecord;
