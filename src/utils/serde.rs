/*!
 * Serde helpers shared by the wire models.
 */

use serde::{Deserialize, Deserializer};

/// Deserialize a field that may be `null`, falling back to the type's default.
///
/// Pair with `#[serde(default)]` so an omitted field also takes the default.
/// A value of the wrong type is still an error.
///
/// ```rust
/// use serde::Deserialize;
/// use statewatch::utils::serde::deserialize_null_as_default;
///
/// #[derive(Deserialize)]
/// struct Sample {
///     #[serde(default, deserialize_with = "deserialize_null_as_default")]
///     message: String,
/// }
///
/// let sample: Sample = serde_json::from_str(r#"{"message": null}"#).unwrap();
/// assert_eq!(sample.message, "");
/// ```
pub fn deserialize_null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct TestStruct {
        #[serde(default, deserialize_with = "deserialize_null_as_default")]
        count: i64,
        #[serde(default, deserialize_with = "deserialize_null_as_default")]
        label: String,
    }

    #[test]
    fn test_present_values_are_kept() {
        let result: TestStruct = serde_json::from_str(r#"{"count": 3, "label": "x"}"#).unwrap();
        assert_eq!(
            result,
            TestStruct {
                count: 3,
                label: "x".to_string()
            }
        );
    }

    #[test]
    fn test_null_and_missing_take_default() {
        let result: TestStruct = serde_json::from_str(r#"{"count": null}"#).unwrap();
        assert_eq!(
            result,
            TestStruct {
                count: 0,
                label: String::new()
            }
        );
    }

    #[test]
    fn test_wrong_type_is_error() {
        let result: Result<TestStruct, _> = serde_json::from_str(r#"{"label": 5}"#);
        assert!(result.is_err());
    }
}
