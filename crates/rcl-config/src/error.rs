use thiserror::Error;

/// A control document (or a single policy edit) that cannot be accepted.
///
/// Always fatal for the operation that produced it; callers never fall back
/// to defaults.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("control document does not match schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("unsupported control document version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("{0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn out_of_range(
        field: impl Into<String>,
        value: impl ToString,
        expected: &'static str,
    ) -> Self {
        ConfigError::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            expected,
        }
    }
}

/// Range helper: `lo < v <= hi` unless `inclusive_lo`.
pub(crate) fn check_range(
    field: &str,
    v: f64,
    lo: f64,
    hi: f64,
    inclusive_lo: bool,
    expected: &'static str,
) -> Result<(), ConfigError> {
    let lo_ok = if inclusive_lo { v >= lo } else { v > lo };
    if !v.is_finite() || !lo_ok || v > hi {
        return Err(ConfigError::out_of_range(field, v, expected));
    }
    Ok(())
}
