use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy '{0}' is locked")]
    Locked(String),

    #[error("unknown policy '{0}'")]
    UnknownPolicy(String),

    #[error("unknown parameter '{section}.{key}' for policy '{policy}'")]
    UnknownParameter {
        policy: String,
        section: String,
        key: String,
    },

    #[error("invalid value for '{parameter}' in policy '{policy}': {reason}")]
    InvalidValue {
        policy: String,
        parameter: String,
        reason: String,
    },

    #[error("locked policy '{policy}' differs from the control document: {detail}")]
    LockedPolicyMismatch { policy: String, detail: String },

    #[error("policy state persistence failed: {0:#}")]
    Persist(anyhow::Error),
}

impl PolicyError {
    /// Refusals caused by a lock, as opposed to bad input or IO.
    pub fn is_locked(&self) -> bool {
        matches!(self, PolicyError::Locked(_))
    }
}
