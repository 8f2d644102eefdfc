//! Domain error types.

/// Top-level error type for ledgerkeep.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },

    #[error("account adapter error: {reason}")]
    Adapter { reason: String },

    #[error("price data error: {reason}")]
    PriceData { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub(crate) fn missing(section: &str, key: &str) -> Self {
        LedgerError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        LedgerError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&LedgerError> for std::process::ExitCode {
    fn from(err: &LedgerError) -> Self {
        let code: u8 = match err {
            LedgerError::Io(_) => 1,
            LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => 2,
            LedgerError::Adapter { .. } | LedgerError::PriceData { .. } => 3,
            LedgerError::InvalidOrder { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
