use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] tickerforge_core::ValidationError),

    /// The run marked more records for removal than the configured limit
    /// allows; nothing was persisted.
    #[error(transparent)]
    Safety(#[from] tickerforge_core::SafetyViolation),

    #[error(transparent)]
    Warehouse(#[from] tickerforge_warehouse::WarehouseError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Safety(_) => 4,
            Self::Warehouse(_) | Self::Command(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickerforge_core::SafetyViolation;

    #[test]
    fn safety_violation_has_distinguished_exit_code() {
        let error = CliError::from(SafetyViolation {
            removed: 26,
            limit: 25,
        });
        assert_eq!(error.exit_code(), 4);

        let other = CliError::Command(String::from("boom"));
        assert_ne!(error.exit_code(), other.exit_code());
    }
}
