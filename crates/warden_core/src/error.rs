use miette::Diagnostic;
use thiserror::Error;
use warden_db::DbError;

/// Configuration-specific errors
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(String),

    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Diagnostic, Debug)]
pub enum PolicyError {
    #[error("Invalid verification token")]
    #[diagnostic(
        code(warden_core::invalid_token),
        help("No verification was issued with this token")
    )]
    InvalidToken,

    #[error("Verification token expired")]
    #[diagnostic(
        code(warden_core::token_expired),
        help("Request a new verification; tokens are only valid until their deadline")
    )]
    TokenExpired,

    #[error("Verification token already consumed")]
    #[diagnostic(
        code(warden_core::token_already_consumed),
        help("Tokens are single-use. A retried call may already have consumed this one")
    )]
    TokenAlreadyConsumed,

    #[error("Could not generate a unique verification token after {attempts} attempts")]
    #[diagnostic(code(warden_core::token_generation_failed))]
    TokenGenerationFailed { attempts: u32 },

    #[error("Store unavailable after {attempts} attempt(s): {source}")]
    #[diagnostic(
        code(warden_core::store_unavailable),
        help("The database is busy or unreachable; try again shortly")
    )]
    StoreUnavailable {
        attempts: u32,
        #[source]
        source: DbError,
    },

    #[error("Invalid escalation rule '{rule}': {reason}")]
    #[diagnostic(code(warden_core::invalid_rule))]
    InvalidRule { rule: String, reason: String },

    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(warden_core::invalid_argument))]
    InvalidArgument { field: &'static str, reason: String },

    #[error("Configuration error in {config_path}: field '{field}' expected {expected}")]
    #[diagnostic(
        code(warden_core::configuration_error),
        help("Check the configuration file syntax and values")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: ConfigError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(DbError),
}

impl PolicyError {
    pub fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }
}

impl From<DbError> for PolicyError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            Self::StoreUnavailable {
                attempts: 1,
                source: err,
            }
        } else {
            Self::Store(err)
        }
    }
}

pub type PolicyResult<T> = std::result::Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_db_errors_become_unavailable() {
        let err = PolicyError::from(DbError::unavailable("busy", false));
        assert!(matches!(
            err,
            PolicyError::StoreUnavailable { attempts: 1, .. }
        ));

        let err = PolicyError::from(DbError::invalid_data("bad row"));
        assert!(matches!(err, PolicyError::Store(DbError::InvalidData { .. })));
    }

    #[test]
    fn diagnostic_codes() {
        let err = PolicyError::TokenAlreadyConsumed;
        assert_eq!(
            err.code().map(|c| c.to_string()),
            Some("warden_core::token_already_consumed".to_string())
        );
    }
}
