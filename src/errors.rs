// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for administration operations.
//!
//! Every error the backend returns is one of a small set of structured
//! variants. Callers inspect exactly one property, [`AdminError::is_temporary`]:
//! temporary conditions (an account still holding live sessions) are expected
//! to clear on their own and should be retried by the reconciliation loop;
//! everything else requires intervention. Raw driver errors are never
//! surfaced unwrapped.

use thiserror::Error;

/// `MySQL` error code raised when a referenced table does not exist
/// (`ER_NO_SUCH_TABLE`).
pub(crate) const ER_NO_SUCH_TABLE: u16 = 1146;

/// Errors produced by the administration backend.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The connection descriptor failed validation. Raised before any
    /// connection attempt; retrying without fixing the configuration
    /// cannot succeed.
    #[error("invalid connection configuration: {reason}")]
    Config {
        /// What the descriptor is missing or malformed about
        reason: String,
    },

    /// A substitution template's placeholder count does not match the number
    /// of supplied values. Developer error in the statement shape.
    #[error("substitution template expects {expected} values, {actual} supplied")]
    Template {
        /// Placeholders present in the template
        expected: usize,
        /// Values supplied by the caller
        actual: usize,
    },

    /// A statement, scan, or transaction step failed. Permanent unless the
    /// underlying condition is separately recognized as retryable.
    #[error("{context}: {source}")]
    Execution {
        /// Which operation and subject identifier failed
        context: String,
        /// The wrapped driver error
        #[source]
        source: sqlx::Error,
    },

    /// A lifecycle operation failed part-way; wraps the failing sub-step so
    /// the message names both the operation and the account it concerned.
    #[error("{context}: {source}")]
    Operation {
        /// Which operation and account failed
        context: String,
        /// The failing sub-step
        #[source]
        source: Box<AdminError>,
    },

    /// The account still owns live sessions and was not dropped. Temporary:
    /// the caller should retry once the sessions drain.
    #[error("unable to remove user {username}, {count} active sessions remaining")]
    ActiveSessions {
        /// Account that was to be removed
        username: String,
        /// Sessions currently attached to it
        count: i64,
    },
}

impl AdminError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub(crate) fn execution(context: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Execution {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn operation(context: impl Into<String>, source: AdminError) -> Self {
        Self::Operation {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether the condition is expected to clear without intervention.
    ///
    /// Temporary errors should be rescheduled by the caller rather than
    /// escalated; the retry policy itself lives in the reconciliation loop.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        match self {
            Self::ActiveSessions { .. } => true,
            Self::Operation { source, .. } => source.is_temporary(),
            Self::Config { .. } | Self::Template { .. } | Self::Execution { .. } => false,
        }
    }
}

/// Domain outcome of an engine-native error code.
///
/// The mapping from raw `MySQL` error numbers to domain outcomes is kept in
/// one place so new tolerated codes are added here, not in scattered
/// conditionals at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// The referenced table has never been created
    MissingTable,
    /// Any other engine failure
    Other,
}

/// Map a raw `MySQL` error number to its domain outcome.
#[must_use]
pub fn engine_error_kind(code: u16) -> EngineErrorKind {
    match code {
        ER_NO_SUCH_TABLE => EngineErrorKind::MissingTable,
        _ => EngineErrorKind::Other,
    }
}

/// Classify a driver error by its engine-native error code, when it has one.
pub(crate) fn classify_engine_error(err: &sqlx::Error) -> EngineErrorKind {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(mysql_err) = db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
            return engine_error_kind(mysql_err.number());
        }
    }
    EngineErrorKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_code_maps_to_missing_table() {
        assert_eq!(engine_error_kind(1146), EngineErrorKind::MissingTable);
    }

    #[test]
    fn other_codes_map_to_other() {
        // 1064 is a syntax error, 1045 an access-denied error
        assert_eq!(engine_error_kind(1064), EngineErrorKind::Other);
        assert_eq!(engine_error_kind(1045), EngineErrorKind::Other);
        assert_eq!(engine_error_kind(0), EngineErrorKind::Other);
    }

    #[test]
    fn active_sessions_is_temporary() {
        let err = AdminError::ActiveSessions {
            username: "svc_a".to_owned(),
            count: 3,
        };
        assert!(err.is_temporary());
        assert_eq!(
            err.to_string(),
            "unable to remove user svc_a, 3 active sessions remaining"
        );
    }

    #[test]
    fn config_and_template_are_permanent() {
        assert!(!AdminError::config("missing password").is_temporary());
        assert!(!AdminError::Template {
            expected: 2,
            actual: 1
        }
        .is_temporary());
    }

    #[test]
    fn operation_wrapper_preserves_classification() {
        let temporary = AdminError::operation(
            "unable to remove user svc_a from the database",
            AdminError::ActiveSessions {
                username: "svc_a".to_owned(),
                count: 1,
            },
        );
        assert!(temporary.is_temporary());

        let permanent = AdminError::operation(
            "unable to create new user svc_a",
            AdminError::config("bad descriptor"),
        );
        assert!(!permanent.is_temporary());
    }

    #[test]
    fn operation_message_names_operation_and_cause() {
        let err = AdminError::operation(
            "unable to create new user svc_a",
            AdminError::Template {
                expected: 2,
                actual: 3,
            },
        );
        assert_eq!(
            err.to_string(),
            "unable to create new user svc_a: substitution template expects 2 values, 3 supplied"
        );
    }
}
