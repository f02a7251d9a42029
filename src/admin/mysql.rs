// SPDX-License-Identifier: MIT OR Apache-2.0

//! `MySQL` implementation of the administration contract.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::MySqlPool;
use tracing::{debug, info};

use super::substitute::{indirect_substitute, noquote, quoted};
use super::DbAdmin;
use crate::errors::{classify_engine_error, AdminError, EngineErrorKind};
use crate::migrations::MigrationEngine;

/// Administration backend for `MySQL`-family databases.
///
/// Owns one connection pool, the validated target database name, and the
/// migration engine whose version query the schema probe runs. Constructed
/// once per managed database via
/// [`create_mysql_admin`](crate::create_mysql_admin) and shared freely
/// across concurrent callers.
#[derive(Clone)]
pub struct MySqlAdmin {
    pool: MySqlPool,
    database: String,
    engine: Arc<dyn MigrationEngine>,
}

impl MySqlAdmin {
    pub(crate) fn new(pool: MySqlPool, database: String, engine: Arc<dyn MigrationEngine>) -> Self {
        Self {
            pool,
            database,
            engine,
        }
    }

    /// The database this backend administers.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }
}

impl std::fmt::Debug for MySqlAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlAdmin")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// The session gate: an account holding live sessions must not be dropped.
fn ensure_unused(username: &str, session_count: i64) -> Result<(), AdminError> {
    if session_count > 0 {
        return Err(AdminError::ActiveSessions {
            username: username.to_owned(),
            count: session_count,
        });
    }
    Ok(())
}

#[async_trait]
impl DbAdmin for MySqlAdmin {
    async fn write_credentials(&self, username: &str, password: &str) -> Result<(), AdminError> {
        debug!(username, "creating database user");
        indirect_substitute(
            &self.pool,
            "CREATE USER {}@'%' IDENTIFIED BY {}",
            &[quoted(username), quoted(password)],
        )
        .await
        .map_err(|e| AdminError::operation(format!("unable to create new user {username}"), e))?;

        indirect_substitute(
            &self.pool,
            "GRANT SELECT, INSERT, UPDATE, DELETE ON {}.* TO {}",
            &[noquote(self.database.clone()), quoted(username)],
        )
        .await
        .map_err(|e| {
            AdminError::operation(format!("unable to grant permission to new user {username}"), e)
        })?;

        info!(username, database = %self.database, "created scoped database user");
        Ok(())
    }

    async fn list_usernames(&self, prefix: &str) -> Result<Vec<String>, AdminError> {
        let usernames: Vec<String> =
            sqlx::query_scalar("SELECT user FROM mysql.user WHERE user LIKE ?")
                .bind(format!("{prefix}%"))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AdminError::execution("unable to list existing usernames", e))?;

        Ok(usernames)
    }

    async fn verify_unused_and_delete_credentials(
        &self,
        username: &str,
    ) -> Result<(), AdminError> {
        let session_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.processlist WHERE user = ?",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AdminError::execution(
                format!("unable to query session count for user {username}"),
                e,
            )
        })?;

        ensure_unused(username, session_count)?;

        indirect_substitute(&self.pool, "DROP USER {}", &[quoted(username)])
            .await
            .map_err(|e| {
                AdminError::operation(
                    format!("unable to remove user {username} from the database"),
                    e,
                )
            })?;

        info!(username, "removed unused database user");
        Ok(())
    }

    async fn get_schema_version(&self) -> Result<String, AdminError> {
        let query = self.engine.version_query();
        match sqlx::query_scalar::<_, String>(&query)
            .fetch_one(&self.pool)
            .await
        {
            Ok(version) => Ok(version),
            Err(err) => match classify_engine_error(&err) {
                // No migration metadata yet: an unmigrated, likely empty
                // database, reported as such rather than as a failure.
                EngineErrorKind::MissingTable => Ok(String::new()),
                EngineErrorKind::Other => {
                    Err(AdminError::execution("unable to read schema version", err))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_gate_blocks_drop_while_sessions_remain() {
        let err = ensure_unused("svc_a", 1).expect_err("one session should block removal");
        assert!(err.is_temporary());
        assert_eq!(
            err.to_string(),
            "unable to remove user svc_a, 1 active sessions remaining"
        );
    }

    #[test]
    fn session_gate_reports_the_session_count() {
        let err = ensure_unused("svc_batch", 7).expect_err("sessions should block removal");
        assert!(matches!(
            err,
            AdminError::ActiveSessions { count: 7, ref username } if username == "svc_batch"
        ));
    }

    #[test]
    fn session_gate_opens_at_zero() {
        assert!(ensure_unused("svc_a", 0).is_ok());
    }
}
