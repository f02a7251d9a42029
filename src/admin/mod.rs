// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database administration abstraction.
//!
//! [`DbAdmin`] is the contract the reconciliation controller drives. It is
//! engine-agnostic: the `MySQL` implementation lives in [`mysql`], and other
//! engines implement the same four operations. Each operation manages its
//! own transaction; callers never pass one in.

use async_trait::async_trait;

use crate::errors::AdminError;

pub mod factory;
pub mod mysql;

mod substitute;

/// Core administration trait implemented per database engine.
#[async_trait]
pub trait DbAdmin: Send + Sync {
    /// Create an account and grant it `SELECT, INSERT, UPDATE, DELETE` on
    /// the backend's configured database, connectable from any host.
    ///
    /// The create and grant run as two sequential statements. If the create
    /// succeeds and the grant fails, the account exists without grants; the
    /// returned error names the grant step and remediation is left to the
    /// caller's reconciliation.
    async fn write_credentials(&self, username: &str, password: &str) -> Result<(), AdminError>;

    /// Return all account names beginning with `prefix`.
    ///
    /// Ordering is whatever the engine's catalog returns. No matches is an
    /// empty vector, not an error.
    async fn list_usernames(&self, prefix: &str) -> Result<Vec<String>, AdminError>;

    /// Drop an account, but only if no live sessions belong to it.
    ///
    /// When sessions are still attached the account is left untouched and a
    /// temporary [`AdminError::ActiveSessions`] is returned carrying the
    /// session count; the caller retries after the sessions drain. The
    /// session check always precedes the drop.
    async fn verify_unused_and_delete_credentials(&self, username: &str)
        -> Result<(), AdminError>;

    /// Read the currently applied schema version via the migration engine's
    /// probe query.
    ///
    /// A database whose migration-metadata table has never been created
    /// reads as the empty string, not an error.
    async fn get_schema_version(&self) -> Result<String, AdminError>;
}
