// SPDX-License-Identifier: MIT OR Apache-2.0

//! Migration-engine collaborators.
//!
//! A migration engine is the external component that tracks which schema
//! migrations have been applied to a database. The administration backend
//! consumes exactly one capability from it: a query that reports the
//! currently applied version, read by
//! [`DbAdmin::get_schema_version`](crate::DbAdmin::get_schema_version).

/// Source of the engine-native query that selects the applied schema version.
pub trait MigrationEngine: Send + Sync {
    /// Return a query selecting the current version string from wherever
    /// this engine stores its migration metadata. The query yields one row
    /// with one string column on a migrated database, and references a table
    /// that does not exist on an unmigrated one.
    fn version_query(&self) -> String;
}

/// Migration engine for databases migrated with Alembic.
///
/// Alembic records the applied revision in a single-row `alembic_version`
/// table.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlembicMigrationEngine;

impl AlembicMigrationEngine {
    /// Create an Alembic migration engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationEngine for AlembicMigrationEngine {
    fn version_query(&self) -> String {
        "SELECT version_num FROM alembic_version".to_owned()
    }
}
