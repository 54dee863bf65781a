//! # Database Persistence Layer
//!
//! Optional Postgres persistence via SQLx. When `DATABASE_URL` is set every
//! catalog write is committed here before it is applied in memory, and each
//! tenant's catalog is hydrated from its schema on first use. When absent
//! the service runs in-memory only.
//!
//! ## Layout
//!
//! One schema per tenant, named after the validated tenant id. The schema
//! and its tables are created on first use with `IF NOT EXISTS` DDL.
//!
//! | Table | Owned by |
//! |-------|----------|
//! | `custom_frameworks` | import / delete |
//! | `custom_framework_level1..3` | import (cascade from framework) |
//! | `cfw_projects` | project upsert |
//! | `custom_framework_projects` | attach / detach |
//! | `custom_framework_implementations` | attach, re-import, updates (cascade from association) |
//!
//! Implementation rows carry no foreign key to tree nodes: re-import
//! replaces tree rows and reconciles implementations in the same
//! transaction.

pub mod frameworks;
pub mod projects;

use cfw_core::TenantId;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::catalog::TenantCatalog;

/// Initialize the connection pool from `DATABASE_URL`, or `None` when unset.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set: running in-memory only mode. \
                 Frameworks and progress will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");
    Ok(Some(pool))
}

/// Schema-qualified table name.
pub(crate) fn table(tenant: &TenantId, name: &str) -> String {
    format!("{}.{name}", tenant.quoted_schema())
}

fn schema_ddl(tenant: &TenantId) -> String {
    let s = tenant.quoted_schema();
    format!(
        r#"
    CREATE SCHEMA IF NOT EXISTS {s};

    CREATE TABLE IF NOT EXISTS {s}.custom_frameworks (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        version TEXT NOT NULL DEFAULT '1.0',
        is_organizational BOOLEAN NOT NULL DEFAULT FALSE,
        hierarchy_type TEXT NOT NULL CHECK (hierarchy_type IN ('two_level', 'three_level')),
        level_1_name TEXT NOT NULL,
        level_2_name TEXT NOT NULL,
        level_3_name TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS {s}.custom_framework_level1 (
        id UUID PRIMARY KEY,
        framework_id UUID NOT NULL REFERENCES {s}.custom_frameworks(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT,
        order_no INTEGER NOT NULL,
        position INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS {s}.custom_framework_level2 (
        id UUID PRIMARY KEY,
        level1_id UUID NOT NULL REFERENCES {s}.custom_framework_level1(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT,
        summary TEXT,
        questions JSONB NOT NULL DEFAULT '[]',
        evidence_examples JSONB NOT NULL DEFAULT '[]',
        order_no INTEGER NOT NULL,
        position INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS {s}.custom_framework_level3 (
        id UUID PRIMARY KEY,
        level2_id UUID NOT NULL REFERENCES {s}.custom_framework_level2(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT,
        order_no INTEGER NOT NULL,
        position INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS {s}.cfw_projects (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        is_organizational BOOLEAN NOT NULL DEFAULT FALSE,
        native_framework_count INTEGER NOT NULL DEFAULT 0,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS {s}.custom_framework_projects (
        project_framework_id UUID PRIMARY KEY,
        project_id UUID NOT NULL REFERENCES {s}.cfw_projects(id) ON DELETE CASCADE,
        framework_id UUID NOT NULL REFERENCES {s}.custom_frameworks(id) ON DELETE RESTRICT,
        added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (project_id, framework_id)
    );

    CREATE TABLE IF NOT EXISTS {s}.custom_framework_implementations (
        id UUID PRIMARY KEY,
        project_framework_id UUID NOT NULL
            REFERENCES {s}.custom_framework_projects(project_framework_id) ON DELETE CASCADE,
        leaf_node_id UUID NOT NULL,
        status TEXT NOT NULL DEFAULT 'Not started',
        owner TEXT,
        reviewer TEXT,
        approver TEXT,
        due_date DATE,
        implementation_details TEXT,
        evidence_links JSONB NOT NULL DEFAULT '[]',
        linked_risks JSONB NOT NULL DEFAULT '[]',
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (project_framework_id, leaf_node_id)
    );

    CREATE INDEX IF NOT EXISTS idx_cfw_level1_framework ON {s}.custom_framework_level1(framework_id);
    CREATE INDEX IF NOT EXISTS idx_cfw_level2_parent ON {s}.custom_framework_level2(level1_id);
    CREATE INDEX IF NOT EXISTS idx_cfw_level3_parent ON {s}.custom_framework_level3(level2_id);
    CREATE INDEX IF NOT EXISTS idx_cfw_projects_framework ON {s}.custom_framework_projects(framework_id);
    "#
    )
}

/// Create the tenant schema and tables if missing.
pub async fn ensure_schema(pool: &PgPool, tenant: &TenantId) -> Result<(), sqlx::Error> {
    let ddl = schema_ddl(tenant);
    sqlx::raw_sql(&ddl).execute(pool).await?;
    Ok(())
}

/// Rebuild a tenant's catalog from its schema.
pub async fn load_catalog(pool: &PgPool, tenant: &TenantId) -> Result<TenantCatalog, sqlx::Error> {
    let frameworks = frameworks::load_all(pool, tenant).await?;
    let projects = projects::load_projects(pool, tenant).await?;
    let associations = projects::load_associations(pool, tenant).await?;
    let implementations = projects::load_implementations(pool, tenant).await?;

    tracing::info!(
        %tenant,
        frameworks = frameworks.len(),
        projects = projects.len(),
        associations = associations.len(),
        implementations = implementations.len(),
        "hydrated tenant catalog from database"
    );

    Ok(TenantCatalog::from_parts(frameworks, projects, associations, implementations))
}

/// Whether `err` is a unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Map a stored value that fails to parse into a decode error.
pub(crate) fn decode_error(column: &str, message: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(format!("column {column}: {message}").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_schema_qualified() {
        let tenant = TenantId::new("acme").unwrap();
        assert_eq!(table(&tenant, "custom_frameworks"), "\"acme\".custom_frameworks");
    }

    #[test]
    fn ddl_targets_the_tenant_schema_only() {
        let tenant = TenantId::new("acme").unwrap();
        let ddl = schema_ddl(&tenant);
        assert!(ddl.contains("CREATE SCHEMA IF NOT EXISTS \"acme\";"));
        assert_eq!(
            ddl.matches("CREATE TABLE IF NOT EXISTS").count(),
            ddl.matches("CREATE TABLE IF NOT EXISTS \"acme\".").count()
        );
        assert!(ddl.contains("ON DELETE RESTRICT"));
    }
}
