//! Project mirror, association and implementation persistence.

use cfw_core::{AssociationId, ImplementationStatus, TenantId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::frameworks::insert_implementation;
use super::{decode_error, table};
use crate::catalog::{AssociationRecord, EvidenceLink, ImplementationRecord, ProjectRecord, RiskRef};

pub async fn upsert_project(pool: &PgPool, tenant: &TenantId, record: &ProjectRecord) -> Result<(), sqlx::Error> {
    let sql = format!(
        "INSERT INTO {} (id, name, is_organizational, native_framework_count, updated_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (id) DO UPDATE SET
             name = EXCLUDED.name,
             is_organizational = EXCLUDED.is_organizational,
             native_framework_count = EXCLUDED.native_framework_count,
             updated_at = EXCLUDED.updated_at",
        table(tenant, "cfw_projects")
    );
    sqlx::query(&sql)
        .bind(record.id.0)
        .bind(&record.name)
        .bind(record.is_organizational)
        .bind(i32::try_from(record.native_framework_count).unwrap_or(i32::MAX))
        .bind(record.updated_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Insert an association and its fan-out in one transaction.
pub async fn attach(
    pool: &PgPool,
    tenant: &TenantId,
    association: &AssociationRecord,
    implementations: &[ImplementationRecord],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    let sql = format!(
        "INSERT INTO {} (project_framework_id, project_id, framework_id, added_at)
         VALUES ($1, $2, $3, $4)",
        table(tenant, "custom_framework_projects")
    );
    sqlx::query(&sql)
        .bind(association.project_framework_id.0)
        .bind(association.project_id.0)
        .bind(association.framework_id.0)
        .bind(association.added_at)
        .execute(&mut *tx)
        .await?;

    for record in implementations {
        insert_implementation(&mut tx, tenant, record).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Delete an association; its implementation rows go by cascade.
pub async fn detach(pool: &PgPool, tenant: &TenantId, association: AssociationId) -> Result<bool, sqlx::Error> {
    let sql = format!(
        "DELETE FROM {} WHERE project_framework_id = $1",
        table(tenant, "custom_framework_projects")
    );
    let result = sqlx::query(&sql).bind(association.0).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_implementation(
    pool: &PgPool,
    tenant: &TenantId,
    record: &ImplementationRecord,
) -> Result<bool, sqlx::Error> {
    let sql = format!(
        "UPDATE {} SET status = $1, owner = $2, reviewer = $3, approver = $4, due_date = $5,
                implementation_details = $6, evidence_links = $7, linked_risks = $8, updated_at = $9
         WHERE id = $10",
        table(tenant, "custom_framework_implementations")
    );
    let result = sqlx::query(&sql)
        .bind(record.status.as_str())
        .bind(&record.owner)
        .bind(&record.reviewer)
        .bind(&record.approver)
        .bind(record.due_date)
        .bind(&record.implementation_details)
        .bind(Json(&record.evidence_links))
        .bind(Json(&record.linked_risks))
        .bind(record.updated_at)
        .bind(record.id.0)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// -- Loading ------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    is_organizational: bool,
    native_framework_count: i32,
    updated_at: DateTime<Utc>,
}

impl ProjectRow {
    fn into_record(self) -> ProjectRecord {
        ProjectRecord {
            id: self.id.into(),
            name: self.name,
            is_organizational: self.is_organizational,
            native_framework_count: u32::try_from(self.native_framework_count).unwrap_or(0),
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AssociationRow {
    project_framework_id: Uuid,
    project_id: Uuid,
    framework_id: Uuid,
    added_at: DateTime<Utc>,
}

impl AssociationRow {
    fn into_record(self) -> AssociationRecord {
        AssociationRecord {
            project_framework_id: self.project_framework_id.into(),
            project_id: self.project_id.into(),
            framework_id: self.framework_id.into(),
            added_at: self.added_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ImplementationRow {
    id: Uuid,
    project_framework_id: Uuid,
    leaf_node_id: Uuid,
    status: String,
    owner: Option<String>,
    reviewer: Option<String>,
    approver: Option<String>,
    due_date: Option<NaiveDate>,
    implementation_details: Option<String>,
    evidence_links: Json<Vec<EvidenceLink>>,
    linked_risks: Json<Vec<RiskRef>>,
    updated_at: DateTime<Utc>,
}

impl ImplementationRow {
    fn into_record(self) -> Result<ImplementationRecord, sqlx::Error> {
        let status: ImplementationStatus = self.status.parse().map_err(|e| decode_error("status", e))?;
        Ok(ImplementationRecord {
            id: self.id.into(),
            project_framework_id: self.project_framework_id.into(),
            leaf_node_id: self.leaf_node_id.into(),
            status,
            owner: self.owner,
            reviewer: self.reviewer,
            approver: self.approver,
            due_date: self.due_date,
            implementation_details: self.implementation_details,
            evidence_links: self.evidence_links.0,
            linked_risks: self.linked_risks.0,
            updated_at: self.updated_at,
        })
    }
}

pub async fn load_projects(pool: &PgPool, tenant: &TenantId) -> Result<Vec<ProjectRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT id, name, is_organizational, native_framework_count, updated_at FROM {}",
        table(tenant, "cfw_projects")
    );
    let rows = sqlx::query_as::<_, ProjectRow>(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(ProjectRow::into_record).collect())
}

pub async fn load_associations(pool: &PgPool, tenant: &TenantId) -> Result<Vec<AssociationRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT project_framework_id, project_id, framework_id, added_at FROM {}",
        table(tenant, "custom_framework_projects")
    );
    let rows = sqlx::query_as::<_, AssociationRow>(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(AssociationRow::into_record).collect())
}

pub async fn load_implementations(pool: &PgPool, tenant: &TenantId) -> Result<Vec<ImplementationRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT id, project_framework_id, leaf_node_id, status, owner, reviewer, approver, due_date,
                implementation_details, evidence_links, linked_risks, updated_at
         FROM {}",
        table(tenant, "custom_framework_implementations")
    );
    let rows = sqlx::query_as::<_, ImplementationRow>(&sql).fetch_all(pool).await?;
    rows.into_iter().map(ImplementationRow::into_record).collect()
}
