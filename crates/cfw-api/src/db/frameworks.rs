//! Framework and tree persistence.
//!
//! An import is one transaction: upsert the framework row by name, replace
//! every tree row, then reconcile implementation rows of attached projects.

use std::collections::HashMap;

use cfw_core::{FrameworkId, HierarchyType, TenantId};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{decode_error, table};
use crate::catalog::import::ImportPlan;
use crate::catalog::{
    CategoryNode, ControlNode, FrameworkEntry, FrameworkRecord, ImplementationRecord, SubControlNode,
};

/// Outcome of writing an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportWrite {
    Written,
    /// The name belongs to a framework this process has not seen; nothing
    /// was written.
    NameTakenBy(FrameworkId),
}

fn position(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

/// Persist an import plan atomically.
pub async fn write_import(
    pool: &PgPool,
    tenant: &TenantId,
    plan: &ImportPlan,
) -> Result<ImportWrite, sqlx::Error> {
    let record = &plan.framework.record;
    let mut tx = pool.begin().await?;

    let sql = format!(
        "INSERT INTO {} (id, name, description, version, is_organizational, hierarchy_type,
                         level_1_name, level_2_name, level_3_name, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (name) DO UPDATE SET
             description = EXCLUDED.description,
             version = EXCLUDED.version,
             is_organizational = EXCLUDED.is_organizational,
             hierarchy_type = EXCLUDED.hierarchy_type,
             level_1_name = EXCLUDED.level_1_name,
             level_2_name = EXCLUDED.level_2_name,
             level_3_name = EXCLUDED.level_3_name,
             updated_at = EXCLUDED.updated_at
         RETURNING id",
        table(tenant, "custom_frameworks")
    );
    let stored: Uuid = sqlx::query_scalar(&sql)
        .bind(record.id.0)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.version)
        .bind(record.is_organizational)
        .bind(record.hierarchy_type.as_str())
        .bind(&record.level_1_name)
        .bind(&record.level_2_name)
        .bind(&record.level_3_name)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&mut *tx)
        .await?;

    if stored != record.id.0 {
        tx.rollback().await?;
        return Ok(ImportWrite::NameTakenBy(FrameworkId(stored)));
    }

    let sql = format!("DELETE FROM {} WHERE framework_id = $1", table(tenant, "custom_framework_level1"));
    sqlx::query(&sql).bind(record.id.0).execute(&mut *tx).await?;

    insert_tree(&mut tx, tenant, record.id, &plan.framework.structure).await?;

    if !plan.purged.is_empty() {
        let ids: Vec<Uuid> = plan.purged.iter().map(|id| id.0).collect();
        let sql = format!(
            "DELETE FROM {} WHERE id = ANY($1)",
            table(tenant, "custom_framework_implementations")
        );
        sqlx::query(&sql).bind(&ids).execute(&mut *tx).await?;
    }
    for implementation in &plan.created {
        insert_implementation(&mut tx, tenant, implementation).await?;
    }

    tx.commit().await?;
    Ok(ImportWrite::Written)
}

async fn insert_tree(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    framework: FrameworkId,
    structure: &[CategoryNode],
) -> Result<(), sqlx::Error> {
    let level1 = format!(
        "INSERT INTO {} (id, framework_id, title, description, order_no, position)
         VALUES ($1, $2, $3, $4, $5, $6)",
        table(tenant, "custom_framework_level1")
    );
    let level2 = format!(
        "INSERT INTO {} (id, level1_id, title, description, summary, questions,
                         evidence_examples, order_no, position)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        table(tenant, "custom_framework_level2")
    );
    let level3 = format!(
        "INSERT INTO {} (id, level2_id, title, description, order_no, position)
         VALUES ($1, $2, $3, $4, $5, $6)",
        table(tenant, "custom_framework_level3")
    );

    for (i, category) in structure.iter().enumerate() {
        sqlx::query(&level1)
            .bind(category.id.0)
            .bind(framework.0)
            .bind(&category.title)
            .bind(&category.description)
            .bind(category.order_no)
            .bind(position(i))
            .execute(&mut **tx)
            .await?;

        for (j, control) in category.items.iter().enumerate() {
            sqlx::query(&level2)
                .bind(control.id.0)
                .bind(category.id.0)
                .bind(&control.title)
                .bind(&control.description)
                .bind(&control.summary)
                .bind(Json(&control.questions))
                .bind(Json(&control.evidence_examples))
                .bind(control.order_no)
                .bind(position(j))
                .execute(&mut **tx)
                .await?;

            for (k, sub) in control.items.iter().enumerate() {
                sqlx::query(&level3)
                    .bind(sub.id.0)
                    .bind(control.id.0)
                    .bind(&sub.title)
                    .bind(&sub.description)
                    .bind(sub.order_no)
                    .bind(position(k))
                    .execute(&mut **tx)
                    .await?;
            }
        }
    }
    Ok(())
}

pub(crate) async fn insert_implementation(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    record: &ImplementationRecord,
) -> Result<(), sqlx::Error> {
    let sql = format!(
        "INSERT INTO {} (id, project_framework_id, leaf_node_id, status, owner, reviewer, approver,
                         due_date, implementation_details, evidence_links, linked_risks, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        table(tenant, "custom_framework_implementations")
    );
    sqlx::query(&sql)
        .bind(record.id.0)
        .bind(record.project_framework_id.0)
        .bind(record.leaf_node_id.0)
        .bind(record.status.as_str())
        .bind(&record.owner)
        .bind(&record.reviewer)
        .bind(&record.approver)
        .bind(record.due_date)
        .bind(&record.implementation_details)
        .bind(Json(&record.evidence_links))
        .bind(Json(&record.linked_risks))
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Delete a framework; its tree goes with it by cascade.
///
/// Attached frameworks are refused by the `RESTRICT` foreign key as well as
/// by the catalog.
pub async fn delete(pool: &PgPool, tenant: &TenantId, id: FrameworkId) -> Result<bool, sqlx::Error> {
    let sql = format!("DELETE FROM {} WHERE id = $1", table(tenant, "custom_frameworks"));
    let result = sqlx::query(&sql).bind(id.0).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

// -- Loading ------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct FrameworkRow {
    id: Uuid,
    name: String,
    description: String,
    version: String,
    is_organizational: bool,
    hierarchy_type: String,
    level_1_name: String,
    level_2_name: String,
    level_3_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FrameworkRow {
    fn into_record(self) -> Result<FrameworkRecord, sqlx::Error> {
        let hierarchy_type: HierarchyType = self
            .hierarchy_type
            .parse()
            .map_err(|e| decode_error("hierarchy_type", e))?;
        Ok(FrameworkRecord {
            id: FrameworkId(self.id),
            name: self.name,
            description: self.description,
            version: self.version,
            is_organizational: self.is_organizational,
            hierarchy_type,
            level_1_name: self.level_1_name,
            level_2_name: self.level_2_name,
            level_3_name: self.level_3_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct Level1Row {
    id: Uuid,
    framework_id: Uuid,
    title: String,
    description: Option<String>,
    order_no: i32,
}

#[derive(sqlx::FromRow)]
struct Level2Row {
    id: Uuid,
    level1_id: Uuid,
    title: String,
    description: Option<String>,
    summary: Option<String>,
    questions: Json<Vec<String>>,
    evidence_examples: Json<Vec<String>>,
    order_no: i32,
}

#[derive(sqlx::FromRow)]
struct Level3Row {
    id: Uuid,
    level2_id: Uuid,
    title: String,
    description: Option<String>,
    order_no: i32,
}

/// Every framework with its tree, in stored display order.
pub async fn load_all(pool: &PgPool, tenant: &TenantId) -> Result<Vec<FrameworkEntry>, sqlx::Error> {
    let sql = format!(
        "SELECT id, name, description, version, is_organizational, hierarchy_type,
                level_1_name, level_2_name, level_3_name, created_at, updated_at
         FROM {} ORDER BY name",
        table(tenant, "custom_frameworks")
    );
    let frameworks = sqlx::query_as::<_, FrameworkRow>(&sql).fetch_all(pool).await?;

    let sql = format!(
        "SELECT id, framework_id, title, description, order_no FROM {} ORDER BY position",
        table(tenant, "custom_framework_level1")
    );
    let level1 = sqlx::query_as::<_, Level1Row>(&sql).fetch_all(pool).await?;

    let sql = format!(
        "SELECT id, level1_id, title, description, summary, questions, evidence_examples, order_no
         FROM {} ORDER BY position",
        table(tenant, "custom_framework_level2")
    );
    let level2 = sqlx::query_as::<_, Level2Row>(&sql).fetch_all(pool).await?;

    let sql = format!(
        "SELECT id, level2_id, title, description, order_no FROM {} ORDER BY position",
        table(tenant, "custom_framework_level3")
    );
    let level3 = sqlx::query_as::<_, Level3Row>(&sql).fetch_all(pool).await?;

    let mut subs: HashMap<Uuid, Vec<SubControlNode>> = HashMap::new();
    for row in level3 {
        subs.entry(row.level2_id).or_default().push(SubControlNode {
            id: row.id.into(),
            title: row.title,
            description: row.description,
            order_no: row.order_no,
        });
    }

    let mut controls: HashMap<Uuid, Vec<ControlNode>> = HashMap::new();
    for row in level2 {
        controls.entry(row.level1_id).or_default().push(ControlNode {
            id: row.id.into(),
            title: row.title,
            description: row.description,
            summary: row.summary,
            questions: row.questions.0,
            evidence_examples: row.evidence_examples.0,
            order_no: row.order_no,
            items: subs.remove(&row.id).unwrap_or_default(),
        });
    }

    let mut categories: HashMap<Uuid, Vec<CategoryNode>> = HashMap::new();
    for row in level1 {
        categories.entry(row.framework_id).or_default().push(CategoryNode {
            id: row.id.into(),
            title: row.title,
            description: row.description,
            order_no: row.order_no,
            items: controls.remove(&row.id).unwrap_or_default(),
        });
    }

    frameworks
        .into_iter()
        .map(|row| {
            let structure = categories.remove(&row.id).unwrap_or_default();
            Ok(FrameworkEntry {
                record: row.into_record()?,
                structure,
            })
        })
        .collect()
}
