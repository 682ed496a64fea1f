//! PostgreSQL implementation of the audit ledger.

use attesta_core::{AuditAction, AuditEntry};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use super::{AuditQuery, NewAuditEntry, StoreError};

const COLUMNS: &str = "id, attachment_id, captured_at, server_timestamp, captured_by_id, \
     captured_by_name, latitude, longitude, accuracy, barcode, device_info, capture_index, \
     image_hash, action, metadata, created_at";

/// PostgreSQL-backed audit ledger.
///
/// The table carries its own immutability triggers, so a rejected write
/// surfaces as [`StoreError::Rejected`] even when the event gate is bypassed.
#[derive(Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
}

/// Row type for database queries.
#[derive(FromRow)]
struct AuditRow {
    id: i64,
    attachment_id: Option<i64>,
    captured_at: Option<String>,
    server_timestamp: String,
    captured_by_id: Option<i64>,
    captured_by_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    accuracy: Option<f64>,
    barcode: Option<String>,
    device_info: Option<String>,
    capture_index: Option<i32>,
    image_hash: Option<String>,
    action: String,
    metadata: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action: AuditAction = row.action.parse().map_err(StoreError::Query)?;
        Ok(Self {
            id: row.id,
            attachment_id: row.attachment_id,
            captured_at: row.captured_at,
            server_timestamp: row.server_timestamp,
            captured_by_id: row.captured_by_id,
            captured_by_name: row.captured_by_name,
            latitude: row.latitude,
            longitude: row.longitude,
            accuracy: row.accuracy,
            barcode: row.barcode,
            device_info: row.device_info,
            capture_index: row.capture_index,
            image_hash: row.image_hash,
            action,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

impl PostgresAuditStore {
    /// Connect and run migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Audit ledger connected and migrations applied");

        Ok(Self { pool })
    }

    pub async fn check_health(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    pub async fn insert(&self, entry: &NewAuditEntry) -> Result<AuditEntry, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO capture_audit (
                attachment_id, captured_at, server_timestamp, captured_by_id, captured_by_name,
                latitude, longitude, accuracy, barcode, device_info, capture_index, image_hash,
                action, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {COLUMNS}
            "#
        );
        let row: AuditRow = sqlx::query_as(&sql)
            .bind(entry.attachment_id)
            .bind(&entry.captured_at)
            .bind(&entry.server_timestamp)
            .bind(entry.captured_by_id)
            .bind(&entry.captured_by_name)
            .bind(entry.latitude)
            .bind(entry.longitude)
            .bind(entry.accuracy)
            .bind(&entry.barcode)
            .bind(&entry.device_info)
            .bind(entry.capture_index)
            .bind(&entry.image_hash)
            .bind(entry.action.as_str())
            .bind(&entry.metadata)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<AuditEntry>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM capture_audit WHERE id = $1");
        let row: Option<AuditRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    pub async fn find_and_count(
        &self,
        query: &AuditQuery,
    ) -> Result<(Vec<AuditEntry>, i64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM capture_audit");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM capture_audit"));
        push_filters(&mut select, query);
        let sort = query.sort();
        let direction = if sort.descending() { "DESC" } else { "ASC" };
        select.push(format!(
            " ORDER BY {} {direction}, id {direction} LIMIT ",
            sort.column()
        ));
        select.push_bind(i64::from(query.page_size()));
        select.push(" OFFSET ");
        select.push_bind(query.offset());

        let rows: Vec<AuditRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let entries = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((entries, total))
    }

    pub async fn update_metadata(&self, id: i64, metadata: &Value) -> Result<AuditEntry, StoreError> {
        let sql = format!(
            "UPDATE capture_audit SET metadata = $1 WHERE id = $2 RETURNING {COLUMNS}"
        );
        let row: Option<AuditRow> = sqlx::query_as(&sql)
            .bind(metadata)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(StoreError::NotFound(id))?.try_into()
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM capture_audit WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Run a statement directly against the table, bypassing the event gate.
    #[cfg(test)]
    pub(crate) async fn raw_execute(&self, sql: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &AuditQuery) {
    builder.push(" WHERE TRUE");
    if let Some(attachment_id) = query.attachment_id {
        builder.push(" AND attachment_id = ").push_bind(attachment_id);
    }
    if let Some(captured_by_id) = query.captured_by_id {
        builder.push(" AND captured_by_id = ").push_bind(captured_by_id);
    }
    if let Some(barcode) = &query.barcode {
        builder.push(" AND barcode = ").push_bind(barcode.clone());
    }
    if let Some(image_hash) = &query.image_hash {
        builder.push(" AND image_hash = ").push_bind(image_hash.clone());
    }
    if let Some(action) = query.action {
        builder.push(" AND action = ").push_bind(action.as_str());
    }
}
