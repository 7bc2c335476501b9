use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use mrx_allocator::{CatalogStore, ReservationStore, StockWrite};
use mrx_schemas::{ReservationRecord, ReservationStatus, VariantRecord};

pub const ENV_DB_URL: &str = "MRX_DATABASE_URL";

/// Connect to Postgres using MRX_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='variants'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_variants_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_variants_table: bool,
}

/// Count reservations that are still open (status RESERVED, expired or not).
/// Used by CLI guardrails to prevent accidental migration of a store with
/// live checkout traffic.
pub async fn count_open_reservations(pool: &PgPool) -> Result<i64> {
    // If schema doesn't exist yet, treat as 0 (safe) rather than failing.
    let st = status(pool).await?;
    if !st.has_variants_table {
        return Ok(0);
    }

    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        select count(*)::bigint
        from reservations
        where status = 'RESERVED'
        "#,
    )
    .fetch_one(pool)
    .await
    .context("count_open_reservations failed")?;

    Ok(n)
}

/// Convenience boolean.
pub async fn has_open_reservations(pool: &PgPool) -> Result<bool> {
    Ok(count_open_reservations(pool).await? > 0)
}

/// Provision a variant row. Variant creation belongs to the catalog service;
/// this helper exists for tests and operator seeding only.
pub async fn insert_variant(
    pool: &PgPool,
    product_slug: &str,
    variant_slug: &str,
    on_hand: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into variants (variant_slug, product_slug, on_hand)
        values ($1, $2, $3)
        "#,
    )
    .bind(variant_slug)
    .bind(product_slug)
    .bind(on_hand)
    .execute(pool)
    .await
    .context("insert_variant failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Catalog store
// ---------------------------------------------------------------------------

/// Postgres-backed [`CatalogStore`] with optimistic versioned writes.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn variant_from_tuple(t: (String, String, i64, i64)) -> VariantRecord {
    VariantRecord {
        variant_slug: t.0,
        product_slug: t.1,
        on_hand: t.2,
        version: t.3,
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn get(&self, variant_slug: &str) -> Result<Option<VariantRecord>> {
        let row = sqlx::query_as::<_, (String, String, i64, i64)>(
            r#"
            select variant_slug, product_slug, on_hand, version
            from variants
            where variant_slug = $1
            "#,
        )
        .bind(variant_slug)
        .fetch_optional(&self.pool)
        .await
        .context("catalog get failed")?;

        Ok(row.map(variant_from_tuple))
    }

    async fn list_for_product(&self, product_slug: &str) -> Result<Vec<VariantRecord>> {
        let rows = sqlx::query_as::<_, (String, String, i64, i64)>(
            r#"
            select variant_slug, product_slug, on_hand, version
            from variants
            where product_slug = $1
            order by variant_slug
            "#,
        )
        .bind(product_slug)
        .fetch_all(&self.pool)
        .await
        .context("catalog list_for_product failed")?;

        Ok(rows.into_iter().map(variant_from_tuple).collect())
    }

    async fn update_stock(&self, write: StockWrite) -> Result<bool> {
        // Versioned update and journal insert commit together or not at all.
        let mut tx = self.pool.begin().await.context("update_stock begin failed")?;

        let res = sqlx::query(
            r#"
            update variants
            set on_hand = $1, version = version + 1
            where variant_slug = $2 and version = $3
            "#,
        )
        .bind(write.new_on_hand)
        .bind(&write.variant_slug)
        .bind(write.expected_version)
        .execute(&mut *tx)
        .await
        .context("update_stock write failed")?;

        if res.rows_affected() == 0 {
            tx.rollback().await.context("update_stock rollback failed")?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            insert into stock_movements (variant_slug, kind, quantity, reason)
            values ($1, $2, $3, $4)
            "#,
        )
        .bind(&write.variant_slug)
        .bind(write.kind.as_str())
        .bind(write.quantity)
        .bind(&write.reason)
        .execute(&mut *tx)
        .await
        .context("stock movement journal insert failed")?;

        tx.commit().await.context("update_stock commit failed")?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Reservation store
// ---------------------------------------------------------------------------

/// Postgres-backed [`ReservationStore`]. Status transitions compare-and-set
/// on the current status so terminal races resolve at the row.
#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RESERVATION_COLUMNS: &str =
    "id, product_slug, variant_slug, order_id, quantity, reserved_at, expires_at, status";

fn reservation_from_row(row: &sqlx::postgres::PgRow) -> Result<ReservationRecord> {
    let status_raw: String = row.try_get("status")?;
    let status = ReservationStatus::parse(&status_raw)
        .ok_or_else(|| anyhow!("invalid reservation status: {status_raw}"))?;
    Ok(ReservationRecord {
        id: row.try_get("id")?,
        product_slug: row.try_get("product_slug")?,
        variant_slug: row.try_get("variant_slug")?,
        order_id: row.try_get("order_id")?,
        quantity: row.try_get("quantity")?,
        reserved_at: row.try_get("reserved_at")?,
        expires_at: row.try_get("expires_at")?,
        status,
    })
}

#[async_trait::async_trait]
impl ReservationStore for PgReservationStore {
    async fn insert(&self, record: ReservationRecord) -> Result<()> {
        sqlx::query(
            r#"
            insert into reservations (
              id, product_slug, variant_slug, order_id, quantity,
              reserved_at, expires_at, status
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8
            )
            "#,
        )
        .bind(record.id)
        .bind(&record.product_slug)
        .bind(&record.variant_slug)
        .bind(&record.order_id)
        .bind(record.quantity)
        .bind(record.reserved_at)
        .bind(record.expires_at)
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await
        .context("reservation insert failed")?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<bool> {
        let res = sqlx::query(
            r#"
            update reservations
            set status = $1
            where id = $2 and status = $3
            "#,
        )
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .context("reservation update_status failed")?;
        Ok(res.rows_affected() == 1)
    }

    async fn find_active(
        &self,
        order_id: &str,
        variant_slug: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ReservationRecord>> {
        let row = sqlx::query(&format!(
            r#"
            select {RESERVATION_COLUMNS}
            from reservations
            where order_id = $1
              and variant_slug = $2
              and status = 'RESERVED'
              and expires_at > $3
            limit 1
            "#
        ))
        .bind(order_id)
        .bind(variant_slug)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("reservation find_active failed")?;

        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn find_by_order(&self, order_id: &str) -> Result<Vec<ReservationRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            select {RESERVATION_COLUMNS}
            from reservations
            where order_id = $1
            order by variant_slug, reserved_at
            "#
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .context("reservation find_by_order failed")?;

        rows.iter().map(reservation_from_row).collect()
    }

    async fn find_expired_reserved(&self, now: DateTime<Utc>) -> Result<Vec<ReservationRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            select {RESERVATION_COLUMNS}
            from reservations
            where status = 'RESERVED' and expires_at <= $1
            order by order_id, variant_slug
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .context("reservation find_expired_reserved failed")?;

        rows.iter().map(reservation_from_row).collect()
    }

    async fn active_quantity(&self, variant_slug: &str, now: DateTime<Utc>) -> Result<i64> {
        let (sum,): (i64,) = sqlx::query_as::<_, (i64,)>(
            r#"
            select coalesce(sum(quantity), 0)::bigint
            from reservations
            where variant_slug = $1
              and status = 'RESERVED'
              and expires_at > $2
            "#,
        )
        .bind(variant_slug)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("reservation active_quantity failed")?;
        Ok(sum)
    }
}
