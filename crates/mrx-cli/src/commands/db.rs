//! Database command handlers.
//!
//! Covers `mrx db status` and `mrx db migrate`.

use anyhow::Result;

/// Execute `mrx db status`: connectivity + schema presence probe.
pub async fn status() -> Result<()> {
    let pool = mrx_db::connect_from_env().await?;
    let s = mrx_db::status(&pool).await?;
    println!("db_ok={} has_variants_table={}", s.ok, s.has_variants_table);
    Ok(())
}

/// Execute `mrx db migrate`.
///
/// Guardrail: refuses when open reservations exist — a mid-checkout schema
/// migration can strand claims — unless the operator acknowledges with
/// `--yes`.
pub async fn migrate(yes: bool) -> Result<()> {
    let pool = mrx_db::connect_from_env().await?;

    let n = mrx_db::count_open_reservations(&pool).await?;
    if n > 0 && !yes {
        anyhow::bail!(
            "REFUSING MIGRATE: detected {} open reservation(s). Re-run with: `mrx db migrate --yes`",
            n
        );
    }

    mrx_db::migrate(&pool).await?;
    println!("migrations_applied=true");
    Ok(())
}
