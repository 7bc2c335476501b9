use anyhow::{ensure, Result};
use mrx_allocator::{CatalogStore, StockWrite};
use mrx_ledger::{BookSnapshot, LedgerError, Movement, StockBook};
use mrx_schemas::VariantRecord;
use tokio::sync::Mutex;

/// In-memory [`CatalogStore`] backed by a [`StockBook`].
///
/// Every stock write goes through the book's invariant checks and journal,
/// so scenario tests can assert both the final counts and the movement
/// history, and run the book's replay integrity check at the end.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    book: Mutex<StockBook>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variant with its initial physical count.
    pub async fn add_variant(
        &self,
        product_slug: &str,
        variant_slug: &str,
        on_hand: i64,
    ) -> Result<(), LedgerError> {
        self.book
            .lock()
            .await
            .add_variant(product_slug, variant_slug, on_hand)
    }

    /// Read-only snapshot of the underlying book.
    pub async fn snapshot(&self) -> BookSnapshot {
        self.book.lock().await.snapshot()
    }

    /// Replay the journal and verify it reproduces the current counts.
    pub async fn verify_integrity(&self) -> bool {
        self.book.lock().await.verify_integrity()
    }
}

fn record_from(stock: &mrx_ledger::VariantStock) -> VariantRecord {
    VariantRecord {
        product_slug: stock.product_slug.clone(),
        variant_slug: stock.variant_slug.clone(),
        on_hand: stock.on_hand,
        version: stock.version,
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryCatalog {
    async fn get(&self, variant_slug: &str) -> Result<Option<VariantRecord>> {
        Ok(self.book.lock().await.variant(variant_slug).map(record_from))
    }

    async fn list_for_product(&self, product_slug: &str) -> Result<Vec<VariantRecord>> {
        Ok(self
            .book
            .lock()
            .await
            .variants_for_product(product_slug)
            .into_iter()
            .map(record_from)
            .collect())
    }

    async fn update_stock(&self, write: StockWrite) -> Result<bool> {
        let mut book = self.book.lock().await;

        let Some(current) = book.variant(&write.variant_slug) else {
            return Ok(false);
        };
        if current.version != write.expected_version {
            return Ok(false);
        }

        book.commit(Movement::new(
            &write.variant_slug,
            write.kind,
            write.quantity,
            write.reason,
        ))
        .map_err(anyhow::Error::new)?;

        let landed = book
            .variant(&write.variant_slug)
            .map(|v| v.on_hand)
            .unwrap_or_default();
        ensure!(
            landed == write.new_on_hand,
            "inconsistent stock write: caller computed {}, movement produced {landed}",
            write.new_on_hand
        );
        Ok(true)
    }
}
