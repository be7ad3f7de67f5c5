//! Store construction from configuration.

use std::sync::Arc;

use credits_core::BillingError;
use credits_store::{LedgerStore, MemoryStore, PgStore};

use crate::config::{LedgerConfig, StoreBackend};
use crate::error::Result;
use crate::instrument::InstrumentedStore;

/// Open the store selected by `config`, wrapped in [`InstrumentedStore`].
///
/// Postgres stores are migrated before they are returned.
///
/// # Errors
///
/// - `LedgerError::Billing` if the backend is not usable with this build or
///   is missing its settings.
/// - `LedgerError::Store` if the backend cannot be opened.
pub async fn open_store(config: &LedgerConfig) -> Result<Arc<dyn LedgerStore>> {
    let backend = config.backend;
    tracing::info!(backend = %backend, "Opening ledger store");

    let store: Arc<dyn LedgerStore> = match backend {
        StoreBackend::Memory => Arc::new(InstrumentedStore::new(
            MemoryStore::new(),
            backend.as_str(),
        )),
        StoreBackend::Rocks => open_rocks(config)?,
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                BillingError::Configuration(
                    "DATABASE_URL is required for the postgres backend".into(),
                )
            })?;
            let store = PgStore::connect(url).await?;
            store.migrate().await?;
            Arc::new(InstrumentedStore::new(store, backend.as_str()))
        }
    };

    Ok(store)
}

#[cfg(feature = "rocksdb-backend")]
fn open_rocks(config: &LedgerConfig) -> Result<Arc<dyn LedgerStore>> {
    tracing::info!(path = %config.data_dir.display(), "Opening RocksDB store");
    let store = credits_store::RocksStore::open(&config.data_dir)?;
    Ok(Arc::new(InstrumentedStore::new(
        store,
        StoreBackend::Rocks.as_str(),
    )))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_rocks(_config: &LedgerConfig) -> Result<Arc<dyn LedgerStore>> {
    Err(BillingError::Configuration(
        "rocksdb backend requires the rocksdb-backend feature".into(),
    )
    .into())
}
