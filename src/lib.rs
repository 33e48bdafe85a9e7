pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod importer;
pub mod inventory;

pub use db::DbPool;

use anyhow::Result;
use arc_swap::ArcSwap;
use config::Config;
use inventory::Inventory;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    /// Snapshot served to readers; replaced wholesale on reload
    pub inventory: Arc<ArcSwap<Inventory>>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, inventory: Inventory) -> Self {
        Self {
            config,
            db,
            inventory: Arc::new(ArcSwap::from_pointee(inventory)),
        }
    }

    /// Load the inventory from the database and publish it
    pub async fn reload(&self) -> Result<Arc<Inventory>> {
        let inventory = Arc::new(db::load_inventory(&self.db).await?);
        self.inventory.store(inventory.clone());
        tracing::info!("Inventory reloaded");
        Ok(inventory)
    }
}
