//! Installation-wide responsible-people notification targets

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::{error, info, warn};

use crate::services::JsonStore;

pub const STORE_KEY: &str = "alarm_config_card_responsible_people";
const STORE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ResponsibleRecord {
    #[serde(default)]
    services: Vec<String>,
}

/// Ordered list of `domain.service` targets notified on every firing
#[derive(Debug)]
pub struct ResponsiblePeople {
    store: JsonStore,
    services: RwLock<Vec<String>>,
}

impl ResponsiblePeople {
    pub fn new(store_dir: &std::path::Path) -> Self {
        Self {
            store: JsonStore::new(store_dir, STORE_KEY, STORE_VERSION),
            services: RwLock::new(Vec::new()),
        }
    }

    pub async fn load(&self) {
        let record = match self.store.load::<ResponsibleRecord>().await {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                error!("Failed to load responsible people: {}", e);
                ResponsibleRecord::default()
            }
        };
        info!("Loaded {} responsible people services", record.services.len());
        self.replace(record.services);
    }

    /// Replace the whole list and persist it
    pub async fn set_services(&self, services: Vec<String>) {
        self.replace(services.clone());
        if let Err(e) = self.store.save(&ResponsibleRecord { services }).await {
            error!("Failed to persist responsible people: {}", e);
        }
    }

    pub fn services(&self) -> Vec<String> {
        self.services.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn replace(&self, services: Vec<String>) {
        match self.services.write() {
            Ok(mut current) => *current = services,
            Err(e) => warn!("Failed to lock responsible people: {}", e),
        }
    }
}
