//! Shared application state for all routes.

use crate::ledger::Ledger;
use crate::reports::Reports;
use crate::schema::SchemaModel;
use crate::sessions::Sessions;
use crate::settings::Settings;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub model: Arc<SchemaModel>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, model: Arc<SchemaModel>, settings: Settings) -> Self {
        AppState {
            store,
            model,
            settings: Arc::new(settings),
        }
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.store.clone(), self.model.clone())
    }

    pub fn reports(&self) -> Reports {
        Reports::new(self.ledger())
    }

    pub fn sessions(&self) -> Sessions {
        Sessions::new(self.store.clone(), self.model.clone(), self.settings.session_ttl)
    }
}
