use std::sync::Arc;

use crate::core::config::Settings;
use crate::stores::{AttemptStore, PatternCatalog, QuestionBank, Stores};

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    stores: Stores,
}

impl AppState {
    pub(crate) fn new(settings: Settings, stores: Stores) -> Self {
        Self { inner: Arc::new(InnerState { settings, stores }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn attempts(&self) -> &dyn AttemptStore {
        self.inner.stores.attempts.as_ref()
    }

    pub(crate) fn catalog(&self) -> &dyn PatternCatalog {
        self.inner.stores.catalog.as_ref()
    }

    pub(crate) fn bank(&self) -> &dyn QuestionBank {
        self.inner.stores.bank.as_ref()
    }
}
