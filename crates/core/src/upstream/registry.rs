use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::DataSource;
use crate::error::{IngestError, Result};

/// Builds a fresh, unopened [`DataSource`].
pub type DataSourceFactory = Arc<dyn Fn() -> Box<dyn DataSource> + Send + Sync>;

/// Data-source factories keyed by URI scheme (`rtsp`, `memory`, ...).
///
/// Schemes are matched case-insensitively. Clones share the same table.
#[derive(Clone, Default)]
pub struct DataSourceRegistry {
    factories: Arc<RwLock<HashMap<String, DataSourceFactory>>>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `scheme`. Replaces any existing factory.
    pub fn register<F>(&self, scheme: &str, factory: F)
    where
        F: Fn() -> Box<dyn DataSource> + Send + Sync + 'static,
    {
        let scheme = scheme.to_ascii_lowercase();
        tracing::debug!(scheme = %scheme, "data source registered");
        self.factories.write().insert(scheme, Arc::new(factory));
    }

    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.factories
            .read()
            .contains_key(&scheme.to_ascii_lowercase())
    }

    /// Create an unopened source for `uri` based on its scheme.
    pub fn create(&self, uri: &str) -> Result<Box<dyn DataSource>> {
        let scheme =
            uri_scheme(uri).ok_or_else(|| IngestError::UnsupportedScheme(uri.to_string()))?;
        // Clone the factory out so the lock is not held while it runs.
        let factory = self.factories.read().get(&scheme).cloned();
        match factory {
            Some(factory) => Ok(factory()),
            None => {
                tracing::warn!(uri, scheme = %scheme, "no data source for scheme");
                Err(IngestError::UnsupportedScheme(scheme))
            }
        }
    }
}

/// Lower-cased scheme of `uri` (the part before `://`).
fn uri_scheme(uri: &str) -> Option<String> {
    let (scheme, _) = uri.split_once("://")?;
    let valid = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| scheme.to_ascii_lowercase())
}
