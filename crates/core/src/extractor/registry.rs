use std::sync::Arc;

use parking_lot::RwLock;

use super::{ContainerExtractor, Extractor, ExtractorInput};
use crate::config::IngestConfig;
use crate::error::Result;

/// Builds a fresh extractor.
pub type ExtractorFactory = Arc<dyn Fn() -> Box<dyn Extractor> + Send + Sync>;

/// Name of the [`ContainerExtractor`] entry added by
/// [`ExtractorRegistry::with_defaults`].
pub const PSEUDO_CONTAINER: &str = "pseudo-container";

/// Ordered list of named extractor factories.
///
/// [`select`](Self::select) tries them in registration order and keeps the
/// first whose `sniff` accepts the input. Clones share the same list.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    factories: Arc<RwLock<Vec<(String, ExtractorFactory)>>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the pseudo-container extractor.
    pub fn with_defaults(config: &IngestConfig) -> Self {
        let registry = Self::new();
        let config = config.clone();
        registry.register(PSEUDO_CONTAINER, move || {
            Box::new(ContainerExtractor::new(&config))
        });
        registry
    }

    /// Add `factory` under `name`, replacing an entry with the same name in
    /// place.
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Extractor> + Send + Sync + 'static,
    {
        let factory: ExtractorFactory = Arc::new(factory);
        let mut factories = self.factories.write();
        match factories.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = factory,
            None => factories.push((name.to_string(), factory)),
        }
        tracing::debug!(extractor = name, "extractor registered");
    }

    pub fn names(&self) -> Vec<String> {
        self.factories
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// First extractor that recognises `input`, with its name.
    ///
    /// The peek position is reset after every attempt so the chosen
    /// extractor starts reading at the same place the sniffing began.
    pub fn select(
        &self,
        input: &mut dyn ExtractorInput,
    ) -> Result<Option<(String, Box<dyn Extractor>)>> {
        let candidates = self.factories.read().clone();
        for (name, factory) in candidates {
            let extractor = factory();
            let recognised = extractor.sniff(input);
            input.reset_peek_position();
            if recognised? {
                tracing::debug!(extractor = %name, "extractor selected");
                return Ok(Some((name, extractor)));
            }
            tracing::trace!(extractor = %name, "extractor declined input");
        }
        Ok(None)
    }
}
