use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use super::traits::SiteAdapter;

/// Site adapters keyed by source name.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<&'static str, Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter, replacing any previous one with the same source name.
    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        self.adapters.insert(adapter.source_name(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn SiteAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, source: &str) -> Option<&Arc<dyn SiteAdapter>> {
        self.adapters.get(source)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Restrict to the named adapters. An empty list keeps all of them.
    pub fn enabled(&self, names: &[String]) -> Self {
        if names.is_empty() {
            return self.clone();
        }

        let mut subset = Self::new();
        for name in names {
            match self.adapters.get(name.as_str()) {
                Some(adapter) => subset.register(adapter.clone()),
                None => warn!(adapter = %name, "unknown adapter in configuration, ignoring"),
            }
        }
        subset
    }

    /// Adapters that understand the given search URL.
    pub fn for_url<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Arc<dyn SiteAdapter>> + 'a {
        self.adapters.values().filter(move |a| a.handles(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Listing;
    use anyhow::Result;
    use async_trait::async_trait;

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl SiteAdapter for Named {
        fn source_name(&self) -> &'static str {
            self.0
        }
        fn handles(&self, url: &str) -> bool {
            url.starts_with(self.1)
        }
        async fn fetch(&self, _url: &str) -> Result<String> {
            Ok(String::new())
        }
        fn extract(&self, _raw: &str) -> Result<Vec<Listing>> {
            Ok(Vec::new())
        }
    }

    fn registry() -> AdapterRegistry {
        AdapterRegistry::new()
            .with(Arc::new(Named("alpha", "https://alpha")))
            .with(Arc::new(Named("beta", "https://beta")))
    }

    #[test]
    fn enabled_subset_ignores_unknown_names() {
        let subset = registry().enabled(&["beta".to_string(), "gamma".to_string()]);
        assert_eq!(subset.names(), vec!["beta"]);
        assert_eq!(registry().enabled(&[]).len(), 2);
    }

    #[test]
    fn for_url_matches_by_pattern() {
        let registry = registry();
        let names: Vec<_> = registry.for_url("https://alpha/search").map(|a| a.source_name()).collect();
        assert_eq!(names, vec!["alpha"]);
        assert_eq!(registry.for_url("https://unknown").count(), 0);
    }
}
