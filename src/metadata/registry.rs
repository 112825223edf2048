//! Provider registry for managing multiple [`MetadataProvider`] implementations.
//!
//! The [`ProviderRegistry`] is built once at startup from the compiled-in
//! providers and answers which of them are eligible for a given query.

use std::sync::Arc;

use hugin_common::Query;

use super::provider::MetadataProvider;

/// A registry that manages multiple [`MetadataProvider`] implementations.
///
/// Providers are stored in registration order. Eligibility for a query
/// requires the provider to be available, to match the query's subject type,
/// and to pass the query's allow-list.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use hugin::metadata::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// registry.register(Arc::new(my_provider));
///
/// for provider in registry.eligible(&query) {
///     println!("{}", provider.name());
/// }
/// ```
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MetadataProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a new metadata provider.
    ///
    /// Registering a second provider with an existing name replaces the
    /// first, so names stay unique.
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) {
        if let Some(existing) = self
            .providers
            .iter_mut()
            .find(|p| p.name() == provider.name())
        {
            tracing::warn!(provider = provider.name(), "Replacing registered provider");
            *existing = provider;
        } else {
            self.providers.push(provider);
        }
    }

    /// All registered providers, available or not.
    pub fn all(&self) -> &[Arc<dyn MetadataProvider>] {
        &self.providers
    }

    /// Return all providers that are currently available.
    pub fn available(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .cloned()
            .collect()
    }

    /// Look up a provider by its [`MetadataProvider::name`].
    ///
    /// The match is case-insensitive. Returns `None` if no provider with the
    /// given name has been registered.
    pub fn get(&self, name: &str) -> Option<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Providers that should receive a job for `query`.
    pub fn eligible(&self, query: &Query) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .filter(|p| p.subject() == query.subject())
            .filter(|p| query.allows_provider(p.name()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::testing::StaticProvider;
    use hugin_common::SubjectType;

    fn movie_query() -> Query {
        Query::builder(SubjectType::Movie)
            .title("Sin City")
            .build()
            .unwrap()
    }

    #[test]
    fn empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.available().is_empty());
        assert!(registry.is_empty());
        assert!(registry.get("tmdb-movie").is_none());
        assert!(registry.eligible(&movie_query()).is_empty());
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StaticProvider::new("tmdb-movie", 90)));
        registry.register(Arc::new(StaticProvider::new("omdb-movie", 80).unavailable()));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.available().len(), 1);
        assert!(registry.get("TMDB-Movie").is_some());
        assert!(registry.get("omdb-movie").is_some()); // registered but not available
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn duplicate_names_replace() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StaticProvider::new("ofdb", 10)));
        registry.register(Arc::new(StaticProvider::new("ofdb", 70)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("ofdb").unwrap().priority(), 70);
    }

    #[test]
    fn eligible_filters_subject_availability_and_allow_list() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StaticProvider::new("ofdb", 70)));
        registry.register(Arc::new(StaticProvider::new("tmdb-movie", 90)));
        registry.register(Arc::new(StaticProvider::new("tmdb-person", 90).person()));
        registry.register(Arc::new(StaticProvider::new("offline", 99).unavailable()));

        let all: Vec<_> = registry
            .eligible(&movie_query())
            .iter()
            .map(|p| p.name())
            .collect();
        assert_eq!(all, vec!["ofdb", "tmdb-movie"]);

        let only_ofdb = Query::builder(SubjectType::Movie)
            .title("Sin City")
            .providers(["OFDB"])
            .build()
            .unwrap();
        let names: Vec<_> = registry
            .eligible(&only_ofdb)
            .iter()
            .map(|p| p.name())
            .collect();
        assert_eq!(names, vec!["ofdb"]);

        let person = Query::builder(SubjectType::Person)
            .name("Frank Miller")
            .build()
            .unwrap();
        let names: Vec<_> = registry.eligible(&person).iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["tmdb-person"]);
    }
}
