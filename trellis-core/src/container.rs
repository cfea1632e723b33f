// Per-tenant service container

use crate::{ManagementError, Result};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

type Entry = Box<dyn Any + Send + Sync>;

/// Services available inside one tenant context.
///
/// Entries are keyed by type and may be trait objects, so
/// `container.add::<dyn RecipeHarvester>(Arc::new(harvester))` works. Several
/// instances of the same type can be registered; `resolve` returns the most
/// recent one and `resolve_all` returns all of them in registration order.
#[derive(Clone, Default)]
pub struct ServiceContainer {
    services: Arc<RwLock<HashMap<TypeId, Vec<Entry>>>>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service, replacing earlier registrations of the same type.
    pub fn register<T>(&self, service: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        self.services
            .write()
            .insert(TypeId::of::<T>(), vec![Box::new(service)]);
        trace!(service = type_name, "Service registered");
    }

    /// Register an additional instance of a service type.
    pub fn add<T>(&self, service: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        self.services
            .write()
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Box::new(service));
        trace!(service = type_name, "Service added");
    }

    pub fn try_resolve<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|entries| entries.last())
            .and_then(|entry| entry.downcast_ref::<Arc<T>>())
            .cloned()
    }

    pub fn resolve<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.try_resolve::<T>().ok_or_else(|| {
            let type_name = std::any::type_name::<T>();
            debug!(service = type_name, "Service not found in tenant container");
            ManagementError::problem(format!("Service not registered: {}", type_name))
        })
    }

    pub fn resolve_all<T>(&self) -> Vec<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services
            .read()
            .get(&TypeId::of::<T>())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.downcast_ref::<Arc<T>>())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.services.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("services", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    struct French;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".into()
        }
    }

    #[test]
    fn test_register_and_resolve_concrete() {
        let container = ServiceContainer::new();
        container.register(Arc::new(42u32));

        assert_eq!(*container.resolve::<u32>().unwrap(), 42);
        assert!(container.has::<u32>());
        assert!(!container.has::<u64>());
    }

    #[test]
    fn test_trait_objects_and_multiple_instances() {
        let container = ServiceContainer::new();
        container.add::<dyn Greeter>(Arc::new(English));
        container.add::<dyn Greeter>(Arc::new(French));

        let all: Vec<String> = container
            .resolve_all::<dyn Greeter>()
            .iter()
            .map(|g| g.greet())
            .collect();
        assert_eq!(all, vec!["hello", "bonjour"]);
        assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "bonjour");
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_register_replaces() {
        let container = ServiceContainer::new();
        container.add::<dyn Greeter>(Arc::new(English));
        container.register::<dyn Greeter>(Arc::new(French));
        assert_eq!(container.resolve_all::<dyn Greeter>().len(), 1);
    }

    #[test]
    fn test_missing_service_is_problem() {
        let container = ServiceContainer::new();
        let err = container.resolve::<String>().unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(container.resolve_all::<dyn Greeter>().is_empty());
        assert!(container.is_empty());
    }
}
