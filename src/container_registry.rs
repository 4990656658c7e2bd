use alloc::{collections::BTreeMap, string::String, sync::Arc, vec::Vec};
use core::{
    any::TypeId,
    fmt::{self, Display, Formatter},
};
use parking_lot::Mutex;
use tracing::{debug, error, info_span, Instrument as _};

use crate::{
    container::Container,
    errors::{AggregateDisposalError, ContainerErrorKind},
    type_resolver::{NoTypeInformation, TypeResolver},
};

const DEFAULT_ID: &str = "default";

/// Id of a container in a [`ContainerRegistry`].
/// The `"default"` id is reserved for the default container.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerId(Arc<str>);

impl ContainerId {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        &*self.0 == DEFAULT_ID
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ContainerId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Owner of the default container and every container registered next to it.
///
/// # Example
/// ```rust
/// use stevedore::{ContainerRegistry, InstantiateErrorKind, ServiceOptions};
///
/// struct Session(u64);
///
/// let registry = ContainerRegistry::new();
/// registry
///     .default_container()
///     .set(ServiceOptions::factory(|| Ok::<_, InstantiateErrorKind>(Session(1))))
///     .unwrap();
///
/// let request = registry.create_container("request-1").unwrap();
/// assert_eq!(request.get::<Session>().unwrap().0, 1);
/// assert!(registry.has_container("request-1"));
/// ```
#[derive(Clone)]
pub struct ContainerRegistry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    pub(crate) default: Container,
    containers: Mutex<BTreeMap<ContainerId, Container>>,
    type_resolver: Arc<dyn TypeResolver>,
}

impl Default for ContainerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerRegistry {
    /// Creates a registry without type information, so every injection point needs an explicit type
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_type_resolver(NoTypeInformation)
    }

    #[must_use]
    pub fn with_type_resolver(type_resolver: impl TypeResolver + 'static) -> Self {
        let type_resolver: Arc<dyn TypeResolver> = Arc::new(type_resolver);
        Self {
            inner: Arc::new_cyclic(|registry| RegistryInner {
                default: Container::new(ContainerId::new(DEFAULT_ID), registry.clone(), type_resolver.clone()),
                containers: Mutex::new(BTreeMap::new()),
                type_resolver,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn default_container(&self) -> Container {
        self.inner.default.clone()
    }

    /// Creates a container and registers it
    ///
    /// # Errors
    /// See [`Self::register_container`]
    pub fn create_container(&self, id: impl Into<ContainerId>) -> Result<Container, ContainerErrorKind> {
        let container = Container::new(id.into(), Arc::downgrade(&self.inner), self.inner.type_resolver.clone());
        self.register_container(container.clone())?;
        Ok(container)
    }

    /// # Errors
    /// - Returns [`ContainerErrorKind::ReservedContainerId`] if the id is `"default"`
    /// - Returns [`ContainerErrorKind::ContainerDisposed`] if the container was removed before
    /// - Returns [`ContainerErrorKind::DuplicateContainerId`] if a container with the id is already registered
    pub fn register_container(&self, container: Container) -> Result<(), ContainerErrorKind> {
        let id = container.id().clone();
        if id.is_default() {
            let err = ContainerErrorKind::ReservedContainerId;
            error!("{}", err);
            return Err(err);
        }
        if container.is_disposed() {
            let err = ContainerErrorKind::ContainerDisposed { id };
            error!("{}", err);
            return Err(err);
        }

        let mut containers = self.inner.containers.lock();
        if containers.contains_key(&id) {
            let err = ContainerErrorKind::DuplicateContainerId { id };
            error!("{}", err);
            return Err(err);
        }
        containers.insert(id.clone(), container);
        debug!(%id, "Container registered");

        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn has_container(&self, id: impl Into<ContainerId>) -> bool {
        self.inner.containers.lock().contains_key(&id.into())
    }

    /// # Errors
    /// Returns [`ContainerErrorKind::ContainerNotFound`] if no container is registered with the id.
    /// The default container isn't registered, use [`Self::default_container`] to get it.
    pub fn get_container(&self, id: impl Into<ContainerId>) -> Result<Container, ContainerErrorKind> {
        let id = id.into();
        match self.inner.containers.lock().get(&id) {
            Some(container) => Ok(container.clone()),
            None => {
                let err = ContainerErrorKind::ContainerNotFound { id };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Gets the default container for the `"default"` id, otherwise the registered container,
    /// creating and registering it if there is none.
    #[must_use]
    pub fn of(&self, id: impl Into<ContainerId>) -> Container {
        let id = id.into();
        if id.is_default() {
            return self.default_container();
        }

        let mut containers = self.inner.containers.lock();
        containers
            .entry(id)
            .or_insert_with_key(|id| {
                debug!(%id, "Container registered");
                Container::new(id.clone(), Arc::downgrade(&self.inner), self.inner.type_resolver.clone())
            })
            .clone()
    }

    /// Cached values of type `T` in the default container and every registered container.
    /// A value shared by several containers is returned once.
    #[must_use]
    pub fn get_instances_of<T: Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        let mut containers = Vec::from([self.default_container()]);
        containers.extend(self.inner.containers.lock().values().cloned());

        let mut instances: Vec<Arc<T>> = Vec::new();
        for value in containers.iter().flat_map(|container| container.instances_of(TypeId::of::<T>())) {
            let Ok(value) = value.downcast::<T>() else {
                continue;
            };
            if !instances.iter().any(|instance| Arc::ptr_eq(instance, &value)) {
                instances.push(value);
            }
        }
        instances
    }

    /// Unregisters the container and awaits the finalizers of the values it computed.
    /// The container is unregistered before any finalizer is called, and can't be used after that.
    /// Singletons still referenced by another container are kept.
    ///
    /// # Errors
    /// - Returns [`ContainerErrorKind::ContainerNotFound`] if the container isn't registered
    /// - Returns [`ContainerErrorKind::Disposal`] with every failed finalizer, after all of them are called
    pub async fn remove_container(&self, container: &Container) -> Result<(), ContainerErrorKind> {
        let span = info_span!("remove_container", id = %container.id());

        async {
            let removed = self.inner.containers.lock().remove(container.id());
            let Some(removed) = removed else {
                let err = ContainerErrorKind::ContainerNotFound { id: container.id().clone() };
                error!("{}", err);
                return Err(err);
            };
            debug!("Container unregistered");

            let errors = removed.dispose(false).await;
            if errors.is_empty() {
                debug!("Container disposed");
                return Ok(());
            }

            let err = ContainerErrorKind::Disposal(AggregateDisposalError { errors });
            error!("{}", err);
            Err(err)
        }
        .instrument(span)
        .await
    }

    /// Removes every registered container in id order, then disposes the default container, singletons included.
    ///
    /// # Errors
    /// Returns [`ContainerErrorKind::Disposal`] with every failed finalizer of all containers
    pub async fn shutdown(&self) -> Result<(), ContainerErrorKind> {
        let span = info_span!("shutdown");

        async {
            let containers = core::mem::take(&mut *self.inner.containers.lock());

            let mut errors = Vec::new();
            for (id, container) in containers {
                debug!(%id, "Container unregistered");
                errors.extend(container.dispose(false).await);
            }
            errors.extend(self.inner.default.dispose(true).await);

            if errors.is_empty() {
                debug!("Registry shut down");
                return Ok(());
            }

            let err = ContainerErrorKind::Disposal(AggregateDisposalError { errors });
            error!("{}", err);
            Err(err)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{ContainerId, ContainerRegistry};
    use crate::{
        errors::{ContainerErrorKind, ResolveErrorKind},
        InstantiateErrorKind, Scope, ServiceOptions,
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::Arc,
        vec::Vec,
    };
    use core::{
        sync::atomic::{AtomicU8, Ordering},
        time::Duration,
    };
    use std::sync::Mutex;
    use tokio::sync::Notify;
    use tracing::debug;
    use tracing_test::traced_test;

    struct Pool(u8);
    struct Session;

    #[test]
    fn test_container_id() {
        assert!(ContainerId::from("default").is_default());
        assert!(!ContainerId::from("request").is_default());
        assert_eq!(ContainerId::from("request".to_string()).to_string(), "request");
    }

    #[test]
    #[traced_test]
    fn test_register_container() {
        let registry = ContainerRegistry::new();

        assert!(matches!(registry.create_container("default"), Err(ContainerErrorKind::ReservedContainerId)));

        let container = registry.create_container("request").unwrap();
        assert!(matches!(
            registry.create_container("request"),
            Err(ContainerErrorKind::DuplicateContainerId { id }) if id.as_str() == "request"
        ));
        assert!(registry.has_container("request"));
        assert!(!registry.has_container("default"));
        assert!(Arc::ptr_eq(&registry.get_container("request").unwrap().inner, &container.inner));
        assert!(matches!(registry.get_container("unknown"), Err(ContainerErrorKind::ContainerNotFound { .. })));
    }

    #[test]
    #[traced_test]
    fn test_of() {
        let registry = ContainerRegistry::new();

        assert!(Arc::ptr_eq(&registry.of("default").inner, &registry.default_container().inner));

        let container = registry.of("request");
        assert!(registry.has_container("request"));
        assert!(Arc::ptr_eq(&registry.of("request").inner, &container.inner));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_remove_container() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));

        let registry = ContainerRegistry::new();
        registry
            .default_container()
            .set(
                ServiceOptions::factory(|| Ok::<_, InstantiateErrorKind>(Pool(1))).finalizer({
                    let finalizer_call_count = finalizer_call_count.clone();
                    move |_: Arc<Pool>| {
                        let finalizer_call_count = finalizer_call_count.clone();
                        async move {
                            finalizer_call_count.fetch_add(1, Ordering::SeqCst);
                            debug!("Finalizer called");
                            Ok(())
                        }
                    }
                }),
            )
            .unwrap();
        let container = registry.create_container("request").unwrap();
        let pool = container.get::<Pool>().unwrap();
        let default_pool = registry.default_container().get::<Pool>().unwrap();
        assert!(!Arc::ptr_eq(&pool, &default_pool));

        registry.remove_container(&container).await.unwrap();
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 1);
        assert!(!registry.has_container("request"));
        assert!(container.is_disposed());
        assert!(matches!(container.get::<Pool>(), Err(ResolveErrorKind::ContainerDisposed { .. })));
        assert!(matches!(
            container.set(ServiceOptions::value(Session)),
            Err(ResolveErrorKind::ContainerDisposed { .. })
        ));

        // The default container isn't affected
        assert!(Arc::ptr_eq(&registry.default_container().get::<Pool>().unwrap(), &default_pool));

        assert!(matches!(
            registry.remove_container(&container).await,
            Err(ContainerErrorKind::ContainerNotFound { .. })
        ));
        assert!(matches!(
            registry.remove_container(&registry.default_container()).await,
            Err(ContainerErrorKind::ContainerNotFound { .. })
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_container_unregistered_before_finalizers() {
        let registry = ContainerRegistry::new();
        let observed = Arc::new(Mutex::new(Vec::new()));

        let container = registry.create_container("request").unwrap();
        container
            .set(ServiceOptions::factory(|| Ok::<_, InstantiateErrorKind>(Session)).finalizer({
                let registry = registry.clone();
                let observed = observed.clone();
                move |_: Arc<Session>| {
                    let registry = registry.clone();
                    let observed = observed.clone();
                    async move {
                        tokio::task::yield_now().await;
                        observed.lock().unwrap().push((registry.has_container("request"), registry.get_container("request").is_err()));
                        Ok(())
                    }
                }
            }))
            .unwrap();
        container.get::<Session>().unwrap();

        registry.remove_container(&container).await.unwrap();
        assert_eq!(*observed.lock().unwrap(), [(false, true)]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_disposal_errors_are_aggregated() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));
        let finalizer = |fail: bool| {
            let finalizer_call_count = finalizer_call_count.clone();
            move |_: Arc<Pool>| {
                let finalizer_call_count = finalizer_call_count.clone();
                async move {
                    finalizer_call_count.fetch_add(1, Ordering::SeqCst);
                    if fail {
                        Err(anyhow::anyhow!("Connection reset"))
                    } else {
                        Ok(())
                    }
                }
            }
        };

        let registry = ContainerRegistry::new();
        let container = registry.create_container("request").unwrap();
        for (n, fail) in [(1, true), (2, false), (3, true)] {
            container
                .set(
                    ServiceOptions::factory(move || Ok::<_, InstantiateErrorKind>(Pool(n)))
                        .id(n.to_string())
                        .finalizer(finalizer(fail)),
                )
                .unwrap();
            container.get_by::<Pool>(n.to_string()).unwrap();
        }

        let Err(ContainerErrorKind::Disposal(err)) = registry.remove_container(&container).await else {
            panic!("Disposal errors expected");
        };
        assert_eq!(err.errors.len(), 2);
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 3);
        assert!(!registry.has_container("request"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_finalizers_run_concurrently() {
        // Each finalizer wakes the other one, then waits for it
        let notifies = Arc::new([Notify::new(), Notify::new()]);
        let finalizer = |own: usize| {
            let notifies = notifies.clone();
            move |_: Arc<Pool>| {
                let notifies = notifies.clone();
                async move {
                    notifies[1 - own].notify_one();
                    notifies[own].notified().await;
                    Ok(())
                }
            }
        };

        let registry = ContainerRegistry::new();
        let container = registry.create_container("request").unwrap();
        for (n, id) in [(0, "a"), (1, "b")] {
            container
                .set(
                    ServiceOptions::factory(move || Ok::<_, InstantiateErrorKind>(Pool(n)))
                        .id(id)
                        .finalizer(finalizer(usize::from(n))),
                )
                .unwrap();
            container.get_by::<Pool>(id).unwrap();
        }

        let removed = tokio::time::timeout(Duration::from_secs(5), registry.remove_container(&container)).await;
        assert!(matches!(removed, Ok(Ok(()))));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_supplied_and_unresolved_values_arent_finalized() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));
        let finalizer = {
            let finalizer_call_count = finalizer_call_count.clone();
            move |_: Arc<Pool>| {
                let finalizer_call_count = finalizer_call_count.clone();
                async move {
                    finalizer_call_count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        };

        let registry = ContainerRegistry::new();
        let container = registry.create_container("request").unwrap();
        container
            .set(ServiceOptions::value(Pool(1)).id("supplied").finalizer(finalizer.clone()))
            .unwrap()
            .set(
                ServiceOptions::factory(|| Ok::<_, InstantiateErrorKind>(Pool(2)))
                    .id("unresolved")
                    .finalizer(finalizer),
            )
            .unwrap();
        container.get_by::<Pool>("supplied").unwrap();

        registry.remove_container(&container).await.unwrap();
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_singletons_survive_container_removal() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));

        let registry = ContainerRegistry::new();
        let container_a = registry.create_container("a").unwrap();
        let container_b = registry.create_container("b").unwrap();
        let options = || {
            let finalizer_call_count = finalizer_call_count.clone();
            ServiceOptions::factory(|| Ok::<_, InstantiateErrorKind>(Pool(1)))
                .scope(Scope::Singleton)
                .finalizer(move |_: Arc<Pool>| {
                    let finalizer_call_count = finalizer_call_count.clone();
                    async move {
                        finalizer_call_count.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
        };
        container_a.set(options()).unwrap();
        container_b.set(options()).unwrap();
        let pool = container_a.get::<Pool>().unwrap();

        registry.remove_container(&container_a).await.unwrap();
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 0);
        assert!(Arc::ptr_eq(&container_b.get::<Pool>().unwrap(), &pool));

        registry.shutdown().await.unwrap();
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 1);
        assert!(!registry.has_container("b"));
        assert!(container_b.is_disposed());
        assert!(registry.default_container().is_disposed());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unreferenced_singleton_is_finalized() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));

        let registry = ContainerRegistry::new();
        registry
            .default_container()
            .set(ServiceOptions::factory(|| Ok::<_, InstantiateErrorKind>(Session)).scope(Scope::Singleton))
            .unwrap();
        let container = registry.create_container("request").unwrap();
        container
            .set(
                ServiceOptions::factory(|| Ok::<_, InstantiateErrorKind>(Pool(1)))
                    .scope(Scope::Singleton)
                    .finalizer({
                        let finalizer_call_count = finalizer_call_count.clone();
                        move |_: Arc<Pool>| {
                            let finalizer_call_count = finalizer_call_count.clone();
                            async move {
                                finalizer_call_count.fetch_add(1, Ordering::SeqCst);
                                Ok(())
                            }
                        }
                    }),
            )
            .unwrap();
        container.get::<Pool>().unwrap();
        let session = container.get::<Session>().unwrap();

        registry.remove_container(&container).await.unwrap();
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 1);
        // Only the removed container referenced it
        assert!(matches!(
            registry.default_container().get::<Pool>(),
            Err(ResolveErrorKind::ServiceNotFound { .. })
        ));
        // Still referenced by the default container
        assert!(Arc::ptr_eq(&registry.default_container().get::<Session>().unwrap(), &session));

        registry.shutdown().await.unwrap();
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_disposed_container_cant_be_registered() {
        let registry = ContainerRegistry::new();
        let container = registry.create_container("request").unwrap();
        registry.remove_container(&container).await.unwrap();

        assert!(matches!(
            registry.register_container(container),
            Err(ContainerErrorKind::ContainerDisposed { id }) if id.as_str() == "request"
        ));
        assert!(!registry.has_container("request"));
        assert!(!registry.create_container("request").unwrap().is_disposed());
    }

    #[test]
    #[traced_test]
    fn test_get_instances_of() {
        let registry = ContainerRegistry::new();
        registry
            .default_container()
            .set(ServiceOptions::factory(|| Ok::<_, InstantiateErrorKind>(Pool(0))))
            .unwrap();
        let container_a = registry.create_container("a").unwrap();
        let container_b = registry.create_container("b").unwrap();
        for container in [&container_a, &container_b] {
            container
                .set(ServiceOptions::factory(|| Ok::<_, InstantiateErrorKind>(Session)).scope(Scope::Singleton))
                .unwrap();
        }

        assert!(registry.get_instances_of::<Pool>().is_empty());

        container_a.get::<Pool>().unwrap();
        container_b.get::<Pool>().unwrap();
        container_a.get::<Session>().unwrap();
        container_b.get::<Session>().unwrap();

        // Only the resolved ones
        assert_eq!(registry.get_instances_of::<Pool>().len(), 2);
        // Shared by both containers and the default one
        assert_eq!(registry.get_instances_of::<Session>().len(), 1);
        assert!(registry.get_instances_of::<u8>().is_empty());
    }
}
