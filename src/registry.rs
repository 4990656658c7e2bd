use alloc::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    vec,
    vec::Vec,
};
use parking_lot::Mutex;

use crate::{
    any::RcAny,
    cache::Cache,
    config::Config,
    constructable::{Constructable, ProducedType},
    container_registry::ContainerId,
    dependency_resolver::DependencyResolver,
    finalizer::{boxed_finalizer, BoxedFinalizer, Finalizer},
    identifier::Identifier,
    instantiator::{boxed_instantiator, BoxedInstantiator, Instantiator},
    scope::Scope,
};

/// Description of a service passed to [`crate::Container::set`].
///
/// A service is computed by its factory if one is set, otherwise it's built from its [`Constructable`] type.
/// A service registered with a value only can't be recomputed.
///
/// # Example
/// ```rust
/// use stevedore::{ContainerRegistry, InstantiateErrorKind, Scope, ServiceOptions};
///
/// struct Config {
///     url: &'static str,
/// }
///
/// let registry = ContainerRegistry::new();
/// registry
///     .default_container()
///     .set(ServiceOptions::factory(|| Ok::<_, InstantiateErrorKind>(Config { url: "postgres://" })).scope(Scope::Singleton))
///     .unwrap();
/// ```
#[must_use]
pub struct ServiceOptions {
    identifier: Identifier,
    produced_type: Option<ProducedType>,
    factory: Option<BoxedInstantiator>,
    value: Option<RcAny>,
    finalizer: Option<BoxedFinalizer>,
    config: Config,
}

impl ServiceOptions {
    /// Service without a way to compute it.
    /// Set one with [`Self::with_factory`], [`Self::with_type`] or [`Self::with_value`].
    #[inline]
    pub fn new(identifier: impl Into<Identifier>) -> Self {
        Self {
            identifier: identifier.into(),
            produced_type: None,
            factory: None,
            value: None,
            finalizer: None,
            config: Config::default(),
        }
    }

    /// Service of type `T` built by the container itself
    #[inline]
    pub fn of<T: Constructable>() -> Self {
        Self::new(Identifier::of::<T>()).with_type::<T>()
    }

    /// Service of the type provided by the factory
    #[inline]
    pub fn factory<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps> + Send + Sync,
        Inst::Provides: Send + Sync,
        Deps: DependencyResolver,
    {
        Self::new(Identifier::of::<Inst::Provides>()).with_factory(instantiator)
    }

    /// Service of type `T` with an already created value
    #[inline]
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Identifier::of::<T>()).with_value(value)
    }

    #[inline]
    pub fn id(mut self, identifier: impl Into<Identifier>) -> Self {
        self.identifier = identifier.into();
        self
    }

    #[inline]
    pub fn with_type<T: Constructable>(mut self) -> Self {
        self.produced_type = Some(ProducedType::of::<T>());
        self
    }

    #[inline]
    pub fn with_factory<Inst, Deps>(mut self, instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps> + Send + Sync,
        Inst::Provides: Send + Sync,
        Deps: DependencyResolver,
    {
        self.factory = Some(boxed_instantiator(instantiator));
        self
    }

    #[inline]
    pub fn with_value<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.value = Some(Arc::new(value));
        self
    }

    /// Adds a finalizer that is awaited for the cached value when the container owning it is disposed.
    ///
    /// # Warning
    /// The finalizer is only called for values the container computed itself,
    /// values passed with [`Self::value`] are owned by the caller.
    #[inline]
    pub fn finalizer<Dep, Fin>(mut self, finalizer: Fin) -> Self
    where
        Dep: Send + Sync + 'static,
        Fin: Finalizer<Dep> + Send + Sync,
    {
        self.finalizer = Some(boxed_finalizer(finalizer));
        self
    }

    #[inline]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.config.scope = scope;
        self
    }

    #[inline]
    pub fn eager(mut self) -> Self {
        self.config.eager = true;
        self
    }

    #[inline]
    pub fn multiple(mut self) -> Self {
        self.config.multiple = true;
        self
    }

    #[inline]
    #[must_use]
    pub const fn identifier(&self) -> &Identifier {
        &self.identifier
    }
}

pub(crate) struct ServiceRecord {
    pub(crate) identifier: Identifier,
    pub(crate) produced_type: Option<ProducedType>,
    pub(crate) factory: Option<BoxedInstantiator>,
    pub(crate) finalizer: Option<BoxedFinalizer>,
    pub(crate) config: Config,
    pub(crate) cache: Cache,
    referenced_by: Mutex<BTreeSet<ContainerId>>,
}

impl ServiceRecord {
    #[must_use]
    pub(crate) fn new(options: ServiceOptions) -> Self {
        let ServiceOptions {
            identifier,
            produced_type,
            factory,
            value,
            finalizer,
            config,
        } = options;

        Self {
            identifier,
            produced_type,
            factory,
            finalizer,
            config,
            cache: value.map_or_else(Cache::new, Cache::with_value),
            referenced_by: Mutex::new(BTreeSet::new()),
        }
    }

    /// Copy of the record definition for another container.
    /// The cache starts empty, except for records that can't be recomputed, which share the value.
    #[must_use]
    pub(crate) fn clone_definition(&self) -> Self {
        Self {
            identifier: self.identifier.clone(),
            produced_type: self.produced_type,
            factory: self.factory.clone(),
            finalizer: self.finalizer.clone(),
            config: self.config,
            cache: match self.cache.get() {
                Some(value) if !self.is_recomputable() => Cache::with_value(value),
                _ => Cache::new(),
            },
            referenced_by: Mutex::new(BTreeSet::new()),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) const fn is_recomputable(&self) -> bool {
        self.factory.is_some() || self.produced_type.is_some()
    }

    #[inline]
    #[must_use]
    pub(crate) const fn is_singleton(&self) -> bool {
        matches!(self.config.scope, Scope::Singleton)
    }

    #[inline]
    pub(crate) fn add_reference(&self, id: ContainerId) {
        self.referenced_by.lock().insert(id);
    }

    /// Returns `true` if another container still references the record
    #[inline]
    pub(crate) fn remove_reference(&self, id: &ContainerId) -> bool {
        let mut referenced_by = self.referenced_by.lock();
        referenced_by.remove(id);
        !referenced_by.is_empty()
    }
}

/// Records of one container, grouped by identifier in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    records: BTreeMap<Identifier, Vec<Arc<ServiceRecord>>>,
}

impl Registry {
    /// A single record replaces every single record registered before it under the same identifier,
    /// a multiple one is appended.
    pub(crate) fn insert(&mut self, record: Arc<ServiceRecord>) {
        let records = self.records.entry(record.identifier.clone()).or_default();
        if !record.config.multiple {
            records.retain(|record| record.config.multiple);
        }
        records.push(record);
    }

    /// The last registered record
    #[inline]
    #[must_use]
    pub(crate) fn get(&self, identifier: &Identifier) -> Option<Arc<ServiceRecord>> {
        self.records.get(identifier).and_then(|records| records.last()).cloned()
    }

    /// Every multiple record in registration order or, if there are none, the last registered record
    #[must_use]
    pub(crate) fn get_many(&self, identifier: &Identifier) -> Option<Vec<Arc<ServiceRecord>>> {
        let records = self.records.get(identifier)?;
        let multiple: Vec<_> = records.iter().filter(|record| record.config.multiple).cloned().collect();
        if multiple.is_empty() {
            records.last().map(|record| vec![record.clone()])
        } else {
            Some(multiple)
        }
    }

    /// Every record in registration order
    #[inline]
    #[must_use]
    pub(crate) fn get_all(&self, identifier: &Identifier) -> Option<Vec<Arc<ServiceRecord>>> {
        self.records.get(identifier).cloned()
    }

    #[inline]
    #[must_use]
    pub(crate) fn get_singleton(&self, identifier: &Identifier) -> Option<Arc<ServiceRecord>> {
        self.records
            .get(identifier)?
            .iter()
            .rev()
            .find(|record| record.is_singleton() && !record.config.multiple)
            .cloned()
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, identifier: &Identifier) -> bool {
        self.records.contains_key(identifier)
    }

    #[inline]
    pub(crate) fn remove(&mut self, identifier: &Identifier) -> Option<Vec<Arc<ServiceRecord>>> {
        self.records.remove(identifier)
    }

    /// Removes the record itself, other records under its identifier are kept
    pub(crate) fn remove_record(&mut self, record: &Arc<ServiceRecord>) {
        let Some(records) = self.records.get_mut(&record.identifier) else {
            return;
        };
        records.retain(|other| !Arc::ptr_eq(other, record));
        if records.is_empty() {
            self.records.remove(&record.identifier);
        }
    }

    #[inline]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<ServiceRecord>> {
        self.records.values().flatten()
    }
}
