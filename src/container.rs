use alloc::{
    boxed::Box,
    sync::{Arc, Weak},
    vec::Vec,
};
use core::{
    any::TypeId,
    sync::atomic::{AtomicBool, Ordering},
};
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, error, info_span, warn};

use crate::{
    any::{RcAny, TypeInfo},
    constructable::{Arguments, Injected, ProducedType},
    container_registry::{ContainerId, RegistryInner},
    errors::{FinalizeErrorKind, InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    handler::{HandlerEntry, InjectionPoint},
    identifier::Identifier,
    registry::{Registry, ServiceOptions, ServiceRecord},
    type_resolver::{resolve_to_type_wrapper, TypeResolver, TypeSource},
};

/// Isolated set of services and injection handlers.
///
/// Containers are created by a [`crate::ContainerRegistry`], which also owns the default container.
/// A container falls back to the services of the default container, so services declared once at
/// startup are available everywhere, and each container gets its own instance of container-scoped ones.
///
/// The handle is cheap to clone, all clones share the same services.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Container {
    #[must_use]
    pub(crate) fn new(id: ContainerId, registry: Weak<RegistryInner>, type_resolver: Arc<dyn TypeResolver>) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                id,
                registry,
                type_resolver,
                store: Mutex::new(Registry::default()),
                handlers: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &ContainerId {
        &self.inner.id
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Registers a service.
    ///
    /// A service that isn't [`ServiceOptions::multiple`] replaces the services registered before it under the same identifier.
    /// Singletons registered on a non-default container are stored in the default container and shared,
    /// so a singleton declared by several containers is computed once.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::ContainerDisposed`] if the container is disposed
    /// - Returns an error of the computation for [`ServiceOptions::eager`] services
    pub fn set(&self, options: ServiceOptions) -> Result<&Self, ResolveErrorKind> {
        let span = info_span!("set", identifier = %options.identifier(), container = %self.inner.id);
        let _guard = span.enter();

        self.check_disposed()?;

        let record = Arc::new(ServiceRecord::new(options));
        let record = match self.fallback_container() {
            Some(default) if record.is_singleton() => {
                let canonical = if record.config.multiple {
                    None
                } else {
                    default.inner.store.lock().get_singleton(&record.identifier)
                };
                let canonical = match canonical {
                    Some(canonical) => {
                        debug!("Singleton already registered in the default container");
                        canonical
                    }
                    None => {
                        default.inner.store.lock().insert(record.clone());
                        record
                    }
                };
                canonical.add_reference(self.inner.id.clone());
                self.inner.store.lock().insert(canonical.clone());
                canonical
            }
            _ => {
                if record.is_singleton() {
                    record.add_reference(self.inner.id.clone());
                }
                self.inner.store.lock().insert(record.clone());
                record
            }
        };

        if record.config.computes_eagerly() {
            debug!("Computing eagerly");
            self.resolve_record(&record)?;
        }

        Ok(self)
    }

    /// Gets a service by its type
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::ServiceNotFound`] if no service is registered with the type
    /// - Returns [`ResolveErrorKind::IncorrectType`] if the service provides another type
    /// - Returns an error of the service computation
    #[inline]
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_by(Identifier::of::<T>())
    }

    /// Gets a service by any identifier.
    /// If several services are registered under the identifier, the last registered one is returned.
    ///
    /// # Errors
    /// See [`Self::get`]
    #[inline]
    pub fn get_by<T: Send + Sync + 'static>(&self, identifier: impl Into<Identifier>) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_any(&identifier.into()).and_then(downcast)
    }

    /// # Errors
    /// See [`Self::get`]
    pub fn get_any(&self, identifier: &Identifier) -> Result<RcAny, ResolveErrorKind> {
        let span = info_span!("get", %identifier, container = %self.inner.id);
        let _guard = span.enter();

        self.check_disposed()?;

        let record = self.find_record(identifier)?;
        self.resolve_record(&record)
    }

    /// Gets every service registered as [`ServiceOptions::multiple`] under the type, in registration order.
    /// If there are none, the single registered service is returned.
    ///
    /// # Errors
    /// See [`Self::get`]
    #[inline]
    pub fn get_many<T: Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        self.get_many_by(Identifier::of::<T>())
    }

    /// # Errors
    /// See [`Self::get`]
    #[inline]
    pub fn get_many_by<T: Send + Sync + 'static>(&self, identifier: impl Into<Identifier>) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        self.get_many_any(&identifier.into())?.into_iter().map(downcast).collect()
    }

    /// # Errors
    /// See [`Self::get`]
    pub fn get_many_any(&self, identifier: &Identifier) -> Result<Vec<RcAny>, ResolveErrorKind> {
        let span = info_span!("get_many", %identifier, container = %self.inner.id);
        let _guard = span.enter();

        self.check_disposed()?;

        let records = self.find_records(identifier)?;
        records.iter().map(|record| self.resolve_record(record)).collect()
    }

    /// Checks if a service is registered in this container, the default container isn't checked.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::ContainerDisposed`] if the container is disposed
    pub fn has(&self, identifier: impl Into<Identifier>) -> Result<bool, ResolveErrorKind> {
        self.check_disposed()?;
        Ok(self.inner.store.lock().contains(&identifier.into()))
    }

    /// Removes every service registered under the identifier.
    /// Finalizers aren't called, cached values are dropped with their last reference.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::ContainerDisposed`] if the container is disposed
    pub fn remove(&self, identifier: impl Into<Identifier>) -> Result<&Self, ResolveErrorKind> {
        self.check_disposed()?;

        let identifier = identifier.into();
        let removed = self.inner.store.lock().remove(&identifier);
        for record in removed.iter().flatten().filter(|record| record.is_singleton()) {
            record.remove_reference(&self.inner.id);
        }
        debug!(%identifier, container = %self.inner.id, "Removed");

        Ok(self)
    }

    /// Registers a handler that is run every time an instance of its target type is built by this container.
    /// Handlers registered on the default container are run by every container.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::ContainerDisposed`] if the container is disposed
    pub fn register_handler(&self, handler: HandlerEntry) -> Result<&Self, ResolveErrorKind> {
        self.check_disposed()?;

        debug!(point = %handler.point, container = %self.inner.id, "Handler registered");
        self.inner.handlers.lock().push(handler);

        Ok(self)
    }

    /// Declares that the injection point receives the service of the type given by the source.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::CannotInjectValue`] if the type of the point is unknown,
    /// or unconstrained like `dyn Any`
    #[inline]
    pub fn inject(&self, point: InjectionPoint, source: impl Into<TypeSource>) -> Result<&Self, ResolveErrorKind> {
        self.declare_injection(point, source.into(), false)
    }

    /// Declares that the injection point receives every service of the type given by the source, see [`Self::get_many`].
    ///
    /// # Errors
    /// See [`Self::inject`]
    #[inline]
    pub fn inject_many(&self, point: InjectionPoint, source: impl Into<TypeSource>) -> Result<&Self, ResolveErrorKind> {
        self.declare_injection(point, source.into(), true)
    }
}

impl Container {
    fn check_disposed(&self) -> Result<(), ResolveErrorKind> {
        if self.is_disposed() {
            let err = ResolveErrorKind::ContainerDisposed { id: self.inner.id.clone() };
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    /// Default container of the registry, `None` for the default container itself
    fn fallback_container(&self) -> Option<Container> {
        if self.inner.id.is_default() {
            return None;
        }
        self.inner.registry.upgrade().map(|registry| registry.default.clone())
    }

    fn not_found(identifier: &Identifier) -> ResolveErrorKind {
        let err = ResolveErrorKind::ServiceNotFound {
            identifier: identifier.clone(),
        };
        error!("{}", err);
        err
    }

    /// Record of this container or the one adopted from the default container
    fn find_record(&self, identifier: &Identifier) -> Result<Arc<ServiceRecord>, ResolveErrorKind> {
        if let Some(record) = self.inner.store.lock().get(identifier) {
            return Ok(record);
        }
        self.adopt_all(identifier)?;
        self.inner.store.lock().get(identifier).ok_or_else(|| Self::not_found(identifier))
    }

    fn find_records(&self, identifier: &Identifier) -> Result<Vec<Arc<ServiceRecord>>, ResolveErrorKind> {
        if let Some(records) = self.inner.store.lock().get_many(identifier) {
            return Ok(records);
        }
        self.adopt_all(identifier)?;
        self.inner.store.lock().get_many(identifier).ok_or_else(|| Self::not_found(identifier))
    }

    /// Adopts every record of the default container under the identifier, in registration order,
    /// so later single and multiple lookups see the same sequence
    fn adopt_all(&self, identifier: &Identifier) -> Result<(), ResolveErrorKind> {
        let Some(default) = self.fallback_container() else {
            return Err(Self::not_found(identifier));
        };
        let Some(globals) = default.inner.store.lock().get_all(identifier) else {
            warn!("Not found in the default container");
            return Err(Self::not_found(identifier));
        };

        let mut store = self.inner.store.lock();
        // Another thread could adopt them while this one was waiting
        if store.contains(identifier) {
            return Ok(());
        }
        for global in globals {
            self.adopt(&mut store, global);
        }
        Ok(())
    }

    /// Singletons are shared with the default container, other records are copied without their cached value
    fn adopt(&self, store: &mut Registry, global: Arc<ServiceRecord>) {
        let record = if global.is_singleton() {
            global.add_reference(self.inner.id.clone());
            global
        } else {
            Arc::new(global.clone_definition())
        };
        debug!(scope = %record.config.scope, "Adopted from the default container");

        store.insert(record);
    }

    fn resolve_record(&self, record: &Arc<ServiceRecord>) -> Result<RcAny, ResolveErrorKind> {
        if let Some(value) = record.cache.get() {
            debug!("Found in cache");
            return Ok(value);
        }
        debug!("Not found in cache");

        if !record.config.scope.is_cached() {
            return self.compute(record);
        }

        let _computing = record.cache.lock_computing();
        // Another thread could compute the value while this one was waiting
        if let Some(value) = record.cache.get() {
            debug!("Found in cache");
            return Ok(value);
        }
        self.compute(record)
    }

    fn compute(&self, record: &ServiceRecord) -> Result<RcAny, ResolveErrorKind> {
        if let Some(factory) = &record.factory {
            return match factory(self) {
                Ok(value) => Ok(cache_value(record, value)),
                Err(err) => {
                    let err = ResolveErrorKind::from(err);
                    error!("{}", err);
                    Err(err)
                }
            };
        }

        let Some(produced_type) = record.produced_type else {
            let err = ResolveErrorKind::CannotInstantiateValue {
                identifier: record.identifier.clone(),
            };
            error!("{}", err);
            return Err(err);
        };

        let handlers = self.handlers_for(&produced_type.type_info);
        let arguments = self.constructor_arguments(&handlers)?;
        let instance = match produced_type.construct(Arguments::new(self, arguments)) {
            Ok(instance) => instance,
            Err(err) => {
                error!("{}", err);
                return Err(factory_error(err));
            }
        };
        debug!("Constructed");

        // Cached before the property pass, so properties referring back to the record see this instance
        let instance = cache_value(record, instance);
        self.apply_property_handlers(&produced_type, &instance, &handlers)?;

        Ok(instance)
    }

    /// Handlers of the default container go first
    fn handlers_for(&self, target: &TypeInfo) -> Vec<HandlerEntry> {
        let mut handlers = Vec::new();
        if let Some(default) = self.fallback_container() {
            handlers.extend(default.inner.handlers.lock().iter().filter(|handler| handler.point.target == *target).cloned());
        }
        handlers.extend(self.inner.handlers.lock().iter().filter(|handler| handler.point.target == *target).cloned());
        handlers
    }

    /// The first handler registered for a position wins
    fn constructor_arguments(&self, handlers: &[HandlerEntry]) -> Result<Vec<Option<Injected>>, ResolveErrorKind> {
        let len = handlers
            .iter()
            .filter_map(|handler| handler.point.index)
            .max()
            .map_or(0, |index| index + 1);

        let mut arguments: Vec<Option<Injected>> = (0..len).map(|_| None).collect();
        for handler in handlers {
            let Some(slot) = handler.point.index.and_then(|index| arguments.get_mut(index)) else {
                continue;
            };
            if slot.is_some() {
                continue;
            }
            match handler.resolve(self) {
                Ok(value) => *slot = Some(value),
                Err(err) => {
                    error!(point = %handler.point, "{}", err);
                    return Err(dependency_error(err));
                }
            }
        }
        Ok(arguments)
    }

    fn apply_property_handlers(&self, produced_type: &ProducedType, instance: &RcAny, handlers: &[HandlerEntry]) -> Result<(), ResolveErrorKind> {
        for handler in handlers.iter().filter(|handler| handler.point.index.is_none()) {
            let value = match handler.resolve(self) {
                Ok(value) => value,
                Err(err) => {
                    error!(point = %handler.point, "{}", err);
                    return Err(dependency_error(err));
                }
            };
            if let Err(err) = produced_type.inject_property(instance, handler.point.member, value) {
                error!(point = %handler.point, "{}", err);
                return Err(factory_error(err));
            }
            debug!(point = %handler.point, "Injected");
        }
        Ok(())
    }

    fn declare_injection(&self, point: InjectionPoint, source: TypeSource, many: bool) -> Result<&Self, ResolveErrorKind> {
        let handler = resolve_to_type_wrapper(source, &point, &*self.inner.type_resolver)
            .ok_or_else(|| point.cannot_inject())
            .and_then(|type_wrapper| HandlerEntry::injection(point, type_wrapper, many));
        match handler {
            Ok(handler) => self.register_handler(handler),
            Err(err) => {
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Cached values of the container whose concrete type is `type_id`
    pub(crate) fn instances_of(&self, type_id: TypeId) -> Vec<RcAny> {
        self.inner
            .store
            .lock()
            .iter()
            .filter_map(|record| record.cache.get())
            .filter(|value| (**value).type_id() == type_id)
            .collect()
    }

    /// Marks the container as disposed and awaits the finalizers of the values it computed.
    /// Singletons still referenced by another container are only dereferenced unless `include_singletons` is set.
    pub(crate) async fn dispose(&self, include_singletons: bool) -> Vec<FinalizeErrorKind> {
        self.inner.disposed.store(true, Ordering::Release);

        let records: Vec<_> = {
            let store = core::mem::take(&mut *self.inner.store.lock());
            store.iter().cloned().collect()
        };
        self.inner.handlers.lock().clear();

        let default = self.fallback_container();
        let mut finalizers = Vec::new();
        for record in records {
            if record.is_singleton() {
                let referenced = record.remove_reference(&self.inner.id);
                if referenced && !include_singletons {
                    continue;
                }
                // The last container referencing the singleton owns its disposal
                if let Some(default) = &default {
                    default.inner.store.lock().remove_record(&record);
                }
            }
            // Values passed by the caller are owned by the caller
            if !record.is_recomputable() {
                continue;
            }
            let Some(value) = record.cache.take() else {
                continue;
            };
            let Some(finalizer) = record.finalizer.clone() else {
                continue;
            };

            let identifier = record.identifier.clone();
            finalizers.push(async move {
                let result = finalizer(value).await;
                debug!(%identifier, "Finalizer called");
                result.map_err(|error| FinalizeErrorKind { identifier, error })
            });
        }

        join_all(finalizers).await.into_iter().filter_map(Result::err).collect()
    }
}

pub(crate) struct ContainerInner {
    pub(crate) id: ContainerId,
    pub(crate) registry: Weak<RegistryInner>,
    pub(crate) type_resolver: Arc<dyn TypeResolver>,
    pub(crate) store: Mutex<Registry>,
    pub(crate) handlers: Mutex<Vec<HandlerEntry>>,
    disposed: AtomicBool,
}

fn cache_value(record: &ServiceRecord, value: RcAny) -> RcAny {
    if record.config.scope.is_cached() {
        let value = record.cache.insert(value);
        debug!("Cached");
        value
    } else {
        value
    }
}

fn downcast<T: Send + Sync + 'static>(value: RcAny) -> Result<Arc<T>, ResolveErrorKind> {
    value.downcast::<T>().map_err(|value| {
        let err = ResolveErrorKind::IncorrectType {
            expected: TypeInfo::of::<T>(),
            actual: TypeInfo::of_erased(&value),
        };
        error!("{}", err);
        err
    })
}

#[inline]
fn dependency_error(err: ResolveErrorKind) -> ResolveErrorKind {
    ResolveErrorKind::Instantiator(InstantiatorErrorKind::Deps(Box::new(err)))
}

#[inline]
fn factory_error(err: InstantiateErrorKind) -> ResolveErrorKind {
    ResolveErrorKind::Instantiator(InstantiatorErrorKind::Factory(err))
}
