use alloc::{sync::Arc, vec, vec::Vec};
use core::any::type_name;

use crate::{
    any::{RcAny, TypeInfo},
    container::Container,
    errors::InstantiateErrorKind,
};

/// Type that the container is able to build by itself, without a factory.
///
/// Constructor parameters are injected by handlers registered with a positional index
/// and are passed in [`Arguments`]. Property handlers run after the instance is built and cached,
/// so properties are set through `&self`, usually into a `OnceLock` or a lock.
/// This is what lets two services reference each other through properties.
///
/// # Example
/// ```rust
/// use std::sync::{Arc, OnceLock};
/// use stevedore::{Arguments, Constructable, InstantiateErrorKind, Injected};
///
/// struct Logger;
///
/// impl Constructable for Logger {
///     fn construct(_: Arguments<'_>) -> Result<Self, InstantiateErrorKind> {
///         Ok(Self)
///     }
/// }
///
/// struct App {
///     logger: Arc<Logger>,
///     plugins: OnceLock<Vec<Arc<Logger>>>,
/// }
///
/// impl Constructable for App {
///     fn construct(mut arguments: Arguments<'_>) -> Result<Self, InstantiateErrorKind> {
///         Ok(Self {
///             logger: arguments.resolve(0)?,
///             plugins: OnceLock::new(),
///         })
///     }
///
///     fn inject_property(&self, member: &'static str, value: Injected) -> Result<(), InstantiateErrorKind> {
///         match member {
///             "plugins" => {
///                 let _ = self.plugins.set(value.many()?);
///                 Ok(())
///             }
///             _ => Err(InstantiateErrorKind::UnknownMember { member }),
///         }
///     }
/// }
/// ```
pub trait Constructable: Sized + Send + Sync + 'static {
    #[allow(clippy::missing_errors_doc)]
    fn construct(arguments: Arguments<'_>) -> Result<Self, InstantiateErrorKind>;

    /// Receives the value of a property handler.
    ///
    /// # Errors
    /// The default implementation doesn't know any member and returns [`InstantiateErrorKind::UnknownMember`].
    #[inline]
    fn inject_property(&self, member: &'static str, value: Injected) -> Result<(), InstantiateErrorKind> {
        drop(value);
        Err(InstantiateErrorKind::UnknownMember { member })
    }
}

/// Value produced by a handler: a single service or every service registered under an identifier.
pub enum Injected {
    One(RcAny),
    Many(Vec<RcAny>),
}

impl Injected {
    /// # Errors
    /// Returns [`InstantiateErrorKind::IncorrectType`] if the value isn't a single `T`
    pub fn one<T: Send + Sync + 'static>(self) -> Result<Arc<T>, InstantiateErrorKind> {
        match self {
            Injected::One(value) => value
                .downcast()
                .map_err(|_| InstantiateErrorKind::IncorrectType { expected: type_name::<T>() }),
            Injected::Many(_) => Err(InstantiateErrorKind::IncorrectType { expected: type_name::<T>() }),
        }
    }

    /// A single value is accepted too and becomes a one-element list.
    ///
    /// # Errors
    /// Returns [`InstantiateErrorKind::IncorrectType`] if any value isn't a `T`
    pub fn many<T: Send + Sync + 'static>(self) -> Result<Vec<Arc<T>>, InstantiateErrorKind> {
        let values = match self {
            Injected::One(value) => vec![value],
            Injected::Many(values) => values,
        };
        values
            .into_iter()
            .map(|value| {
                value
                    .downcast()
                    .map_err(|_| InstantiateErrorKind::IncorrectType { expected: type_name::<T>() })
            })
            .collect()
    }
}

/// Constructor arguments of a [`Constructable`] type.
///
/// Positions targeted by parameter handlers are filled before [`Constructable::construct`] is called.
/// The resolving container is always available as the trailing argument.
pub struct Arguments<'a> {
    container: &'a Container,
    values: Vec<Option<Injected>>,
}

impl<'a> Arguments<'a> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(container: &'a Container, values: Vec<Option<Injected>>) -> Self {
        Self { container, values }
    }

    #[inline]
    #[must_use]
    pub const fn container(&self) -> &'a Container {
        self.container
    }

    /// Count of positions up to the last injected one
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// # Errors
    /// Returns [`InstantiateErrorKind::MissingArgument`] if no handler targets the position,
    /// or it has already been taken
    pub fn take(&mut self, index: usize) -> Result<Injected, InstantiateErrorKind> {
        self.values
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(InstantiateErrorKind::MissingArgument { index })
    }

    /// # Errors
    /// See [`Self::take`] and [`Injected::one`]
    #[inline]
    pub fn one<T: Send + Sync + 'static>(&mut self, index: usize) -> Result<Arc<T>, InstantiateErrorKind> {
        self.take(index)?.one()
    }

    /// # Errors
    /// See [`Self::take`] and [`Injected::many`]
    #[inline]
    pub fn many<T: Send + Sync + 'static>(&mut self, index: usize) -> Result<Vec<Arc<T>>, InstantiateErrorKind> {
        self.take(index)?.many()
    }

    /// Takes the injected value at the position or, if no handler targets it,
    /// resolves `T` by its type from the container.
    ///
    /// # Errors
    /// Returns [`InstantiateErrorKind::Resolve`] if `T` can't be resolved
    pub fn resolve<T: Send + Sync + 'static>(&mut self, index: usize) -> Result<Arc<T>, InstantiateErrorKind> {
        match self.values.get_mut(index).and_then(Option::take) {
            Some(injected) => injected.one(),
            None => self.container.get::<T>().map_err(Into::into),
        }
    }
}

/// Type-erased entry points of a [`Constructable`] type.
#[derive(Clone, Copy)]
pub(crate) struct ProducedType {
    pub(crate) type_info: TypeInfo,
    construct: fn(Arguments<'_>) -> Result<RcAny, InstantiateErrorKind>,
    inject_property: fn(&RcAny, &'static str, Injected) -> Result<(), InstantiateErrorKind>,
}

impl ProducedType {
    #[inline]
    #[must_use]
    pub(crate) fn of<T: Constructable>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            construct: construct_erased::<T>,
            inject_property: inject_property_erased::<T>,
        }
    }

    #[inline]
    pub(crate) fn construct(&self, arguments: Arguments<'_>) -> Result<RcAny, InstantiateErrorKind> {
        (self.construct)(arguments)
    }

    #[inline]
    pub(crate) fn inject_property(&self, instance: &RcAny, member: &'static str, value: Injected) -> Result<(), InstantiateErrorKind> {
        (self.inject_property)(instance, member, value)
    }
}

fn construct_erased<T: Constructable>(arguments: Arguments<'_>) -> Result<RcAny, InstantiateErrorKind> {
    T::construct(arguments).map(|instance| Arc::new(instance) as RcAny)
}

fn inject_property_erased<T: Constructable>(instance: &RcAny, member: &'static str, value: Injected) -> Result<(), InstantiateErrorKind> {
    match instance.downcast_ref::<T>() {
        Some(instance) => instance.inject_property(member, value),
        None => Err(InstantiateErrorKind::IncorrectType { expected: type_name::<T>() }),
    }
}
