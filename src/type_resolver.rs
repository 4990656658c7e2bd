use alloc::{collections::BTreeMap, sync::Arc};
use core::fmt::{self, Debug, Formatter};

use crate::{
    any::TypeInfo,
    handler::InjectionPoint,
    identifier::{Identifier, Token},
};

/// Deferred type reference, evaluated each time the injection is performed.
/// Returning `None` means the type is still unknown.
pub type LazyType = Arc<dyn Fn() -> Option<Identifier> + Send + Sync>;

/// Type of an injection point as known when the injection is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EagerType {
    Known(Identifier),
    /// The type is only known through the lazy reference, e.g. it's declared after the injection point
    Deferred,
    Unknown,
}

/// Eager and lazy type of an injection point.
#[derive(Clone)]
pub struct TypeWrapper {
    pub eager_type: EagerType,
    pub lazy_type: LazyType,
}

impl TypeWrapper {
    #[inline]
    #[must_use]
    pub fn known(identifier: impl Into<Identifier>) -> Self {
        let identifier = identifier.into();
        Self {
            eager_type: EagerType::Known(identifier.clone()),
            lazy_type: Arc::new(move || Some(identifier.clone())),
        }
    }

    #[inline]
    #[must_use]
    pub fn deferred(lazy_type: LazyType) -> Self {
        Self {
            eager_type: EagerType::Deferred,
            lazy_type,
        }
    }

    /// Type that the container is able to look a service up by
    #[inline]
    #[must_use]
    pub fn is_injectable(&self) -> bool {
        match &self.eager_type {
            EagerType::Known(identifier) => is_injectable(identifier),
            EagerType::Deferred => true,
            EagerType::Unknown => false,
        }
    }
}

impl Debug for TypeWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeWrapper").field("eager_type", &self.eager_type).finish_non_exhaustive()
    }
}

#[inline]
#[must_use]
pub(crate) fn is_injectable(identifier: &Identifier) -> bool {
    !identifier.type_info().is_some_and(TypeInfo::is_unconstrained)
}

/// Source of the type of an injection point
#[derive(Clone)]
pub enum TypeSource {
    /// Ask the [`TypeResolver`] of the registry
    Inferred,
    Identifier(Identifier),
    Lazy(LazyType),
}

impl TypeSource {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Identifier(Identifier::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> Option<Identifier> + Send + Sync + 'static,
    {
        Self::Lazy(Arc::new(f))
    }
}

impl From<Identifier> for TypeSource {
    fn from(identifier: Identifier) -> Self {
        Self::Identifier(identifier)
    }
}

impl From<&'static str> for TypeSource {
    fn from(name: &'static str) -> Self {
        Self::Identifier(name.into())
    }
}

impl From<Token> for TypeSource {
    fn from(token: Token) -> Self {
        Self::Identifier(token.into())
    }
}

impl From<&Token> for TypeSource {
    fn from(token: &Token) -> Self {
        Self::Identifier(token.into())
    }
}

impl From<LazyType> for TypeSource {
    fn from(lazy_type: LazyType) -> Self {
        Self::Lazy(lazy_type)
    }
}

/// Source of type information for injection points declared with [`TypeSource::Inferred`].
pub trait TypeResolver: Send + Sync {
    /// Returns `None` if no type information is available for the point
    fn resolve(&self, point: &InjectionPoint) -> Option<TypeWrapper>;
}

impl<F> TypeResolver for F
where
    F: Fn(&InjectionPoint) -> Option<TypeWrapper> + Send + Sync,
{
    #[inline]
    fn resolve(&self, point: &InjectionPoint) -> Option<TypeWrapper> {
        self(point)
    }
}

/// Type resolver without any type information, so every injection point needs an explicit type
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTypeInformation;

impl TypeResolver for NoTypeInformation {
    #[inline]
    fn resolve(&self, _point: &InjectionPoint) -> Option<TypeWrapper> {
        None
    }
}

/// Type resolver backed by a table of injection points.
///
/// # Example
/// ```rust
/// use stevedore::{ContainerRegistry, StaticTypeResolver};
///
/// struct Logger;
/// struct App;
///
/// let resolver = StaticTypeResolver::new()
///     .parameter::<App, Logger>("new", 0)
///     .property::<App, Logger>("logger");
/// let registry = ContainerRegistry::with_type_resolver(resolver);
/// ```
#[derive(Debug, Default, Clone)]
pub struct StaticTypeResolver {
    types: BTreeMap<InjectionPoint, Identifier>,
}

impl StaticTypeResolver {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with(mut self, point: InjectionPoint, identifier: impl Into<Identifier>) -> Self {
        self.types.insert(point, identifier.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn property<Target: 'static, T: ?Sized + 'static>(self, member: &'static str) -> Self {
        self.with(InjectionPoint::property::<Target>(member), Identifier::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn parameter<Target: 'static, T: ?Sized + 'static>(self, member: &'static str, index: usize) -> Self {
        self.with(InjectionPoint::parameter::<Target>(member, index), Identifier::of::<T>())
    }
}

impl TypeResolver for StaticTypeResolver {
    fn resolve(&self, point: &InjectionPoint) -> Option<TypeWrapper> {
        self.types.get(point).cloned().map(TypeWrapper::known)
    }
}

/// Type of an injection point by its source, `None` if nothing is known about it
#[must_use]
pub(crate) fn resolve_to_type_wrapper(source: TypeSource, point: &InjectionPoint, resolver: &dyn TypeResolver) -> Option<TypeWrapper> {
    match source {
        TypeSource::Inferred => resolver.resolve(point),
        TypeSource::Identifier(identifier) => Some(TypeWrapper::known(identifier)),
        TypeSource::Lazy(lazy_type) => Some(TypeWrapper::deferred(lazy_type)),
    }
}
