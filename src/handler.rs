use alloc::sync::Arc;
use core::fmt::{self, Debug, Display, Formatter};

use crate::{
    any::TypeInfo,
    constructable::Injected,
    errors::ResolveErrorKind,
    type_resolver::{is_injectable, TypeWrapper},
    Container,
};

/// Property or constructor parameter of a [`crate::Constructable`] type that receives a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InjectionPoint {
    pub target: TypeInfo,
    pub member: &'static str,
    /// Position of the constructor parameter, `None` for properties
    pub index: Option<usize>,
}

impl InjectionPoint {
    #[inline]
    #[must_use]
    pub fn property<Target: 'static>(member: &'static str) -> Self {
        Self {
            target: TypeInfo::of::<Target>(),
            member,
            index: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn parameter<Target: 'static>(member: &'static str, index: usize) -> Self {
        Self {
            target: TypeInfo::of::<Target>(),
            member,
            index: Some(index),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn cannot_inject(&self) -> ResolveErrorKind {
        ResolveErrorKind::CannotInjectValue {
            target: self.target,
            member: self.member,
        }
    }
}

impl Display for InjectionPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}.{}[{index}]", self.target, self.member),
            None => write!(f, "{}.{}", self.target, self.member),
        }
    }
}

pub type HandlerResolver = Arc<dyn Fn(&Container) -> Result<Injected, ResolveErrorKind> + Send + Sync>;

/// Deferred injection, run every time an instance of the target type is built.
#[derive(Clone)]
pub struct HandlerEntry {
    pub point: InjectionPoint,
    pub resolver: HandlerResolver,
}

impl HandlerEntry {
    #[inline]
    #[must_use]
    pub fn new<F>(point: InjectionPoint, resolver: F) -> Self
    where
        F: Fn(&Container) -> Result<Injected, ResolveErrorKind> + Send + Sync + 'static,
    {
        Self {
            point,
            resolver: Arc::new(resolver),
        }
    }

    /// Handler that looks a service up by the type of the injection point.
    /// The lazy type is evaluated on each call, so it may point to a service registered after the handler.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::CannotInjectValue`] if the eager type is unknown or unconstrained
    pub(crate) fn injection(point: InjectionPoint, type_wrapper: TypeWrapper, many: bool) -> Result<Self, ResolveErrorKind> {
        if !type_wrapper.is_injectable() {
            return Err(point.cannot_inject());
        }

        let TypeWrapper { lazy_type, .. } = type_wrapper;
        Ok(Self::new(point, move |container| {
            let identifier = lazy_type()
                .filter(is_injectable)
                .ok_or_else(|| point.cannot_inject())?;

            if many {
                container.get_many_any(&identifier).map(Injected::Many)
            } else {
                container.get_any(&identifier).map(Injected::One)
            }
        }))
    }

    #[inline]
    pub(crate) fn resolve(&self, container: &Container) -> Result<Injected, ResolveErrorKind> {
        (self.resolver)(container)
    }
}

impl Debug for HandlerEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry").field("point", &self.point).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{HandlerEntry, InjectionPoint};
    use crate::{
        identifier::Identifier,
        type_resolver::{EagerType, TypeWrapper},
        ContainerRegistry, ResolveErrorKind,
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::Arc,
    };
    use core::any::Any;
    use tracing_test::traced_test;

    struct App;

    #[test]
    fn test_display() {
        assert_eq!(InjectionPoint::property::<App>("logger").to_string(), "App.logger");
        assert_eq!(InjectionPoint::parameter::<App>("new", 1).to_string(), "App.new[1]");
    }

    #[test]
    fn test_eager_type_is_checked_on_declaration() {
        let point = InjectionPoint::property::<App>("logger");

        let unknown = TypeWrapper {
            eager_type: EagerType::Unknown,
            lazy_type: Arc::new(|| None),
        };
        assert!(matches!(
            HandlerEntry::injection(point, unknown, false),
            Err(ResolveErrorKind::CannotInjectValue { member: "logger", .. })
        ));
        assert!(matches!(
            HandlerEntry::injection(point, TypeWrapper::known(Identifier::of::<dyn Any + Send + Sync>()), true),
            Err(ResolveErrorKind::CannotInjectValue { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_lazy_type_is_checked_on_call() {
        let registry = ContainerRegistry::new();
        let container = registry.default_container();
        let point = InjectionPoint::property::<App>("logger");

        let handler = HandlerEntry::injection(point, TypeWrapper::deferred(Arc::new(|| None)), false).unwrap();
        assert!(matches!(
            handler.resolve(&container),
            Err(ResolveErrorKind::CannotInjectValue { member: "logger", .. })
        ));

        let handler = HandlerEntry::injection(point, TypeWrapper::known("logger"), false).unwrap();
        assert!(matches!(handler.resolve(&container), Err(ResolveErrorKind::ServiceNotFound { .. })));
    }
}
