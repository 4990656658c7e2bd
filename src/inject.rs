use alloc::{sync::Arc, vec::Vec};

use crate::{dependency_resolver::DependencyResolver, Container, ResolveErrorKind};

/// Factory argument resolved by the type of `Dep`.
pub struct Inject<Dep>(pub Arc<Dep>);

impl<Dep: Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    type Error = ResolveErrorKind;

    fn resolve(container: &Container) -> Result<Self, Self::Error> {
        container.get().map(Self)
    }
}

/// Factory argument with every service registered under the type of `Dep`, in registration order.
pub struct InjectMany<Dep>(pub Vec<Arc<Dep>>);

impl<Dep: Send + Sync + 'static> DependencyResolver for InjectMany<Dep> {
    type Error = ResolveErrorKind;

    fn resolve(container: &Container) -> Result<Self, Self::Error> {
        container.get_many().map(Self)
    }
}
