use alloc::{boxed::Box, sync::Arc};
use tracing::debug;

use super::{
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
};
use crate::{any::RcAny, Container};

/// Factory of a service value.
///
/// Implemented for closures whose arguments implement [`DependencyResolver`],
/// for example `|Inject(logger): Inject<Logger>, container: Container| Ok(App::new(logger))`.
pub trait Instantiator<Deps>: Clone + 'static
where
    Deps: DependencyResolver,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    #[allow(clippy::missing_errors_doc)]
    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

pub(crate) type BoxedInstantiator =
    Arc<dyn Fn(&Container) -> Result<RcAny, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_instantiator<Inst, Deps>(instantiator: Inst) -> BoxedInstantiator
where
    Inst: Instantiator<Deps> + Send + Sync,
    Inst::Provides: Send + Sync,
    Deps: DependencyResolver,
{
    Arc::new(move |container: &Container| {
        let dependencies = match Deps::resolve(container) {
            Ok(dependencies) => dependencies,
            Err(err) => return Err(InstantiatorErrorKind::Deps(err.into())),
        };
        let dependency = match instantiator.clone().instantiate(dependencies) {
            Ok(dependency) => dependency,
            Err(err) => return Err(InstantiatorErrorKind::Factory(err.into())),
        };

        debug!("Resolved");

        Ok(Arc::new(dependency) as RcAny)
    })
}

impl From<InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>> for ResolveErrorKind {
    fn from(err: InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>) -> Self {
        match err {
            InstantiatorErrorKind::Deps(err) => Self::Instantiator(InstantiatorErrorKind::Deps(Box::new(err))),
            InstantiatorErrorKind::Factory(err) => Self::Instantiator(InstantiatorErrorKind::Factory(err)),
        }
    }
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

/// Wrapper to create an instantiator that just returns passed value.
/// It can be used when the value was created outside the container, but should be recreated by it
/// after the container is disposed, unlike [`crate::ServiceOptions::value`].
#[inline]
#[must_use]
pub fn instance<T: Clone + Send + Sync + 'static>(val: T) -> impl Instantiator<(), Provides = T, Error = InstantiateErrorKind> {
    move || Ok(val.clone())
}
