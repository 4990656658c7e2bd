use super::errors::ResolveErrorKind;
use crate::Container;

/// Argument of a factory that is resolved from the active container before the factory is called.
pub trait DependencyResolver: Sized {
    type Error: Into<ResolveErrorKind>;

    #[allow(clippy::missing_errors_doc)]
    fn resolve(container: &Container) -> Result<Self, Self::Error>;
}

impl DependencyResolver for Container {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(container: &Container) -> Result<Self, Self::Error> {
        Ok(container.clone())
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = ResolveErrorKind;

            #[inline]
            #[allow(unused_variables)]
            fn resolve(container: &Container) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(container).map_err(Into::into)?,)*))
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);
