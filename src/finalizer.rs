use alloc::sync::Arc;
use core::future::Future;
use futures::future::{BoxFuture, FutureExt as _};

use crate::any::{RcAny, TypeInfo};

/// Hook that is awaited for a cached value when the container owning it is disposed.
///
/// Implemented for closures like `|pool: Arc<Pool>| async move { pool.close().await }`.
pub trait Finalizer<Dep>: Clone + 'static {
    fn finalize(&mut self, dependency: Arc<Dep>) -> impl Future<Output = Result<(), anyhow::Error>> + Send;
}

pub(crate) type BoxedFinalizer = Arc<dyn Fn(RcAny) -> BoxFuture<'static, Result<(), anyhow::Error>> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_finalizer<Dep, Fin>(finalizer: Fin) -> BoxedFinalizer
where
    Dep: Send + Sync + 'static,
    Fin: Finalizer<Dep> + Send + Sync,
{
    Arc::new(move |dependency: RcAny| {
        let mut finalizer = finalizer.clone();

        async move {
            let dependency = dependency.downcast::<Dep>().map_err(|dependency| {
                anyhow::anyhow!(
                    "Finalizer expects `{}`, but the cached value has another type ({:?})",
                    TypeInfo::of::<Dep>(),
                    TypeInfo::of_erased(&dependency).id,
                )
            })?;
            finalizer.finalize(dependency).await
        }
        .boxed()
    })
}

impl<F, Fut, Dep> Finalizer<Dep> for F
where
    F: FnMut(Arc<Dep>) -> Fut + Clone + 'static,
    Fut: Future<Output = Result<(), anyhow::Error>> + Send,
{
    #[inline]
    fn finalize(&mut self, dependency: Arc<Dep>) -> impl Future<Output = Result<(), anyhow::Error>> + Send {
        self(dependency)
    }
}
