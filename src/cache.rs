use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

use crate::any::RcAny;

/// Cached value of a service record.
///
/// `value` is only locked for reads and writes of the pointer, never while a value is computed.
/// Computation is serialized by `computing`, which is reentrant so that a property handler
/// resolving the record it's being run for observes the already cached instance instead of deadlocking.
pub(crate) struct Cache {
    value: Mutex<Option<RcAny>>,
    computing: ReentrantMutex<()>,
}

impl Cache {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            value: Mutex::new(None),
            computing: ReentrantMutex::new(()),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn with_value(value: RcAny) -> Self {
        Self {
            value: Mutex::new(Some(value)),
            computing: ReentrantMutex::new(()),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self) -> Option<RcAny> {
        self.value.lock().clone()
    }

    /// Stores the value unless another one was stored first.
    /// Returns the value that stays in the cache.
    #[inline]
    pub(crate) fn insert(&self, value: RcAny) -> RcAny {
        self.value.lock().get_or_insert(value).clone()
    }

    #[inline]
    #[must_use]
    pub(crate) fn take(&self) -> Option<RcAny> {
        self.value.lock().take()
    }

    #[inline]
    #[must_use]
    pub(crate) fn lock_computing(&self) -> ReentrantMutexGuard<'_, ()> {
        self.computing.lock()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::Cache;
    use crate::any::RcAny;

    use alloc::sync::Arc;

    #[test]
    fn test_first_insert_wins() {
        let cache = Cache::new();
        assert!(cache.get().is_none());

        let first: RcAny = Arc::new(1u8);
        let second: RcAny = Arc::new(2u8);

        let stored = cache.insert(first.clone());
        assert!(Arc::ptr_eq(&stored, &first));

        let stored = cache.insert(second);
        assert!(Arc::ptr_eq(&stored, &first));
        assert!(Arc::ptr_eq(&cache.get().unwrap(), &first));
    }

    #[test]
    fn test_take() {
        let cache = Cache::with_value(Arc::new(1u8));

        assert!(cache.take().is_some());
        assert!(cache.get().is_none());
        assert!(cache.take().is_none());
    }

    #[test]
    fn test_computing_is_reentrant() {
        let cache = Cache::new();

        let _outer = cache.lock_computing();
        let _inner = cache.lock_computing();
    }
}
