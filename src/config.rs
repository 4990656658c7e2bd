use crate::scope::Scope;

/// Config for a service record
/// ## Fields
/// - `scope`:
///   Caching policy of the provided value, see [`Scope`].
///
/// - `eager`:
///   If `true`, the value is computed while the record is registered instead of on first use.
///   Ignored for [`Scope::Transient`], because a value that is never cached can't be disposed later.
///
/// - `multiple`:
///   If `true`, the record is appended to the records already registered under the same identifier
///   and resolved together with them by `get_many`, otherwise it replaces them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub scope: Scope,
    pub eager: bool,
    pub multiple: bool,
}

impl Config {
    #[inline]
    #[must_use]
    pub(crate) const fn computes_eagerly(&self) -> bool {
        self.eager && self.scope.is_cached()
    }
}
