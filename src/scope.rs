use core::fmt::{self, Display, Formatter};

/// Caching policy of a service, fixed at registration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Scope {
    /// Cached once per container that resolves it
    #[default]
    Container,
    /// Cached once per registry and shared by every container that references it
    Singleton,
    /// Never cached
    Transient,
}

impl Scope {
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Scope::Container => "container",
            Scope::Singleton => "singleton",
            Scope::Transient => "transient",
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        !matches!(self, Scope::Transient)
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
