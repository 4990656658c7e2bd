use alloc::{borrow::Cow, string::String, sync::Arc};
use core::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

use crate::any::TypeInfo;

/// Key under which a service is registered.
///
/// The same service can be addressed by its concrete type, by a free-form name
/// or by an opaque [`Token`]. All three variants share one keyspace, so a type and
/// a name never collide even if the name spells the type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Identifier {
    Type(TypeInfo),
    Name(Cow<'static, str>),
    Token(Token),
}

impl Identifier {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeInfo::of::<T>())
    }

    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> Option<&TypeInfo> {
        match self {
            Self::Type(type_info) => Some(type_info),
            Self::Name(_) | Self::Token(_) => None,
        }
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(type_info) => write!(f, "MaybeConstructable<{}>", type_info.short_name()),
            Self::Name(name) => f.write_str(name),
            Self::Token(token) => Display::fmt(token, f),
        }
    }
}

impl From<TypeInfo> for Identifier {
    fn from(type_info: TypeInfo) -> Self {
        Self::Type(type_info)
    }
}

impl From<&'static str> for Identifier {
    fn from(name: &'static str) -> Self {
        Self::Name(Cow::Borrowed(name))
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Self::Name(Cow::Owned(name))
    }
}

impl From<Token> for Identifier {
    fn from(token: Token) -> Self {
        Self::Token(token)
    }
}

impl From<&Token> for Identifier {
    fn from(token: &Token) -> Self {
        Self::Token(token.clone())
    }
}

/// Opaque identifier compared by identity.
///
/// Two tokens created with the same label are different keys; clones of one token are the same key.
/// The label is only used in diagnostics.
#[derive(Clone)]
pub struct Token {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    label: Option<Cow<'static, str>>,
}

impl Token {
    #[inline]
    #[must_use]
    pub fn new(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner: Arc::new(TokenInner { label: Some(label.into()) }),
        }
    }

    #[inline]
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            inner: Arc::new(TokenInner { label: None }),
        }
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    #[inline]
    fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Token {}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Token<{}>", self.label().unwrap_or("UNSET_NAME"))
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
