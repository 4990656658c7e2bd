use alloc::boxed::Box;

use super::dependency_resolver::ResolveErrorKind;

#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Constructor argument at position {index} wasn't injected")]
    MissingArgument { index: usize },
    #[error("Member `{member}` can't be injected")]
    UnknownMember { member: &'static str },
    #[error("Injected value has incorrect type, expected: {expected}")]
    IncorrectType { expected: &'static str },
    #[error(transparent)]
    Resolve(Box<ResolveErrorKind>),
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

impl From<ResolveErrorKind> for InstantiateErrorKind {
    fn from(err: ResolveErrorKind) -> Self {
        Self::Resolve(Box::new(err))
    }
}
