use crate::identifier::Identifier;

#[derive(thiserror::Error, Debug)]
#[error("Finalizer of \"{identifier}\" failed: {error}")]
pub struct FinalizeErrorKind {
    pub identifier: Identifier,
    pub error: anyhow::Error,
}
