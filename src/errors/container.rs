use alloc::vec::Vec;
use core::fmt::{self, Display, Formatter};

use super::finalizer::FinalizeErrorKind;
use crate::container_registry::ContainerId;

#[derive(thiserror::Error, Debug)]
pub enum ContainerErrorKind {
    #[error("You can't register a container with the \"default\" id")]
    ReservedContainerId,
    #[error("Container with \"{id}\" id is already registered")]
    DuplicateContainerId { id: ContainerId },
    #[error("No container is registered with \"{id}\" id")]
    ContainerNotFound { id: ContainerId },
    #[error("Container \"{id}\" can't be registered after it has been disposed")]
    ContainerDisposed { id: ContainerId },
    #[error(transparent)]
    Disposal(AggregateDisposalError),
}

/// Every finalizer failure collected while disposing one or more containers.
#[derive(thiserror::Error, Debug)]
pub struct AggregateDisposalError {
    pub errors: Vec<FinalizeErrorKind>,
}

impl Display for AggregateDisposalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} finalizer(s) failed during disposal", self.errors.len())?;
        for err in &self.errors {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}
