mod container;
mod dependency_resolver;
mod finalizer;
mod instantiate;
mod instantiator;

pub use container::{AggregateDisposalError, ContainerErrorKind};
pub use dependency_resolver::ResolveErrorKind;
pub use finalizer::FinalizeErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;
