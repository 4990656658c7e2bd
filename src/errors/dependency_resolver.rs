use alloc::boxed::Box;

use super::{instantiate::InstantiateErrorKind, instantiator::InstantiatorErrorKind};
use crate::{any::TypeInfo, container_registry::ContainerId, identifier::Identifier};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error(
        "\
        Service with \"{identifier}\" identifier was not found in the container. \
        Register it before usage via explicitly calling the `Container::set` method\
        "
    )]
    ServiceNotFound { identifier: Identifier },
    #[error(
        "\
        Cannot inject value into \"{target}.{member}\". \
        Please make sure you setup the type resolver or pass an identifier explicitly\
        "
    )]
    CannotInjectValue { target: TypeInfo, member: &'static str },
    #[error(
        "\
        Cannot instantiate the requested value for the \"{identifier}\" identifier. \
        The related record doesn't have a factory or a constructable type\
        "
    )]
    CannotInstantiateValue { identifier: Identifier },
    #[error("Incorrect provided type. Actual: {actual:?}, expected: {expected}")]
    IncorrectType { expected: TypeInfo, actual: TypeInfo },
    #[error("Container \"{id}\" can't be used after it has been disposed")]
    ContainerDisposed { id: ContainerId },
    #[error(transparent)]
    Instantiator(InstantiatorErrorKind<Box<ResolveErrorKind>, InstantiateErrorKind>),
}
