#![no_std]

extern crate alloc;

#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod constructable;
pub(crate) mod container;
pub(crate) mod container_registry;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod handler;
pub(crate) mod identifier;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod registry;
pub(crate) mod scope;
pub(crate) mod type_resolver;

pub use any::{RcAny, TypeInfo};
pub use config::Config;
pub use constructable::{Arguments, Constructable, Injected};
pub use container::Container;
pub use container_registry::{ContainerId, ContainerRegistry};
pub use dependency_resolver::DependencyResolver;
pub use errors::{
    AggregateDisposalError, ContainerErrorKind, FinalizeErrorKind, InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind,
};
pub use finalizer::Finalizer;
pub use handler::{HandlerEntry, HandlerResolver, InjectionPoint};
pub use identifier::{Identifier, Token};
pub use inject::{Inject, InjectMany};
pub use instantiator::{instance, Instantiator};
pub use registry::ServiceOptions;
pub use scope::Scope;
pub use type_resolver::{EagerType, LazyType, NoTypeInformation, StaticTypeResolver, TypeResolver, TypeSource, TypeWrapper};
