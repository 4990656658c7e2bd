use alloc::sync::Arc;
use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};

pub type RcAny = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Type info of the value behind a type-erased pointer.
    /// Only the id is known at runtime, so the name is a placeholder.
    #[inline]
    #[must_use]
    pub(crate) fn of_erased(value: &RcAny) -> Self {
        Self {
            name: "<erased>",
            id: (**value).type_id(),
        }
    }

    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        // Generic arguments may contain `::` too, so only strip the path before them
        let head = self.name.split_once('<').map_or(self.name, |(head, _)| head);
        match head.rsplit_once("::") {
            Some((path, _)) => &self.name[path.len() + 2..],
            None => self.name,
        }
    }

    /// `dyn Any` carries no information about the service it stands for,
    /// so it can't be used to look one up.
    #[inline]
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.id == TypeId::of::<dyn Any>() || self.id == TypeId::of::<dyn Any + Send>() || self.id == TypeId::of::<dyn Any + Send + Sync>()
    }
}
