//! Runtime type witness for entity models.

use std::any::{type_name, TypeId};
use std::fmt;

/// The model a repository is bound to.
///
/// Two models are equal when both the Rust type and the model name match.
/// [`EntityModel::of`] derives the name from the type, [`EntityModel::named`]
/// lets one Rust type carry several named models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityModel {
    type_id: TypeId,
    name: &'static str,
}

impl EntityModel {
    /// The model for a Rust type, named after the type.
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: short_type_name(type_name::<T>()),
        }
    }

    /// A named model for a Rust type.
    pub fn named<T: 'static>(name: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name,
        }
    }

    /// The model name used in error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The Rust type behind this model.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Check whether this model is backed by the Rust type `T`.
    pub fn is_type<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Display for EntityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Strip the module path, keeping generic arguments out of the way.
///
/// `app::model::User` becomes `User`, `app::Wrapper<app::User>` becomes `Wrapper`.
fn short_type_name(full: &'static str) -> &'static str {
    let base = match full.find('<') {
        Some(pos) => &full[..pos],
        None => full,
    };
    base.rsplit("::").next().unwrap_or(base)
}
