//! Entity identity model.
//!
//! Every record stored through a repository implements [`Entity`]: it exposes
//! an identifier of any displayable type, and storage indexes it by the
//! identifier's string form ([`EntityKey`]). Identifiers such as integers,
//! UUIDs or ULIDs therefore all share one keying scheme, and an id passed to
//! `get_by_id` matches the stored entity whenever both render to the same
//! string.
//!
//! [`EntityModel`] is the runtime witness of the type a repository is bound
//! to. The compile-time generic already fixes the Rust type; the model adds a
//! discriminant for entity types that carry several logical models (an enum
//! whose variants live in different repositories, for example).

mod model;

pub use model::EntityModel;

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A record with a unique identifier.
///
/// `Clone` is the deep copy used at every storage boundary: sessions store
/// owned clones and hand out owned clones, so a caller's value and the stored
/// value never alias.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The identifier type as it appears on the entity itself.
    type Id: fmt::Display + Send + Sync;

    /// The entity's identifier.
    fn id(&self) -> &Self::Id;

    /// The string-normalized storage key for this entity.
    fn key(&self) -> EntityKey {
        EntityKey::from_id(self.id())
    }

    /// The model this particular value belongs to.
    ///
    /// Defaults to the Rust type. Override it to return a per-variant model
    /// when one Rust type stores several logical models.
    fn model(&self) -> EntityModel {
        EntityModel::of::<Self>()
    }
}

/// String-normalized identifier used as the storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey(String);

impl EntityKey {
    /// Normalize any displayable identifier.
    pub fn from_id<I: fmt::Display + ?Sized>(id: &I) -> Self {
        Self(id.to_string())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntityKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EntityKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
