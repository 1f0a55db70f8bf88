//! Names for the commodities and processes of a model.
//!
//! IDs are reference counted, so the many subprocess keys which mention the same commodity share
//! one allocation once they have been resolved against the dataset.
use anyhow::{Context, Result};
use indexmap::IndexSet;
use std::borrow::Borrow;
use std::fmt::Display;
use std::hash::Hash;

/// Common behaviour of ID types
pub trait IDLike: Eq + Hash + Borrow<str> + Clone + Display + From<String> {
    /// What the ID names, for use in error messages
    const KIND: &'static str;
}

macro_rules! define_id_type {
    ($name:ident, $kind:literal) => {
        #[doc = concat!("The name of a ", $kind)]
        #[derive(
            Clone,
            Debug,
            Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
            derive_more::Display,
        )]
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.into())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s.into())
            }
        }

        impl $crate::id::IDLike for $name {
            const KIND: &'static str = $kind;
        }
    };
}
pub(crate) use define_id_type;

/// Get the copy of `id` stored in `ids`, or an error if it is not present
pub fn resolve_id<ID: IDLike>(ids: &IndexSet<ID>, id: &str) -> Result<ID> {
    ids.get(id)
        .cloned()
        .with_context(|| format!("Unknown {} {id}", ID::KIND))
}
