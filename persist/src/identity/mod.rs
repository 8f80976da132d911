//! Durable identities for referenceable objects.
//!
//! - [`Uid`] — 64-bit identity, `0` meaning unset
//! - [`IdentityRegistry`] — UID ↔ live object mapping and pending references
//! - [`UidSource`] — injectable source of candidate UIDs

mod pending;
mod registry;
mod source;
mod uid;

pub use pending::{Holder, PendingReference};
pub use registry::IdentityRegistry;
pub use source::{RandomUidSource, UidSource};
pub use uid::Uid;
