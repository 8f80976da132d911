use std::any::Any;

use crate::error::LinkError;
use crate::handle::ObjectHandle;
use crate::reflect::Schema;

/// Object-safe trait for persisted entities.
///
/// An entity has a runtime type tag and an ordered set of members marked for
/// persistence, described by its [`Schema`]. Use `#[derive(Persistable)]` to
/// implement it together with [`PersistableType`]:
///
/// ```ignore
/// #[derive(Default, Persistable)]
/// #[persist(tag = "game::Door")]
/// struct Door {
///     #[save]
///     open: bool,
///     #[save]
///     key: Ref<Node>,
///     cached_mesh: Option<MeshId>, // transient
/// }
/// ```
pub trait Persistable: Any + Send + Sync {
    /// Runtime type tag written into the `"class"` key.
    fn type_tag(&self) -> &'static str;

    /// Builder for this type's schema, cached by the
    /// [`ReflectionIndex`](crate::reflect::ReflectionIndex).
    fn schema_builder(&self) -> fn() -> Schema;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Assign a live target to the reference member `member`.
    ///
    /// Called by the identity registry when a deferred reference resolves.
    /// The derive macro generates this by dispatching to
    /// [`Persist::link`](crate::Persist::link) on the named field.
    fn link_member(&mut self, member: &str, target: &ObjectHandle) -> Result<(), LinkError>;
}

/// Static side of [`Persistable`]: construction and schema without an
/// instance.
pub trait PersistableType: Persistable + Default + Sized {
    /// Type tag. Defaults to the Rust type path; override with
    /// `#[persist(tag = "...")]`.
    fn tag() -> &'static str;

    fn build_schema() -> Schema;
}
