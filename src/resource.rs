//! Record types exposed as resources and their immutable descriptors.

use crate::error::HookError;
use crate::hooks::{HookDispatcher, HookSet};
use crate::inflect;
use crate::store::{DocumentId, Namespace};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// A record type that can be served as a REST collection.
///
/// Serde provides the (de)serializer and fresh instances; the id accessors
/// expose the identifier field named by `ID_FIELD`. Hooks default to no-ops.
///
/// Only hooks listed in `HOOKS` are dispatched: overriding a hook method
/// without adding its flag to `HOOKS` means it never runs.
///
/// On a partial update `pre_update` runs on the fetched record, but only the
/// request's field set is written, so changes the hook makes are not stored.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// JSON field holding the identifier.
    const ID_FIELD: &'static str = "id";

    /// Hooks this type implements. A hook method missing from this set is never called.
    const HOOKS: HookSet = HookSet::EMPTY;

    fn id(&self) -> Option<&DocumentId>;

    fn set_id(&mut self, id: DocumentId);

    fn pre_create(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    fn post_create(&self) -> Result<(), HookError> {
        Ok(())
    }

    fn pre_update(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    /// `previous` is the value before the write: the replacement body for a
    /// full replace, the fetched snapshot for a partial update.
    fn post_update(&self, _previous: &Self) -> Result<(), HookError> {
        Ok(())
    }

    fn pre_delete(&self) -> Result<(), HookError> {
        Ok(())
    }

    fn post_delete(&self) -> Result<(), HookError> {
        Ok(())
    }
}

/// Storage location, route segment and hook capabilities of one resource.
pub struct ResourceDescriptor<R> {
    namespace: Namespace,
    segment: String,
    hooks: HookDispatcher,
    _record: PhantomData<fn() -> R>,
}

impl<R: Resource> ResourceDescriptor<R> {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        ResourceDescriptor {
            namespace: Namespace::new(database, collection),
            segment: inflect::resource_segment::<R>(),
            hooks: HookDispatcher::new(R::HOOKS),
            _record: PhantomData,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Default route segment: the type's short name, lower-cased and pluralized.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn hooks(&self) -> &HookDispatcher {
        &self.hooks
    }

    pub fn id_field(&self) -> &'static str {
        R::ID_FIELD
    }
}

impl<R> std::fmt::Debug for ResourceDescriptor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("namespace", &self.namespace)
            .field("segment", &self.segment)
            .field("hooks", &self.hooks.hooks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::Hook;
    use serde::Deserialize;

    #[derive(Clone, Serialize, Deserialize)]
    struct Category {
        id: Option<DocumentId>,
    }

    impl Resource for Category {
        const HOOKS: HookSet = HookSet::POST_DELETE;

        fn id(&self) -> Option<&DocumentId> {
            self.id.as_ref()
        }

        fn set_id(&mut self, id: DocumentId) {
            self.id = Some(id);
        }
    }

    #[test]
    fn descriptor_derives_segment_and_caches_hooks() {
        let desc = ResourceDescriptor::<Category>::new("shop", "category");
        assert_eq!(desc.segment(), "categories");
        assert_eq!(desc.namespace().database, "shop");
        assert_eq!(desc.namespace().collection, "category");
        assert!(desc.hooks().hooks().contains(Hook::PostDelete));
        assert!(!desc.hooks().hooks().contains(Hook::PreCreate));
        assert_eq!(desc.id_field(), "id");
    }
}
