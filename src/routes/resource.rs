//! Resource route registration: a blueprint binds one record type to a route
//! group, attaching the handlers selected by a [`RouteMask`].

use crate::config::DEFAULT_BODY_LIMIT;
use crate::handlers::resource::{create, delete as delete_handler, empty_id, list, patch, read, replace};
use crate::resource::{Resource, ResourceDescriptor};
use axum::{extract::DefaultBodyLimit, routing::MethodRouter, Router};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Which CRUD operations a blueprint exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteMask(u8);

impl RouteMask {
    /// POST /
    pub const CREATE: RouteMask = RouteMask(1);
    /// GET /
    pub const LIST: RouteMask = RouteMask(1 << 1);
    /// GET /:id
    pub const GET: RouteMask = RouteMask(1 << 2);
    /// PUT /:id
    pub const REPLACE: RouteMask = RouteMask(1 << 3);
    /// PATCH /:id
    pub const PATCH: RouteMask = RouteMask(1 << 4);
    /// DELETE /:id
    pub const DELETE: RouteMask = RouteMask(1 << 5);
    pub const NONE: RouteMask = RouteMask(0);
    pub const READ_ONLY: RouteMask = RouteMask(Self::LIST.0 | Self::GET.0);
    pub const ALL: RouteMask = RouteMask(0b11_1111);

    pub const fn union(self, other: RouteMask) -> RouteMask {
        RouteMask(self.0 | other.0)
    }

    pub const fn contains(self, other: RouteMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for RouteMask {
    fn default() -> Self {
        RouteMask::ALL
    }
}

impl std::ops::BitOr for RouteMask {
    type Output = RouteMask;

    fn bitor(self, rhs: RouteMask) -> RouteMask {
        self.union(rhs)
    }
}

/// Register a record type stored in `database`/`collection`.
pub fn register<R: Resource>(database: impl Into<String>, collection: impl Into<String>) -> Blueprint<R> {
    Blueprint::new(ResourceDescriptor::new(database, collection))
}

/// A record type bound to its storage location and route group.
pub struct Blueprint<R> {
    descriptor: Arc<ResourceDescriptor<R>>,
    group: String,
    body_limit: usize,
}

fn normalize_group(group: &str) -> String {
    let trimmed = group.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

impl<R: Resource> Blueprint<R> {
    pub fn new(descriptor: ResourceDescriptor<R>) -> Self {
        let group = normalize_group(descriptor.segment());
        Blueprint {
            descriptor: Arc::new(descriptor),
            group,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Mount under an explicit group path instead of the pluralized type name,
    /// e.g. `/api/v1/posts`.
    pub fn group(mut self, path: &str) -> Self {
        self.group = normalize_group(path);
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn descriptor(&self) -> &Arc<ResourceDescriptor<R>> {
        &self.descriptor
    }

    /// Group path the routes are mounted under (`""` for the root).
    pub fn group_path(&self) -> &str {
        &self.group
    }

    /// The resource's own router: the collection path with and without a
    /// trailing slash, plus `/:id`. Operations missing from `mask` get no route.
    /// PUT, PATCH and DELETE on the slash form answer 404 (empty id).
    pub fn router<S>(&self, mask: RouteMask) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let mut collection: MethodRouter<Arc<ResourceDescriptor<R>>> = MethodRouter::new();
        if mask.contains(RouteMask::CREATE) {
            collection = collection.post(create::<R>);
        }
        if mask.contains(RouteMask::LIST) {
            collection = collection.get(list::<R>);
        }

        let mut item: MethodRouter<Arc<ResourceDescriptor<R>>> = MethodRouter::new();
        if mask.contains(RouteMask::GET) {
            item = item.get(read::<R>);
        }
        if mask.contains(RouteMask::REPLACE) {
            item = item.put(replace::<R>);
        }
        if mask.contains(RouteMask::PATCH) {
            item = item.patch(patch::<R>);
        }
        if mask.contains(RouteMask::DELETE) {
            item = item.delete(delete_handler::<R>);
        }

        // `{group}/` is the collection path with an empty id segment: the
        // item verbs answer 404 there instead of 405.
        let mut slash = collection.clone();
        if mask.contains(RouteMask::REPLACE) {
            slash = slash.put(empty_id);
        }
        if mask.contains(RouteMask::PATCH) {
            slash = slash.patch(empty_id);
        }
        if mask.contains(RouteMask::DELETE) {
            slash = slash.delete(empty_id);
        }
        let has_collection = mask.contains(RouteMask::CREATE) || mask.contains(RouteMask::LIST);
        let has_item_write =
            mask.contains(RouteMask::REPLACE) || mask.contains(RouteMask::PATCH) || mask.contains(RouteMask::DELETE);

        let mut router = Router::new();
        if !self.group.is_empty() && has_collection {
            router = router.route(&self.group, collection);
        }
        if has_collection || has_item_write {
            router = router.route(&format!("{}/", self.group), slash);
        }
        if mask.contains(RouteMask::GET)
            || mask.contains(RouteMask::REPLACE)
            || mask.contains(RouteMask::PATCH)
            || mask.contains(RouteMask::DELETE)
        {
            router = router.route(&format!("{}/:id", self.group), item);
        }
        tracing::debug!(group = %self.group, ns = %self.descriptor.namespace(), "resource routes bound");
        router
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.body_limit))
            .with_state(self.descriptor.clone())
    }

    /// Attach the operations in `mask` to `router`.
    pub fn bind<S>(&self, router: Router<S>, mask: RouteMask) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.merge(self.router(mask))
    }

    /// Attach all six operations.
    pub fn bind_all<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.bind(router, RouteMask::ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentId;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize)]
    struct Story {
        id: Option<DocumentId>,
    }

    impl Resource for Story {
        fn id(&self) -> Option<&DocumentId> {
            self.id.as_ref()
        }

        fn set_id(&mut self, id: DocumentId) {
            self.id = Some(id);
        }
    }

    #[test]
    fn mask_operations() {
        let mask = RouteMask::LIST | RouteMask::GET;
        assert_eq!(mask, RouteMask::READ_ONLY);
        assert!(mask.contains(RouteMask::GET));
        assert!(!mask.contains(RouteMask::DELETE));
        assert!(RouteMask::ALL.contains(RouteMask::READ_ONLY));
        assert_eq!(RouteMask::default(), RouteMask::ALL);
        assert!(!RouteMask::NONE.contains(RouteMask::CREATE));
    }

    #[test]
    fn default_group_is_pluralized_type_name() {
        let bp = register::<Story>("db", "story");
        assert_eq!(bp.group_path(), "/stories");
        assert_eq!(bp.descriptor().namespace().collection, "story");
    }

    #[test]
    fn explicit_group_is_normalized() {
        assert_eq!(register::<Story>("db", "s").group("api/v1/tales/").group_path(), "/api/v1/tales");
        assert_eq!(register::<Story>("db", "s").group("/").group_path(), "");
    }
}
