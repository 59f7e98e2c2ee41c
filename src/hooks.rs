//! Lifecycle hooks: capability set declared by a record type and the dispatcher
//! that invokes the declared hooks around each mutation.

use crate::error::{AppError, HookError};
use crate::resource::Resource;
use std::fmt;

/// One lifecycle hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    PreCreate,
    PostCreate,
    PreUpdate,
    PostUpdate,
    PreDelete,
    PostDelete,
}

impl Hook {
    pub const fn name(self) -> &'static str {
        match self {
            Hook::PreCreate => "pre_create",
            Hook::PostCreate => "post_create",
            Hook::PreUpdate => "pre_update",
            Hook::PostUpdate => "post_update",
            Hook::PreDelete => "pre_delete",
            Hook::PostDelete => "post_delete",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Hook::PreCreate => 1,
            Hook::PostCreate => 1 << 1,
            Hook::PreUpdate => 1 << 2,
            Hook::PostUpdate => 1 << 3,
            Hook::PreDelete => 1 << 4,
            Hook::PostDelete => 1 << 5,
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of hooks a record type implements.
///
/// ```
/// use doc_blueprint::HookSet;
/// const HOOKS: HookSet = HookSet::PRE_CREATE.union(HookSet::POST_UPDATE);
/// assert!(HOOKS.contains(doc_blueprint::Hook::PreCreate));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HookSet(u8);

impl HookSet {
    pub const EMPTY: HookSet = HookSet(0);
    pub const PRE_CREATE: HookSet = HookSet(Hook::PreCreate.bit());
    pub const POST_CREATE: HookSet = HookSet(Hook::PostCreate.bit());
    pub const PRE_UPDATE: HookSet = HookSet(Hook::PreUpdate.bit());
    pub const POST_UPDATE: HookSet = HookSet(Hook::PostUpdate.bit());
    pub const PRE_DELETE: HookSet = HookSet(Hook::PreDelete.bit());
    pub const POST_DELETE: HookSet = HookSet(Hook::PostDelete.bit());
    pub const ALL: HookSet = HookSet(0b11_1111);

    pub const fn union(self, other: HookSet) -> HookSet {
        HookSet(self.0 | other.0)
    }

    pub const fn contains(self, hook: Hook) -> bool {
        self.0 & hook.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for HookSet {
    type Output = HookSet;

    fn bitor(self, rhs: HookSet) -> HookSet {
        self.union(rhs)
    }
}

/// Invokes the hooks of one resource. Built once at registration from `Resource::HOOKS`.
#[derive(Clone, Copy, Debug)]
pub struct HookDispatcher {
    hooks: HookSet,
}

impl HookDispatcher {
    pub fn new(hooks: HookSet) -> Self {
        HookDispatcher { hooks }
    }

    pub fn hooks(&self) -> HookSet {
        self.hooks
    }

    pub fn pre_create<R: Resource>(&self, record: &mut R) -> Result<(), AppError> {
        self.before(Hook::PreCreate, || record.pre_create())
    }

    pub fn post_create<R: Resource>(&self, record: &R) -> Result<(), AppError> {
        self.after(Hook::PostCreate, || record.post_create())
    }

    pub fn pre_update<R: Resource>(&self, record: &mut R) -> Result<(), AppError> {
        self.before(Hook::PreUpdate, || record.pre_update())
    }

    pub fn post_update<R: Resource>(&self, record: &R, previous: &R) -> Result<(), AppError> {
        self.after(Hook::PostUpdate, || record.post_update(previous))
    }

    pub fn pre_delete<R: Resource>(&self, record: &R) -> Result<(), AppError> {
        self.before(Hook::PreDelete, || record.pre_delete())
    }

    pub fn post_delete<R: Resource>(&self, record: &R) -> Result<(), AppError> {
        self.after(Hook::PostDelete, || record.post_delete())
    }

    fn before(&self, hook: Hook, call: impl FnOnce() -> Result<(), HookError>) -> Result<(), AppError> {
        if !self.hooks.contains(hook) {
            return Ok(());
        }
        tracing::debug!(hook = %hook, "running hook");
        call().map_err(|source| AppError::HookAborted { hook, source })
    }

    fn after(&self, hook: Hook, call: impl FnOnce() -> Result<(), HookError>) -> Result<(), AppError> {
        if !self.hooks.contains(hook) {
            return Ok(());
        }
        tracing::debug!(hook = %hook, "running hook");
        call().map_err(|source| {
            tracing::warn!(hook = %hook, error = %source, "hook failed after commit");
            AppError::PostHookFailed { hook, source }
        })
    }
}
