//! Lifecycle hooks.
//!
//! Every capability layer owns a [`HookSet`]: one optional slot per
//! [`HookKind`]. When the runtime fires a hook it walks the model's layers
//! from the outermost (last applied) to the base and calls every filled slot
//! in turn, so an outer layer always runs before the layers it wraps. The
//! first error aborts the walk and the operation that fired it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::instance::Instance;
use super::runtime::Model;
use crate::datasource::{Query, QueryOutput};
use crate::error::Result;

/// Named points in the persistence lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    /// Before a new instance is validated and inserted.
    BeforeCreate,
    /// After a new instance was inserted.
    AfterCreate,
    /// Before a persisted instance is validated and updated.
    BeforeUpdate,
    /// After a persisted instance was updated.
    AfterUpdate,
    /// Before schema validation.
    BeforeValidate,
    /// After schema validation applied its values.
    AfterValidate,
    /// Before a statement runs; the statement may be replaced.
    BeforeQuery,
    /// After a statement ran; the outcome is available.
    AfterQuery,
    /// Before an instance is deleted.
    BeforeRemove,
    /// After an instance was deleted, inside the transaction.
    AfterRemove,
}

impl HookKind {
    /// Every hook kind.
    pub const ALL: [HookKind; 10] = [
        HookKind::BeforeCreate,
        HookKind::AfterCreate,
        HookKind::BeforeUpdate,
        HookKind::AfterUpdate,
        HookKind::BeforeValidate,
        HookKind::AfterValidate,
        HookKind::BeforeQuery,
        HookKind::AfterQuery,
        HookKind::BeforeRemove,
        HookKind::AfterRemove,
    ];

    /// The hook's conventional name.
    pub fn name(&self) -> &'static str {
        match self {
            HookKind::BeforeCreate => "beforeCreate",
            HookKind::AfterCreate => "afterCreate",
            HookKind::BeforeUpdate => "beforeUpdate",
            HookKind::AfterUpdate => "afterUpdate",
            HookKind::BeforeValidate => "beforeValidate",
            HookKind::AfterValidate => "afterValidate",
            HookKind::BeforeQuery => "beforeQuery",
            HookKind::AfterQuery => "afterQuery",
            HookKind::BeforeRemove => "beforeRemove",
            HookKind::AfterRemove => "afterRemove",
        }
    }
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a hook can see and change.
pub struct HookContext<'a> {
    /// The model firing the hook.
    pub model: &'a Model,
    /// The instance being persisted. `None` for static finders.
    pub instance: Option<&'a mut Instance>,
    /// Whether the instance had not been persisted when the operation began.
    pub is_new_instance: bool,
    /// The pending statement. Set from `beforeQuery` onwards.
    pub query: Option<Query>,
    /// The statement's outcome. Set from `afterQuery` onwards.
    pub outcome: Option<QueryOutput>,
}

impl<'a> HookContext<'a> {
    /// Context for a static operation.
    pub fn new(model: &'a Model) -> Self {
        Self {
            model,
            instance: None,
            is_new_instance: false,
            query: None,
            outcome: None,
        }
    }

    /// Context for an instance operation.
    pub fn for_instance(model: &'a Model, instance: &'a mut Instance) -> Self {
        let is_new_instance = instance.is_new();
        Self {
            model,
            instance: Some(instance),
            is_new_instance,
            query: None,
            outcome: None,
        }
    }

    /// Attach the pending statement.
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    /// The instance, if any.
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_deref()
    }

    /// The instance, mutably.
    pub fn instance_mut(&mut self) -> Option<&mut Instance> {
        self.instance.as_deref_mut()
    }
}

/// A lifecycle hook.
///
/// Implement this for hooks that need to await; plain closures can be
/// registered with [`HookSet::on`].
#[async_trait]
pub trait Hook: Send + Sync {
    /// Run the hook.
    async fn call(&self, ctx: &mut HookContext<'_>) -> Result<()>;
}

struct FnHook<F>(F);

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&mut HookContext<'_>) -> Result<()> + Send + Sync,
{
    async fn call(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        (self.0)(ctx)
    }
}

/// One layer's hooks: at most one per [`HookKind`].
#[derive(Clone, Default)]
pub struct HookSet {
    slots: HashMap<HookKind, Arc<dyn Hook>>,
}

impl HookSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill a slot with a synchronous closure, replacing any previous hook.
    pub fn on<F>(self, kind: HookKind, hook: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on_hook(kind, FnHook(hook))
    }

    /// Fill a slot with a [`Hook`], replacing any previous hook.
    pub fn on_hook(mut self, kind: HookKind, hook: impl Hook + 'static) -> Self {
        self.slots.insert(kind, Arc::new(hook));
        self
    }

    /// Get the hook in a slot.
    pub fn slot(&self, kind: HookKind) -> Option<&Arc<dyn Hook>> {
        self.slots.get(&kind)
    }

    /// Check if no slot is filled.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Filled slots, in lifecycle order.
    pub fn kinds(&self) -> Vec<HookKind> {
        HookKind::ALL
            .into_iter()
            .filter(|kind| self.slots.contains_key(kind))
            .collect()
    }
}

impl std::fmt::Debug for HookSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.kinds()).finish()
    }
}

/// A capability layer: a name plus the hooks it owns.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Capability name, e.g. `withSchema`.
    pub name: String,
    /// Hooks owned by the layer.
    pub hooks: HookSet,
}

impl Layer {
    /// Create a layer.
    pub fn new(name: impl Into<String>, hooks: HookSet) -> Self {
        Self {
            name: name.into(),
            hooks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_hook_names() {
        assert_eq!(HookKind::BeforeCreate.to_string(), "beforeCreate");
        assert_eq!(HookKind::AfterRemove.name(), "afterRemove");
        assert_eq!(HookKind::ALL.len(), 10);
    }

    #[test]
    fn test_hook_set_slots() {
        let hooks = HookSet::new()
            .on(HookKind::AfterQuery, |_| Ok(()))
            .on(HookKind::BeforeCreate, |_| Err(Error::hook("nope")));

        assert!(hooks.slot(HookKind::BeforeCreate).is_some());
        assert!(hooks.slot(HookKind::BeforeUpdate).is_none());
        assert_eq!(hooks.kinds(), vec![HookKind::BeforeCreate, HookKind::AfterQuery]);
        assert_eq!(format!("{:?}", hooks), "{BeforeCreate, AfterQuery}");
        assert!(HookSet::new().is_empty());
    }
}
