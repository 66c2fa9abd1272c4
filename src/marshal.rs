//! Marshal hooks and the contexts they run in.
//!
//! Keys are held as structured [`KeyValue`](crate::message::KeyValue)s by
//! the sender and must be turned into bytes before the first `write_to`
//! call. The receiver reverses this after the last `read_from` call, and
//! every composite key type has to be known to its [`TypeResolver`].
//!
//! # Example
//!
//! ```ignore
//! let mut ctx = CacheSharedContext::new();
//! ctx.register_cache(7, "accounts");
//!
//! request.prepare_marshal(&ctx)?;
//! // ... write_to until Ok(true), read_from on the peer until Ok(true) ...
//! decoded.finish_unmarshal(&ctx, &types)?;
//! ```

use std::collections::HashMap;

use crate::error::{LockWireError, Result};

/// Resolves key type names found in unmarshalled keys.
pub trait TypeResolver {
    /// Local id of the type, or `None` if it is not known here.
    fn resolve(&self, type_name: &str) -> Option<u32>;
}

/// Simple name → id registry.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, u32>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type name, returning its id. Re-registering returns the
    /// existing id.
    pub fn register(&mut self, type_name: impl Into<String>) -> u32 {
        let next = self.types.len() as u32 + 1;
        *self.types.entry(type_name.into()).or_insert(next)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeResolver for TypeRegistry {
    fn resolve(&self, type_name: &str) -> Option<u32> {
        self.types.get(type_name).copied()
    }
}

/// Per-cache context keys are marshalled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheContext {
    cache_id: i32,
    name: String,
}

impl CacheContext {
    pub fn new(cache_id: i32, name: impl Into<String>) -> Self {
        Self {
            cache_id,
            name: name.into(),
        }
    }

    pub fn cache_id(&self) -> i32 {
        self.cache_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Node-wide context: all started caches plus the deployment descriptor
/// attached to outgoing messages.
#[derive(Debug, Clone, Default)]
pub struct CacheSharedContext {
    caches: HashMap<i32, CacheContext>,
    deployment: Option<Vec<u8>>,
}

impl CacheSharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the opaque deployment descriptor attached by `prepare_marshal`.
    pub fn with_deployment(mut self, deployment: Vec<u8>) -> Self {
        self.deployment = Some(deployment);
        self
    }

    pub fn register_cache(&mut self, cache_id: i32, name: impl Into<String>) {
        self.caches
            .insert(cache_id, CacheContext::new(cache_id, name));
    }

    /// Context of a started cache.
    pub fn cache_context(&self, cache_id: i32) -> Result<&CacheContext> {
        self.caches
            .get(&cache_id)
            .ok_or(LockWireError::UnknownCache(cache_id))
    }

    pub fn deployment(&self) -> Option<&[u8]> {
        self.deployment.as_deref()
    }
}

/// Marshal hooks of a top-level cache message.
///
/// Both hooks run the base message's part first and are no-ops when there
/// is nothing left to transform, so calling them twice is harmless.
pub trait CacheMessage {
    /// Id of the cache the message belongs to.
    fn cache_id(&self) -> i32;

    /// Convert domain objects into their wire form. Call once before the
    /// first `write_to`.
    fn prepare_marshal(&mut self, ctx: &CacheSharedContext) -> Result<()>;

    /// Convert wire form back into domain objects. Call once after
    /// `read_from` returned `Ok(true)`.
    fn finish_unmarshal(&mut self, ctx: &CacheSharedContext, resolver: &dyn TypeResolver) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_registry() {
        let mut types = TypeRegistry::new();
        assert!(types.is_empty());
        let a = types.register("OrderKey");
        let b = types.register("UserKey");
        assert_ne!(a, b);
        assert_eq!(types.register("OrderKey"), a);
        assert_eq!(types.len(), 2);
        assert_eq!(types.resolve("UserKey"), Some(b));
        assert_eq!(types.resolve("Missing"), None);
    }

    #[test]
    fn test_cache_lookup() {
        let mut ctx = CacheSharedContext::new();
        ctx.register_cache(7, "accounts");
        assert_eq!(ctx.cache_context(7).unwrap().name(), "accounts");
        assert!(matches!(
            ctx.cache_context(8),
            Err(LockWireError::UnknownCache(8))
        ));
    }

    #[test]
    fn test_deployment() {
        let ctx = CacheSharedContext::new().with_deployment(vec![1, 2]);
        assert_eq!(ctx.deployment(), Some(&[1u8, 2][..]));
        assert_eq!(CacheSharedContext::new().deployment(), None);
    }
}
