//! Capability Resolution
//!
//! Maps a task's target role to a capability provider through a three-tier
//! chain:
//!
//! 1. Provider factory keyed by role
//! 2. Directly registered provider for the role
//! 3. The coder capability as a universal fallback (for non-coder roles)
//!
//! Failure of all three is a hard, non-retryable error for the task.
//! Successful resolutions are cached per role for the resolver's lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::models::task::TargetRole;
use crate::services::dispatch::CapabilityProvider;
use crate::utils::error::{SchedulerError, SchedulerResult};

/// Pluggable construction of capability providers.
pub trait ProviderFactory: Send + Sync {
    /// Return a provider for the role, or None if this factory cannot
    /// build one.
    fn create(&self, role: TargetRole) -> Option<Arc<dyn CapabilityProvider>>;
}

/// Resolver with factory, direct registration, and coder-fallback tiers.
pub struct CapabilityResolver {
    factory: Option<Arc<dyn ProviderFactory>>,
    registered: HashMap<TargetRole, Arc<dyn CapabilityProvider>>,
    cache: Mutex<HashMap<TargetRole, Arc<dyn CapabilityProvider>>>,
}

impl CapabilityResolver {
    pub fn new() -> Self {
        Self {
            factory: None,
            registered: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Install the tier-1 factory.
    pub fn with_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Register a tier-2 provider for a known role.
    pub fn register(mut self, role: TargetRole, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.registered.insert(role, provider);
        self
    }

    /// Resolve a provider for the role, caching the result.
    pub async fn resolve(&self, role: TargetRole) -> SchedulerResult<Arc<dyn CapabilityProvider>> {
        if let Some(provider) = self.cache.lock().await.get(&role) {
            return Ok(provider.clone());
        }

        let provider = self
            .resolve_uncached(role)
            .ok_or_else(|| {
                SchedulerError::resolution(format!("no capability available for role '{}'", role))
            })?;

        self.cache.lock().await.insert(role, provider.clone());
        Ok(provider)
    }

    /// Return a cached provider without attempting resolution. Used by the
    /// abort hook, which must never trigger new construction.
    pub async fn cached(&self, role: TargetRole) -> Option<Arc<dyn CapabilityProvider>> {
        self.cache.lock().await.get(&role).cloned()
    }

    fn resolve_uncached(&self, role: TargetRole) -> Option<Arc<dyn CapabilityProvider>> {
        if let Some(factory) = &self.factory {
            if let Some(provider) = factory.create(role) {
                debug!(role = %role, "capability resolved via factory");
                return Some(provider);
            }
        }

        if let Some(provider) = self.registered.get(&role) {
            debug!(role = %role, "capability resolved via direct registration");
            return Some(provider.clone());
        }

        // Universal fallback: any non-coder role can be remediated by the
        // coder capability.
        if role != TargetRole::Coder {
            if let Some(factory) = &self.factory {
                if let Some(provider) = factory.create(TargetRole::Coder) {
                    debug!(role = %role, "capability resolved via coder fallback (factory)");
                    return Some(provider);
                }
            }
            if let Some(provider) = self.registered.get(&TargetRole::Coder) {
                debug!(role = %role, "capability resolved via coder fallback");
                return Some(provider.clone());
            }
        }

        None
    }
}

impl Default for CapabilityResolver {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
