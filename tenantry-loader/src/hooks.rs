//! Module lifecycle hook contract.
//!
//! Modules implement [`ModuleHooks`]; every method defaults to success so
//! a module only overrides what it needs. A hook that returns `Ok(false)`,
//! returns `Err`, or panics has failed, and [`invoke`] folds all three into
//! a [`HookFailure`].

use crate::environment::Environment;
use crate::error::HookFailure;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Error type hook implementations may return.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Everything a hook sees about the binding it runs for.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub tenant: String,
    pub module: String,
    pub version: String,
    pub environment: Arc<Environment>,
    pub properties: BTreeMap<String, String>,
}

/// Lifecycle hooks a module may implement
#[async_trait]
pub trait ModuleHooks: Send + Sync {
    /// Activate the module for a tenant
    async fn start(&self, _ctx: &HookContext) -> Result<bool, HookError> {
        Ok(true)
    }

    /// Deactivate the module for a tenant
    async fn shutdown(&self, _ctx: &HookContext) -> Result<bool, HookError> {
        Ok(true)
    }

    /// Called once when the module is attached to a tenant
    async fn on_bind(&self, _ctx: &HookContext) -> Result<bool, HookError> {
        Ok(true)
    }

    /// Called once when the module is detached from a tenant
    async fn on_unbind(&self, _ctx: &HookContext) -> Result<bool, HookError> {
        Ok(true)
    }
}

/// Hooks for modules that declare none.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl ModuleHooks for NoopHooks {}

/// Which hook to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Start,
    Shutdown,
    Bind,
    Unbind,
}

impl HookKind {
    pub fn name(self) -> &'static str {
        match self {
            HookKind::Start => "start",
            HookKind::Shutdown => "shutdown",
            HookKind::Bind => "bind",
            HookKind::Unbind => "unbind",
        }
    }
}

/// Run one hook, treating `false`, errors and panics alike.
pub async fn invoke(
    hooks: &dyn ModuleHooks,
    kind: HookKind,
    ctx: &HookContext,
) -> Result<(), HookFailure> {
    let hook = kind.name();
    let call = async {
        match kind {
            HookKind::Start => hooks.start(ctx).await,
            HookKind::Shutdown => hooks.shutdown(ctx).await,
            HookKind::Bind => hooks.on_bind(ctx).await,
            HookKind::Unbind => hooks.on_unbind(ctx).await,
        }
    };

    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(true)) => Ok(()),
        Ok(Ok(false)) => Err(HookFailure::Declined { hook }),
        Ok(Err(e)) => Err(HookFailure::Failed {
            hook,
            reason: e.to_string(),
        }),
        Err(payload) => Err(HookFailure::Panicked {
            hook,
            reason: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
