//! Lifecycle observation points.

use tenantry_core::TenantState;

/// Bootstrap phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Validation,
    Assembly,
    Activation,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Validation => "validation",
            Phase::Assembly => "assembly",
            Phase::Activation => "activation",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives lifecycle notifications, e.g. for metrics.
///
/// Called inline on the orchestrator's task; keep implementations cheap.
pub trait LifecycleObserver: Send + Sync {
    fn on_phase_started(&self, _tenant: &str, _phase: Phase) {}

    /// `survivors` bindings left the phase healthy, `failed` were excluded.
    fn on_phase_finished(&self, _tenant: &str, _phase: Phase, _survivors: usize, _failed: usize) {}

    fn on_state_changed(&self, _tenant: &str, _from: TenantState, _to: TenantState) {}
}
