//! Modification Overlay: per-period overrides of intergreens and phase
//! delays, written only by the Interstage Resolver when a controller's
//! declared interstage exceeds the plan-allowed budget.
//!
//! Read-through semantics: a lookup with `modified=true` consults the
//! overlay first and falls back to the base [`crate::controller::Controller`]
//! value. Overlays never raise a base value above its original — enforced
//! at the write site, not just documented.

use indexmap::IndexMap;

use crate::controller::{Controller, PhaseRef};

/// One overridden intergreen, keyed by `(end_phase, start_phase, period_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedIntergreen {
    pub intergreen_time: i64,
    pub original_time: i64,
}

/// One overridden phase delay, keyed by `(end_stage, start_stage, phase_ref, period_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedPhaseDelay {
    pub delay_time: i64,
    pub original_delay_time: i64,
}

/// Thrown when a write would raise a base value. This would silently
/// corrupt a published schedule so it is a hard error, not a debug assert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayInvariantViolation {
    pub message: String,
}

impl std::fmt::Display for OverlayInvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "overlay invariant violated: {}", self.message)
    }
}

impl std::error::Error for OverlayInvariantViolation {}

/// A period-scoped overlay over one controller's intergreens and phase
/// delays. Created fresh per (controller, period) emulation per the
/// concurrency model: no mutable state is shared across emulations.
#[derive(Debug, Clone, Default)]
pub struct ModificationOverlay {
    intergreens: IndexMap<(PhaseRef, PhaseRef), ModifiedIntergreen>,
    phase_delays: IndexMap<(i64, i64, PhaseRef), ModifiedPhaseDelay>,
}

impl ModificationOverlay {
    pub fn new() -> Self {
        Self { intergreens: IndexMap::new(), phase_delays: IndexMap::new() }
    }

    pub fn intergreen(&self, controller: &Controller, end_phase: &PhaseRef, start_phase: &PhaseRef, modified: bool) -> i64 {
        if modified {
            if let Some(m) = self.intergreens.get(&(end_phase.clone(), start_phase.clone())) {
                return m.intergreen_time;
            }
        }
        controller.intergreen(end_phase, start_phase)
    }

    pub fn phase_delay(&self, controller: &Controller, end_stage_key: i64, start_stage_key: i64, phase_ref: &PhaseRef, modified: bool) -> i64 {
        if modified {
            if let Some(m) = self.phase_delays.get(&(end_stage_key, start_stage_key, phase_ref.clone())) {
                return m.delay_time;
            }
        }
        controller.phase_delay(end_stage_key, start_stage_key, phase_ref)
    }

    /// Writes an overlay intergreen, rejecting any attempt to raise the
    /// value above what is currently visible (overlay-if-present, else
    /// base).
    pub fn set_intergreen(
        &mut self,
        controller: &Controller,
        end_phase: &PhaseRef,
        start_phase: &PhaseRef,
        new_time: i64,
    ) -> Result<(), OverlayInvariantViolation> {
        let current = self.intergreen(controller, end_phase, start_phase, true);
        if new_time > current {
            return Err(OverlayInvariantViolation {
                message: format!(
                    "intergreen {}->{} overlay write {} exceeds current value {}",
                    end_phase, start_phase, new_time, current
                ),
            });
        }
        let original_time = controller.intergreen(end_phase, start_phase);
        self.intergreens.insert(
            (end_phase.clone(), start_phase.clone()),
            ModifiedIntergreen { intergreen_time: new_time, original_time },
        );
        Ok(())
    }

    /// Writes an overlay phase delay, with the same never-raise invariant.
    pub fn set_phase_delay(
        &mut self,
        controller: &Controller,
        end_stage_key: i64,
        start_stage_key: i64,
        phase_ref: &PhaseRef,
        new_time: i64,
    ) -> Result<(), OverlayInvariantViolation> {
        let current = self.phase_delay(controller, end_stage_key, start_stage_key, phase_ref, true);
        if new_time > current {
            return Err(OverlayInvariantViolation {
                message: format!(
                    "phase delay {}/{}/{} overlay write {} exceeds current value {}",
                    end_stage_key, start_stage_key, phase_ref, new_time, current
                ),
            });
        }
        let original_delay_time = controller.phase_delay(end_stage_key, start_stage_key, phase_ref);
        self.phase_delays.insert(
            (end_stage_key, start_stage_key, phase_ref.clone()),
            ModifiedPhaseDelay { delay_time: new_time, original_delay_time },
        );
        Ok(())
    }
}
