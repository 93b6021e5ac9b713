//! Interstage Resolver: computes the minimum required interstage between
//! two stages, and reduces a controller-declared interstage down to an
//! observed value by writing the Modification Overlay.

use crate::controller::{Controller, Phase, Stage};
use crate::errors::EmulationError;
use crate::overlay::ModificationOverlay;

/// `max over e in end_phases of max(delay(e) + intergreen(e->s), delay(s))`
/// for one gaining phase `s`. Shared by [`required_interstage`] and the
/// Projector's per-phase start-time computation.
pub fn max_start_delta(
    controller: &Controller,
    overlay: &ModificationOverlay,
    end_phases: &[&Phase],
    start_phase: &Phase,
    end_stage_key: i64,
    start_stage_key: i64,
    modified: bool,
) -> i64 {
    let mut delta = 0;
    for end_phase in end_phases {
        let end_delay = overlay.phase_delay(controller, end_stage_key, start_stage_key, end_phase.phase_ref(), modified);
        let intergreen = overlay.intergreen(controller, end_phase.phase_ref(), start_phase.phase_ref(), modified);
        let start_delay = overlay.phase_delay(controller, end_stage_key, start_stage_key, start_phase.phase_ref(), modified);
        delta = delta.max((end_delay + intergreen).max(start_delay));
    }
    delta
}

/// `max over s in start_phases of max_start_delta(...)`
pub fn required_interstage(
    controller: &Controller,
    overlay: &ModificationOverlay,
    end_stage: &Stage,
    start_stage: &Stage,
    modified: bool,
) -> i64 {
    let end_phases = controller.end_phases(end_stage, start_stage);
    let start_phases = controller.start_phases(end_stage, start_stage);
    start_phases
        .iter()
        .map(|s| {
            max_start_delta(
                controller,
                overlay,
                &end_phases,
                s,
                end_stage.stage_number(),
                start_stage.stage_number(),
                modified,
            )
        })
        .max()
        .unwrap_or(0)
}

/// Clips each contributing component into the overlay, in source order
/// (end delay, then intergreen, then start delay), so that
/// `required_interstage` after the writes equals `observed`. Never
/// mutates the base model. Fails with
/// [`EmulationError::InterstageReductionImpossible`] if the target cannot
/// be reached (e.g. components are already at or below it).
pub fn reduce_to_observed(
    controller: &Controller,
    overlay: &mut ModificationOverlay,
    end_stage: &Stage,
    start_stage: &Stage,
    observed: i64,
) -> Result<(), EmulationError> {
    let end_phases = controller.end_phases(end_stage, start_stage);
    let start_phases = controller.start_phases(end_stage, start_stage);
    let end_stage_key = end_stage.stage_number();
    let start_stage_key = start_stage.stage_number();

    for start_phase in &start_phases {
        for end_phase in &end_phases {
            let mut end_delay = overlay.phase_delay(controller, end_stage_key, start_stage_key, end_phase.phase_ref(), true);
            let intergreen = overlay.intergreen(controller, end_phase.phase_ref(), start_phase.phase_ref(), true);
            let start_delay = overlay.phase_delay(controller, end_stage_key, start_stage_key, start_phase.phase_ref(), true);

            let overlay_err = |e: crate::overlay::OverlayInvariantViolation| EmulationError::OverlayWriteRejected {
                controller_key: controller.controller_key().to_string(),
                message: e.message,
            };

            if end_delay > observed {
                overlay
                    .set_phase_delay(controller, end_stage_key, start_stage_key, end_phase.phase_ref(), observed)
                    .map_err(overlay_err)?;
                end_delay = observed;
            }
            if end_delay + intergreen > observed {
                overlay
                    .set_intergreen(controller, end_phase.phase_ref(), start_phase.phase_ref(), observed - end_delay)
                    .map_err(overlay_err)?;
            }
            if start_delay > observed {
                overlay
                    .set_phase_delay(controller, end_stage_key, start_stage_key, start_phase.phase_ref(), observed)
                    .map_err(overlay_err)?;
            }
        }
    }

    let reduced = required_interstage(controller, overlay, end_stage, start_stage, true);
    if reduced != observed {
        return Err(EmulationError::InterstageReductionImpossible {
            controller_key: controller.controller_key().to_string(),
            end_stage: end_stage_key,
            start_stage: start_stage_key,
            required: reduced,
            observed,
        });
    }
    if crate::verbose::is_verbose_level(crate::verbose::VerboseLevel::Main) {
        crate::log_main!(
            crate::verbose::EVENT_INTERSTAGE_REDUCE,
            "reduced interstage to observed",
            end_stage = end_stage_key,
            start_stage = start_stage_key,
            observed = observed
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Controller, Phase, PhaseKind, PhaseRef, Stage, TerminationType};

    fn controller_with_components(delay_e: i64, ig: i64, delay_s: i64) -> Controller {
        let mut warnings = Vec::new();
        Controller::new("J00/004")
            .with_phase(Phase::new(PhaseRef::new("E"), PhaseKind::Traffic, TerminationType::EndOfStage, 7))
            .with_phase(Phase::new(PhaseRef::new("S"), PhaseKind::Traffic, TerminationType::EndOfStage, 7))
            .with_stage(Stage::new(1, 0, 0, vec![PhaseRef::new("E")]))
            .with_stage(Stage::new(2, 0, 1, vec![PhaseRef::new("S")]))
            .with_intergreen(PhaseRef::new("E"), PhaseRef::new("S"), ig)
            .with_phase_delay(1, 2, PhaseRef::new("E"), delay_e)
            .with_phase_delay(1, 2, PhaseRef::new("S"), delay_s)
            .build(&mut warnings)
    }

    #[test]
    fn required_interstage_matches_max_formula() {
        let controller = controller_with_components(3, 4, 2);
        let overlay = ModificationOverlay::new();
        let end_stage = controller.stage(1).unwrap();
        let start_stage = controller.stage(2).unwrap();
        // max(delay_e + ig, delay_s) = max(3+4, 2) = 7
        assert_eq!(required_interstage(&controller, &overlay, end_stage, start_stage, false), 7);
    }

    #[test]
    fn reduce_to_observed_matches_seed_scenario_s6() {
        // delay_e=3, ig=4, delay_s=2, observed=5
        let controller = controller_with_components(3, 4, 2);
        let mut overlay = ModificationOverlay::new();
        let end_stage = controller.stage(1).unwrap();
        let start_stage = controller.stage(2).unwrap();

        reduce_to_observed(&controller, &mut overlay, end_stage, start_stage, 5).unwrap();

        let reduced = required_interstage(&controller, &overlay, end_stage, start_stage, true);
        assert_eq!(reduced, 5);
        // delay_e (3) <= 5 so untouched; ig reduced so delay_e+ig <= 5 => ig <= 2
        assert_eq!(overlay.intergreen(&controller, &PhaseRef::new("E"), &PhaseRef::new("S"), true), 2);
        assert_eq!(overlay.phase_delay(&controller, 1, 2, &PhaseRef::new("E"), true), 3);
        assert_eq!(overlay.phase_delay(&controller, 1, 2, &PhaseRef::new("S"), true), 2);
    }

    #[test]
    fn reduce_to_observed_is_impossible_when_components_already_fit() {
        // everything already below target; reduction is a no-op and the
        // post-check will find required (7) != observed (100), which
        // cannot happen upward, so this models the "cannot reduce" path
        // via a target that is impossible to raise to.
        let controller = controller_with_components(1, 1, 1);
        let mut overlay = ModificationOverlay::new();
        let end_stage = controller.stage(1).unwrap();
        let start_stage = controller.stage(2).unwrap();
        let err = reduce_to_observed(&controller, &mut overlay, end_stage, start_stage, 100).unwrap_err();
        assert!(matches!(err, EmulationError::InterstageReductionImpossible { .. }));
    }
}
