//! Phase Projector: walks a stream's stage sequence and emits, per
//! phase, the [`PhaseTiming`](crate::signal_plan::PhaseTiming)s produced
//! by each transition. Honors indicative-arrow and filter coupling and
//! reconciles controller-declared interstage against the
//! already-reduced `interstage_length` stored on each
//! [`SignalPlanStage`](crate::signal_plan::SignalPlanStage).

use crate::controller::{Controller, Phase, PhaseRef, Stage, TerminationType};
use crate::errors::EmulationError;
use crate::overlay::ModificationOverlay;
use crate::resolver::{max_start_delta, reduce_to_observed, required_interstage};
use crate::sequencer::wrap;
use crate::signal_plan::{PhaseTiming, PhaseTimingsByPhase, SignalPlanStream};

fn close_phase(timings: &mut PhaseTimingsByPhase, phase_ref: &PhaseRef, end_time: i64) {
    let entry = timings.entry(phase_ref);
    if let Some(open) = entry.last_open_mut() {
        open.end_time = Some(end_time);
    } else {
        entry.push(PhaseTiming::with_end(end_time));
    }
}

fn open_phase(timings: &mut PhaseTimingsByPhase, phase_ref: &PhaseRef, start_time: i64) {
    let entry = timings.entry(phase_ref);
    if let Some(awaiting) = entry.last_awaiting_start_mut() {
        awaiting.start_time = Some(start_time);
    } else {
        entry.push(PhaseTiming::with_start(start_time));
    }
}

/// End time for one `end_phase` on the transition `current -> next`,
/// honoring the filter/indicative-arrow decision table (§4.1, §4.8).
fn end_phase_time(
    controller: &Controller,
    overlay: &ModificationOverlay,
    end_phases: &[&Phase],
    end_phase: &Phase,
    current: &Stage,
    next: &Stage,
    next_pulse_point: i64,
    cycle_time: i64,
) -> i64 {
    match end_phase.termination() {
        TerminationType::AssociatedGainsRow => {
            if let Some(associated_ref) = end_phase.associated_phase_ref() {
                if let Some(associated) = controller.phase(associated_ref) {
                    let delta = max_start_delta(
                        controller,
                        overlay,
                        end_phases,
                        associated,
                        current.stage_number(),
                        next.stage_number(),
                        true,
                    );
                    return wrap(next_pulse_point + delta, cycle_time);
                }
            }
            let delay = overlay.phase_delay(controller, current.stage_number(), next.stage_number(), end_phase.phase_ref(), true);
            wrap(next_pulse_point + delay, cycle_time)
        }
        _ => {
            let delay = overlay.phase_delay(controller, current.stage_number(), next.stage_number(), end_phase.phase_ref(), true);
            wrap(next_pulse_point + delay, cycle_time)
        }
    }
}

/// Walks `stream`'s stage sequence and produces one [`PhaseTimingsByPhase`]
/// covering every phase that starts or ends somewhere in the cycle.
/// Mutates `overlay` when a transition's controller-declared interstage
/// exceeds the already-computed `interstage_length` and a reduction is
/// required.
pub fn project_phase_timings(
    controller: &Controller,
    overlay: &mut ModificationOverlay,
    stream: &SignalPlanStream,
) -> Result<PhaseTimingsByPhase, EmulationError> {
    let mut timings = PhaseTimingsByPhase::new();
    let cycle_time = stream.cycle_time();
    let stages = stream.stages();

    if stages.len() == 1 {
        let Some(stage) = controller.stage(stages[0].stage_number()) else {
            return Ok(timings);
        };
        for phase_ref in stage.phase_refs() {
            timings.entry(phase_ref).push(PhaseTiming { start_time: Some(0), end_time: Some(cycle_time) });
        }
        return Ok(timings);
    }

    let n = stages.len();
    for i in 0..n {
        let sps_current = stages[i];
        let sps_next = stages[(i + 1) % n];
        let Some(current) = controller.stage(sps_current.stage_number()) else { continue };
        let Some(next) = controller.stage(sps_next.stage_number()) else { continue };

        let required = required_interstage(controller, overlay, current, next, true);
        if required > sps_current.interstage_length() {
            reduce_to_observed(controller, overlay, current, next, sps_current.interstage_length())?;
        }

        let end_phases = controller.end_phases(current, next);
        let start_phases = controller.start_phases(current, next);

        for end_phase in &end_phases {
            let end_time = end_phase_time(controller, overlay, &end_phases, end_phase, current, next, sps_next.pulse_point(), cycle_time);
            close_phase(&mut timings, end_phase.phase_ref(), end_time);
            if let Some(arrow_ref) = end_phase.indicative_arrow_phase_ref() {
                close_phase(&mut timings, arrow_ref, end_time);
            }
        }

        for start_phase in &start_phases {
            let delta = max_start_delta(
                controller,
                overlay,
                &end_phases,
                start_phase,
                current.stage_number(),
                next.stage_number(),
                true,
            );
            let start_time = wrap(sps_next.pulse_point() + delta, cycle_time);
            open_phase(&mut timings, start_phase.phase_ref(), start_time);
        }
    }

    Ok(timings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{PhaseKind, Stream};
    use crate::sequencer::StageSequenceItem;
    use crate::signal_plan::compute_signal_plan_stream;

    fn phase(phase_ref: &str) -> Phase {
        Phase::new(PhaseRef::new(phase_ref), PhaseKind::Traffic, TerminationType::EndOfStage, 7)
    }

    #[test]
    fn three_stage_cycle_closes_every_open_timing() {
        let mut warnings = Vec::new();
        let controller = Controller::new("J00/004")
            .with_stream(Stream::new(0))
            .with_phase(phase("A"))
            .with_phase(phase("B"))
            .with_phase(phase("C"))
            .with_stage(Stage::new(1, 0, 0, vec![PhaseRef::new("A")]))
            .with_stage(Stage::new(2, 0, 1, vec![PhaseRef::new("B")]))
            .with_stage(Stage::new(3, 0, 2, vec![PhaseRef::new("C")]))
            .with_intergreen(PhaseRef::new("A"), PhaseRef::new("B"), 5)
            .with_intergreen(PhaseRef::new("B"), PhaseRef::new("C"), 5)
            .with_intergreen(PhaseRef::new("C"), PhaseRef::new("A"), 5)
            .build(&mut warnings);

        let sequence = vec![
            StageSequenceItem::new(1, 0, 1.0),
            StageSequenceItem::new(2, 30, 1.0),
            StageSequenceItem::new(3, 55, 1.0),
        ];
        let overlay_ro = ModificationOverlay::new();
        let stream = compute_signal_plan_stream(&controller, &overlay_ro, None, "J00/004", "AM", 0, 80, &sequence).unwrap();

        let mut overlay = ModificationOverlay::new();
        let timings = project_phase_timings(&controller, &mut overlay, &stream).unwrap();

        for phase_ref in [PhaseRef::new("A"), PhaseRef::new("B"), PhaseRef::new("C")] {
            let pts = timings.get(&phase_ref).expect("phase has timings");
            for t in pts.timings() {
                assert!(t.is_closed(), "phase {:?} left an open timing", phase_ref);
                assert!(t.start_time().unwrap() >= 0 && t.start_time().unwrap() < 80);
                assert!(t.end_time().unwrap() >= 0 && t.end_time().unwrap() < 80);
            }
        }
    }

    #[test]
    fn single_stage_stream_emits_full_cycle_timing() {
        let mut warnings = Vec::new();
        let controller = Controller::new("J00/004")
            .with_stream(Stream::new(0))
            .with_phase(phase("A"))
            .with_stage(Stage::new(1, 0, 0, vec![PhaseRef::new("A")]))
            .build(&mut warnings);

        let sequence = vec![StageSequenceItem::new(1, 0, 1.0)];
        let overlay_ro = ModificationOverlay::new();
        let stream = compute_signal_plan_stream(&controller, &overlay_ro, None, "J00/004", "AM", 0, 80, &sequence).unwrap();

        let mut overlay = ModificationOverlay::new();
        let timings = project_phase_timings(&controller, &mut overlay, &stream).unwrap();
        let pts = timings.get(&PhaseRef::new("A")).unwrap();
        assert_eq!(pts.timings().len(), 1);
        assert_eq!(pts.timings()[0].start_time(), Some(0));
        assert_eq!(pts.timings()[0].end_time(), Some(80));
    }

    #[test]
    fn indicative_arrow_closes_alongside_parent() {
        let mut warnings = Vec::new();
        let controller = Controller::new("J00/004")
            .with_stream(Stream::new(0))
            .with_phase(phase("T"))
            .with_phase(
                Phase::new(PhaseRef::new("F"), PhaseKind::Filter, TerminationType::AssociatedLosesRow, 7)
                    .with_associated_phase(PhaseRef::new("T")),
            )
            .with_phase(phase("X"))
            .with_stage(Stage::new(1, 0, 0, vec![PhaseRef::new("T"), PhaseRef::new("F")]))
            .with_stage(Stage::new(2, 0, 1, vec![PhaseRef::new("X")]))
            .with_intergreen(PhaseRef::new("T"), PhaseRef::new("X"), 5)
            .with_intergreen(PhaseRef::new("F"), PhaseRef::new("X"), 5)
            .with_intergreen(PhaseRef::new("X"), PhaseRef::new("T"), 5)
            .with_intergreen(PhaseRef::new("X"), PhaseRef::new("F"), 5)
            .build(&mut warnings);

        let sequence = vec![StageSequenceItem::new(1, 0, 1.0), StageSequenceItem::new(2, 30, 1.0)];
        let overlay_ro = ModificationOverlay::new();
        let stream = compute_signal_plan_stream(&controller, &overlay_ro, None, "J00/004", "AM", 0, 80, &sequence).unwrap();

        let mut overlay = ModificationOverlay::new();
        let timings = project_phase_timings(&controller, &mut overlay, &stream).unwrap();

        let t_end = timings.get(&PhaseRef::new("T")).unwrap().timings()[0].end_time();
        let f_end = timings.get(&PhaseRef::new("F")).unwrap().timings()[0].end_time();
        assert_eq!(t_end, f_end);
    }
}
