//! Stage Sequencer: derives, per stream, a cyclic ordered list of
//! `(Stage, pulse_time, effective_call_rate)` from a plan and (optionally)
//! observations. Three flavors, switched on stream flags rather than a
//! class hierarchy: junction (default), pedestrian, and PV/PX.

use crate::config::EmulatorConfig;
use crate::controller::{Controller, PhaseRef, Stage};
use crate::errors::Warning;
use crate::observation::M37Averages;
use crate::overlay::ModificationOverlay;
use crate::plan::Plan;
use crate::resolver::required_interstage;

/// Wraps `t` into `[0, cycle_time)`, handling negative intermediate values
/// from signed subtraction. The single helper every cycle-modular
/// computation in this crate goes through.
pub fn wrap(t: i64, cycle_time: i64) -> i64 {
    if cycle_time == 0 {
        return 0;
    }
    ((t % cycle_time) + cycle_time) % cycle_time
}

/// One emitted item of a stage sequence: the stage, the pulse point it
/// starts at, and the call-rate it was scaled by (1.0 unless derived from
/// a pedestrian/PV-PX flavor with no or partial observation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSequenceItem {
    stage_number: i64,
    pulse_time: i64,
    effective_call_rate: f64,
}

impl StageSequenceItem {
    pub fn new(stage_number: i64, pulse_time: i64, effective_call_rate: f64) -> Self {
        Self { stage_number, pulse_time, effective_call_rate }
    }

    pub fn stage_number(&self) -> i64 {
        self.stage_number
    }

    pub fn pulse_time(&self) -> i64 {
        self.pulse_time
    }

    pub fn effective_call_rate(&self) -> f64 {
        self.effective_call_rate
    }
}

fn observed_total_time(observations: Option<&M37Averages>, site_id: &str, stage: &Stage, period_id: &str, is_pedestrian: bool) -> Option<i64> {
    observations.and_then(|obs| {
        obs.get(site_id, &stage.m37_stage_id(is_pedestrian), period_id).map(|m| m.total_time())
    })
}

fn has_observation(observations: Option<&M37Averages>, site_id: &str, stage: &Stage, period_id: &str, is_pedestrian: bool) -> bool {
    match observed_total_time(observations, site_id, stage, period_id, is_pedestrian) {
        Some(t) => t > 0,
        None => observations.is_none(),
    }
}

/// Stages commanded by `commanded_numbers` that exist in `stream_index`,
/// in cyclic order starting just after `after_stage_number` (higher
/// commanded numbers first, then lower — matching the source's
/// `stages_existing_in_stream` cyclic reordering).
fn existing_stages_cyclic<'a>(
    controller: &'a Controller,
    stream_index: i64,
    commanded_numbers: &[i64],
    after_stage_number: i64,
) -> Vec<&'a Stage> {
    let mut existing: Vec<&Stage> = commanded_numbers
        .iter()
        .filter_map(|&n| controller.stage_in_stream_by_number(stream_index, n))
        .collect();
    existing.sort_by_key(|s| s.stage_number());
    existing.dedup_by_key(|s| s.stage_number());
    let high: Vec<&Stage> = existing.iter().copied().filter(|s| s.stage_number() > after_stage_number).collect();
    let low: Vec<&Stage> = existing.iter().copied().filter(|s| s.stage_number() <= after_stage_number).collect();
    high.into_iter().chain(low).collect()
}

fn initial_stage_number(
    controller: &Controller,
    stream_index: i64,
    plan: &Plan,
    observations: Option<&M37Averages>,
    site_id: &str,
    period_id: &str,
) -> Option<i64> {
    let mut initial = None;
    for item in plan.items() {
        let commanded = item.commanded_stage_numbers();
        for &n in &commanded {
            if let Some(stage) = controller.stage_in_stream_by_number(stream_index, n) {
                if has_observation(observations, site_id, stage, period_id, false) {
                    initial = Some(stage.stage_number());
                    break;
                }
            }
        }
    }
    initial
}

/// Junction flavor (default vehicle-stream sequencing). See spec §4.5.
pub fn build_junction_sequence(
    controller: &Controller,
    stream_index: i64,
    site_id: &str,
    plan: &Plan,
    observations: Option<&M37Averages>,
    cycle_time: i64,
    period_id: &str,
    config: &EmulatorConfig,
    warnings: &mut Vec<Warning>,
) -> Vec<StageSequenceItem> {
    let Some(mut active) = initial_stage_number(controller, stream_index, plan, observations, site_id, period_id) else {
        return Vec::new();
    };

    let mut sequence: Vec<StageSequenceItem> = Vec::new();
    let mut used = std::collections::HashSet::new();

    for item in plan.items() {
        let active_stage = controller.stage(active).expect("active stage exists");
        let commanded = item.commanded_stage_numbers();
        if commanded.contains(&(active_stage.stream_stage_number() + 1)) {
            continue;
        }
        let candidates = existing_stages_cyclic(controller, stream_index, &commanded, active_stage.stage_number());
        let Some(new_stage) = candidates
            .into_iter()
            .find(|s| has_observation(observations, site_id, s, period_id, false))
        else {
            continue;
        };
        if new_stage.stage_number() == active {
            continue;
        }
        if used.contains(&new_stage.stage_number()) {
            warnings.push(Warning::RepeatedStageInSequence {
                controller_key: controller.controller_key().to_string(),
                stage_number: new_stage.stage_number(),
            });
            continue;
        }

        let mut pulse_time = if let Some(prev) = sequence.last() {
            if let Some(prev_stage) = controller.stage(prev.stage_number()) {
                if let Some(total) = observed_total_time(observations, site_id, prev_stage, period_id, false) {
                    prev.pulse_time() + total
                } else {
                    item.pulse_time()
                }
            } else {
                item.pulse_time()
            }
        } else {
            item.pulse_time()
        };
        if item.has_no_stage_bits() {
            pulse_time += config.legacy_no_bits_pulse_bump as i64;
        }
        pulse_time = wrap(pulse_time, cycle_time);

        sequence.push(StageSequenceItem::new(new_stage.stage_number(), pulse_time, 1.0));
        used.insert(new_stage.stage_number());
        active = new_stage.stage_number();
    }

    if sequence.len() > 1 && sequence.first().map(|s| s.stage_number()) == sequence.last().map(|s| s.stage_number()) {
        sequence.pop();
    }

    if sequence.is_empty() {
        if let Some(stage) = controller.stage(active) {
            sequence.push(StageSequenceItem::new(stage.stage_number(), 0, 1.0));
        }
    }

    validate_sequence(controller, &sequence, warnings);
    sequence
}

fn validate_sequence(controller: &Controller, sequence: &[StageSequenceItem], warnings: &mut Vec<Warning>) {
    if sequence.len() < 2 {
        return;
    }
    for i in 0..sequence.len() {
        let current = sequence[i];
        let next = sequence[(i + 1) % sequence.len()];
        if current.stage_number() == next.stage_number() {
            warnings.push(Warning::RepeatedStageInSequence {
                controller_key: controller.controller_key().to_string(),
                stage_number: current.stage_number(),
            });
        } else if controller.is_prohibited(current.stage_number(), next.stage_number()) {
            warnings.push(Warning::ProhibitedStageTransition {
                controller_key: controller.controller_key().to_string(),
                end_stage: current.stage_number(),
                start_stage: next.stage_number(),
            });
        }
    }
}

/// The road-green (stream_stage_number 0) and not-road-green
/// (stream_stage_number 1) stages of a two-stage pedestrian/PV-PX stream,
/// plus the one phase of the not-road-green stage.
struct PedestrianStages<'a> {
    road_green: &'a Stage,
    not_road_green: &'a Stage,
    not_road_green_phase_ref: PhaseRef,
}

fn pedestrian_stages<'a>(controller: &'a Controller, stream_index: i64) -> Option<PedestrianStages<'a>> {
    let road_green = controller.stage_in_stream_by_number(stream_index, 1)?;
    let not_road_green = controller.stage_in_stream_by_number(stream_index, 2)?;
    let not_road_green_phase_ref = not_road_green.phase_refs().first()?.clone();
    Some(PedestrianStages { road_green, not_road_green, not_road_green_phase_ref })
}

/// Pedestrian flavor: two-stage streams where road-green alternates with
/// a pedestrian crossing stage. See spec §4.5.
pub fn build_pedestrian_sequence(
    controller: &Controller,
    overlay: &ModificationOverlay,
    stream_index: i64,
    site_id: &str,
    plan: &Plan,
    observations: Option<&M37Averages>,
    cycle_time: i64,
    period_id: &str,
    config: &EmulatorConfig,
) -> Vec<StageSequenceItem> {
    let Some(stages) = pedestrian_stages(controller, stream_index) else { return Vec::new() };

    let f2_item = plan.items().iter().find(|i| i.f_bits() == ["F2"]);
    let f1_item = plan.items().iter().find(|i| i.f_bits() == ["F1"]);
    let (Some(f2_item), Some(f1_item)) = (f2_item, f1_item) else { return Vec::new() };

    let mut sequence = Vec::new();
    sequence.push(StageSequenceItem::new(stages.road_green.stage_number(), wrap(f2_item.pulse_time(), cycle_time), 1.0));

    let ped_min = controller.phase(&stages.not_road_green_phase_ref).map(|p| p.min_time()).unwrap_or(0);
    let ig_ped = required_interstage(controller, overlay, stages.road_green, stages.not_road_green, false);

    let (not_road_green_time, call_rate) = match observed_total_time(observations, site_id, stages.not_road_green, period_id, true) {
        Some(total) if total > 0 => (total, 1.0),
        _ => ((ig_ped + ped_min), config.ped_call_rate_for_period(period_id)),
    };

    let pulse_time = wrap(sequence[0].pulse_time() + (not_road_green_time as f64 * call_rate).round() as i64, cycle_time);
    sequence.push(StageSequenceItem::new(stages.not_road_green.stage_number(), pulse_time, call_rate));

    let _ = f1_item;
    sequence
}

/// PV/PX flavor: like pedestrian, but accounts for a trailing
/// pedestrian-to-traffic intergreen in the road-green stage's own pulse
/// adjustment (applied downstream in the Projector); the sequencer here
/// only derives the not-road-green stage length using both intergreen
/// directions. See spec §4.5.
pub fn build_pv_px_sequence(
    controller: &Controller,
    overlay: &ModificationOverlay,
    stream_index: i64,
    site_id: &str,
    plan: &Plan,
    observations: Option<&M37Averages>,
    cycle_time: i64,
    period_id: &str,
    config: &EmulatorConfig,
) -> Vec<StageSequenceItem> {
    let Some(stages) = pedestrian_stages(controller, stream_index) else { return Vec::new() };

    let mut items: Vec<&crate::plan::PlanSequenceItem> = plan.items().iter().collect();
    items.sort_by_key(|i| i.p_bits().len());

    let ig_ped = required_interstage(controller, overlay, stages.road_green, stages.not_road_green, false);
    let ig_traffic = required_interstage(controller, overlay, stages.not_road_green, stages.road_green, false);
    let ped_min = controller.phase(&stages.not_road_green_phase_ref).map(|p| p.min_time()).unwrap_or(0);

    let Some(first) = items.first() else { return Vec::new() };
    let mut sequence = vec![StageSequenceItem::new(stages.road_green.stage_number(), wrap(first.pulse_time(), cycle_time), 1.0)];

    let (not_road_green_time, call_rate) = match observed_total_time(observations, site_id, stages.not_road_green, period_id, true) {
        Some(total) if total > 0 => (total, 1.0),
        _ => (ig_ped + ig_traffic + ped_min, config.ped_call_rate_for_period(period_id)),
    };
    let adjustment_factor = if ped_min + ig_ped + ig_traffic > 0 {
        ig_traffic as f64 / (ped_min + ig_ped + ig_traffic) as f64
    } else {
        0.0
    };
    let adjustment_seconds = (adjustment_factor * not_road_green_time as f64) as i64;
    let stage_length = ((not_road_green_time - adjustment_seconds) as f64 * call_rate).round() as i64;

    let pulse_time = wrap(sequence[0].pulse_time() + stage_length, cycle_time);
    sequence.push(StageSequenceItem::new(stages.not_road_green.stage_number(), pulse_time, call_rate));
    sequence
}

/// Dispatches to the flavor selected by the stream's flags.
pub fn build_stage_sequence(
    controller: &Controller,
    overlay: &ModificationOverlay,
    stream_index: i64,
    site_id: &str,
    plan: &Plan,
    observations: Option<&M37Averages>,
    cycle_time: i64,
    period_id: &str,
    config: &EmulatorConfig,
    warnings: &mut Vec<Warning>,
) -> Vec<StageSequenceItem> {
    let Some(stream) = controller.stream(stream_index) else { return Vec::new() };
    if stream.pv_px_mode() {
        build_pv_px_sequence(controller, overlay, stream_index, site_id, plan, observations, cycle_time, period_id, config)
    } else if stream.is_pedestrian() {
        build_pedestrian_sequence(controller, overlay, stream_index, site_id, plan, observations, cycle_time, period_id, config)
    } else {
        build_junction_sequence(controller, stream_index, site_id, plan, observations, cycle_time, period_id, config, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Phase, PhaseKind, Stream, TerminationType};
    use crate::observation::M37Average;
    use crate::plan::PlanSequenceItem;

    fn phase(phase_ref: &str) -> Phase {
        Phase::new(PhaseRef::new(phase_ref), PhaseKind::Traffic, TerminationType::EndOfStage, 7)
    }

    /// Seed scenario S1: three-stage plan, cycle 80, stages [1, 2, 3].
    #[test]
    fn junction_sequence_matches_seed_s1() {
        let mut warnings = Vec::new();
        let controller = Controller::new("J00/004")
            .with_stream(Stream::new(0))
            .with_phase(phase("A"))
            .with_phase(phase("B"))
            .with_phase(phase("C"))
            .with_stage(Stage::new(1, 0, 0, vec![PhaseRef::new("A")]))
            .with_stage(Stage::new(2, 0, 1, vec![PhaseRef::new("B")]))
            .with_stage(Stage::new(3, 0, 2, vec![PhaseRef::new("C")]))
            .build(&mut warnings);

        let plan = Plan::new("J00/004", 1, 80, "WAT AM")
            .with_item(PlanSequenceItem::new(0, 0).with_f_bits(vec!["F1".to_string()]))
            .with_item(PlanSequenceItem::new(1, 30).with_f_bits(vec!["F2".to_string()]))
            .with_item(PlanSequenceItem::new(2, 55).with_f_bits(vec!["F3".to_string()]));

        let config = EmulatorConfig::default();
        let sequence = build_junction_sequence(&controller, 0, "J00/004", &plan, None, 80, "AM", &config, &mut warnings);

        let stage_numbers: Vec<i64> = sequence.iter().map(|s| s.stage_number()).collect();
        assert_eq!(stage_numbers, vec![1, 2, 3]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn junction_sequence_uses_observed_total_time_for_pulse_arithmetic() {
        let mut warnings = Vec::new();
        let controller = Controller::new("J00/004")
            .with_stream(Stream::new(0))
            .with_phase(phase("A"))
            .with_phase(phase("B"))
            .with_stage(Stage::new(1, 0, 0, vec![PhaseRef::new("A")]))
            .with_stage(Stage::new(2, 0, 1, vec![PhaseRef::new("B")]))
            .build(&mut warnings);

        let plan = Plan::new("J00/004", 1, 80, "WAT AM")
            .with_item(PlanSequenceItem::new(0, 0).with_f_bits(vec!["F1".to_string()]))
            .with_item(PlanSequenceItem::new(1, 999).with_f_bits(vec!["F2".to_string()]));

        let mut observations = M37Averages::new();
        observations.add("J00/004", "G1", "AM", M37Average { green_time: 30, interstage_time: 5, cycle_time: 80 });
        observations.add("J00/004", "G2", "AM", M37Average { green_time: 20, interstage_time: 5, cycle_time: 80 });

        let config = EmulatorConfig::default();
        let sequence = build_junction_sequence(&controller, 0, "J00/004", &plan, Some(&observations), 80, "AM", &config, &mut warnings);

        assert_eq!(sequence[0].pulse_time(), 0);
        // pulse = previous (0) + observed total of stage 1 (35)
        assert_eq!(sequence[1].pulse_time(), 35);
    }

    #[test]
    fn wrap_handles_negative_and_overflow() {
        assert_eq!(wrap(-5, 80), 75);
        assert_eq!(wrap(85, 80), 5);
        assert_eq!(wrap(40, 80), 40);
    }
}
