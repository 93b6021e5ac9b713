//! Output data model: [`SignalPlan`]/[`SignalPlanStream`]/[`SignalPlanStage`]
//! (the engine's stage schedule) and [`PhaseTiming`] (the per-phase
//! start/end schedule consumed downstream). Also home to Stage-Length
//! Computation (§4.7), which turns a sequencer's
//! [`StageSequenceItem`](crate::sequencer::StageSequenceItem) list into
//! `SignalPlanStage` records.

use crate::controller::{Controller, PhaseRef, Stage};
use crate::errors::EmulationError;
use crate::observation::M37Averages;
use crate::overlay::ModificationOverlay;
use crate::resolver::required_interstage;
use crate::sequencer::{wrap, StageSequenceItem};

/// One stage's slice of a stream's cycle: how long it holds
/// (`total_length`), how much of that is interstage transition
/// (`interstage_length`), and the remainder (`green_length`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalPlanStage {
    stage_number: i64,
    sequence_index: usize,
    pulse_point: i64,
    total_length: i64,
    interstage_length: i64,
    green_length: i64,
}

impl SignalPlanStage {
    pub fn stage_number(&self) -> i64 {
        self.stage_number
    }

    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn pulse_point(&self) -> i64 {
        self.pulse_point
    }

    pub fn total_length(&self) -> i64 {
        self.total_length
    }

    pub fn interstage_length(&self) -> i64 {
        self.interstage_length
    }

    pub fn green_length(&self) -> i64 {
        self.green_length
    }
}

/// One stream's cyclic stage schedule within a [`SignalPlan`].
#[derive(Debug, Clone)]
pub struct SignalPlanStream {
    stream_index: i64,
    site_id: String,
    cycle_time: i64,
    stages: Vec<SignalPlanStage>,
}

impl SignalPlanStream {
    pub fn stream_index(&self) -> i64 {
        self.stream_index
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn cycle_time(&self) -> i64 {
        self.cycle_time
    }

    pub fn stages(&self) -> &[SignalPlanStage] {
        &self.stages
    }

    pub fn sum_total_length(&self) -> i64 {
        self.stages.iter().map(|s| s.total_length).sum()
    }
}

/// One controller × period's full signal plan: one [`SignalPlanStream`]
/// per active stream, all sharing `cycle_time`.
#[derive(Debug, Clone)]
pub struct SignalPlan {
    controller_key: String,
    period_id: String,
    cycle_time: i64,
    streams: Vec<SignalPlanStream>,
}

impl SignalPlan {
    pub fn new(controller_key: impl Into<String>, period_id: impl Into<String>, cycle_time: i64) -> Self {
        Self { controller_key: controller_key.into(), period_id: period_id.into(), cycle_time, streams: Vec::new() }
    }

    pub fn controller_key(&self) -> &str {
        &self.controller_key
    }

    pub fn period_id(&self) -> &str {
        &self.period_id
    }

    pub fn cycle_time(&self) -> i64 {
        self.cycle_time
    }

    pub fn streams(&self) -> &[SignalPlanStream] {
        &self.streams
    }

    pub fn add_stream(&mut self, stream: SignalPlanStream) {
        self.streams.push(stream);
    }
}

/// `(controller, phase_ref, index, period) -> (start_time, end_time)`,
/// modulo cycle_time. A phase may carry multiple indices per cycle when
/// it appears in more than one non-adjacent stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTiming {
    pub(crate) start_time: Option<i64>,
    pub(crate) end_time: Option<i64>,
}

impl PhaseTiming {
    pub fn new() -> Self {
        Self { start_time: None, end_time: None }
    }

    pub fn with_start(start_time: i64) -> Self {
        Self { start_time: Some(start_time), end_time: None }
    }

    pub fn with_end(end_time: i64) -> Self {
        Self { start_time: None, end_time: Some(end_time) }
    }

    pub fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<i64> {
        self.end_time
    }

    pub fn is_open(&self) -> bool {
        self.start_time.is_some() && self.end_time.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.start_time.is_some() && self.end_time.is_some()
    }
}

impl Default for PhaseTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// The ordered set of [`PhaseTiming`]s accumulated for one phase across
/// one period's emulation.
#[derive(Debug, Clone, Default)]
pub struct PhaseTimings {
    timings: Vec<PhaseTiming>,
}

impl PhaseTimings {
    pub fn new() -> Self {
        Self { timings: Vec::new() }
    }

    pub fn timings(&self) -> &[PhaseTiming] {
        &self.timings
    }

    pub fn last_open_mut(&mut self) -> Option<&mut PhaseTiming> {
        self.timings.last_mut().filter(|t| t.end_time.is_none() && t.start_time.is_some())
    }

    pub fn last_awaiting_start_mut(&mut self) -> Option<&mut PhaseTiming> {
        self.timings.last_mut().filter(|t| t.start_time.is_none() && t.end_time.is_some())
    }

    pub fn push(&mut self, timing: PhaseTiming) {
        self.timings.push(timing);
    }
}

/// A per-(controller, phase_ref) collection of [`PhaseTimings`] for one
/// period's emulation, keyed for lookup by the Projector.
#[derive(Debug, Clone, Default)]
pub struct PhaseTimingsByPhase {
    data: indexmap::IndexMap<PhaseRef, PhaseTimings>,
}

impl PhaseTimingsByPhase {
    pub fn new() -> Self {
        Self { data: indexmap::IndexMap::new() }
    }

    pub fn entry(&mut self, phase_ref: &PhaseRef) -> &mut PhaseTimings {
        self.data.entry(phase_ref.clone()).or_default()
    }

    pub fn get(&self, phase_ref: &PhaseRef) -> Option<&PhaseTimings> {
        self.data.get(phase_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PhaseRef, &PhaseTimings)> {
        self.data.iter()
    }
}

/// Stage-Length Computation (§4.7): turns a sequencer's stage-sequence
/// items into [`SignalPlanStream`]/[`SignalPlanStage`] records, computing
/// `total_length`/`interstage_length`/`green_length` for every
/// consecutive (cyclic) pair.
pub fn compute_signal_plan_stream(
    controller: &Controller,
    overlay: &ModificationOverlay,
    observations: Option<&M37Averages>,
    site_id: &str,
    period_id: &str,
    stream_index: i64,
    cycle_time: i64,
    sequence: &[StageSequenceItem],
) -> Result<SignalPlanStream, EmulationError> {
    let mut stages = Vec::with_capacity(sequence.len());
    for (i, item) in sequence.iter().enumerate() {
        let next = sequence[(i + 1) % sequence.len()];
        let total_length = if sequence.len() == 1 {
            cycle_time
        } else {
            stage_length_from_pulse_points(item.pulse_time(), next.pulse_time(), cycle_time)
        };

        let Some(stage) = controller.stage(item.stage_number()) else {
            return Err(EmulationError::InfeasibleSchedule {
                controller_key: controller.controller_key().to_string(),
                stage_number: item.stage_number(),
                green_length: 0,
            });
        };
        let prev = if i == 0 { sequence[sequence.len() - 1] } else { sequence[i - 1] };
        let Some(prev_stage) = controller.stage(prev.stage_number()) else {
            return Err(EmulationError::InfeasibleSchedule {
                controller_key: controller.controller_key().to_string(),
                stage_number: prev.stage_number(),
                green_length: 0,
            });
        };

        let is_pedestrian = controller.stream(stream_index).map(|s| s.is_pedestrian()).unwrap_or(false);
        let m37_id = stage.m37_stage_id(is_pedestrian);
        let observed = observations.and_then(|o| o.get(site_id, &m37_id, period_id));
        let mut interstage_length = match observed {
            Some(m) if m37_id != "PG" && m37_id != "GX" => m.interstage_time,
            _ => required_interstage(controller, overlay, prev_stage, stage, false),
        };

        if item.effective_call_rate() < 1.0 {
            interstage_length = (interstage_length as f64 * item.effective_call_rate()) as i64;
        } else if prev.effective_call_rate() < 1.0 {
            interstage_length = (interstage_length as f64 * prev.effective_call_rate()) as i64;
        }

        let green_length = total_length - interstage_length;
        if green_length < 0 {
            return Err(EmulationError::InfeasibleSchedule {
                controller_key: controller.controller_key().to_string(),
                stage_number: stage.stage_number(),
                green_length,
            });
        }

        stages.push(SignalPlanStage {
            stage_number: stage.stage_number(),
            sequence_index: i,
            pulse_point: item.pulse_time(),
            total_length,
            interstage_length,
            green_length,
        });
    }

    Ok(SignalPlanStream { stream_index, site_id: site_id.to_string(), cycle_time, stages })
}

fn stage_length_from_pulse_points(this_pulse: i64, next_pulse: i64, cycle_time: i64) -> i64 {
    wrap(next_pulse - this_pulse, cycle_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Phase, PhaseKind, Stream, TerminationType};

    fn phase(phase_ref: &str) -> Phase {
        Phase::new(PhaseRef::new(phase_ref), PhaseKind::Traffic, TerminationType::EndOfStage, 7)
    }

    #[test]
    fn stage_lengths_sum_to_cycle_time() {
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

        let overlay = ModificationOverlay::new();
        let sequence = vec![
            StageSequenceItem::new(1, 0, 1.0),
            StageSequenceItem::new(2, 30, 1.0),
            StageSequenceItem::new(3, 55, 1.0),
        ];

        let stream = compute_signal_plan_stream(&controller, &overlay, None, "J00/004", "AM", 0, 80, &sequence).unwrap();
        assert_eq!(stream.sum_total_length(), 80);
        for stage in stream.stages() {
            assert!(stage.interstage_length() <= stage.total_length());
            assert_eq!(stage.green_length(), stage.total_length() - stage.interstage_length());
        }
    }
}
