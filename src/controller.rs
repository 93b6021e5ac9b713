//! Controller Model: the static, read-only junction description — phases,
//! stages, streams, the intergreen matrix, the phase-delay table, the
//! prohibited stage-move set and phase/stage demand dependencies.
//!
//! Everything here is immutable once loaded. Per-period overrides live in
//! [`crate::overlay`], never on these structs directly.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;

use crate::errors::Warning;
use crate::verbose::{VerboseLevel, is_verbose_level};

/// A phase reference, e.g. `"A"`, `"B"`, `"AA"`. Stable integer encoding:
/// `A=1, ..., Z=26, AA=27, AB=28, ...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhaseRef(pub String);

impl PhaseRef {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Stable integer encoding of the phase_ref, `A=1 .. Z=26, AA=27 ..`.
    pub fn encode(&self) -> u32 {
        self.0.chars().fold(0u32, |acc, c| {
            acc * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalizes a raw site identifier into the canonical `J<area>/<site>`
/// form: numeric-only prefixes gain a leading `J`; any other alphabetic
/// prefix is replaced with `J`; the suffix is the last three digits.
pub fn normalize_site_id(raw: &str) -> String {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() < 2 {
        return raw.to_string();
    }
    let area = if parts[0].chars().all(|c| c.is_ascii_digit()) {
        format!("J{}", parts[0])
    } else if parts[0].chars().next().map(|c| c.is_alphabetic()).unwrap_or(false) {
        format!("J{}", &parts[0][1..])
    } else {
        parts[0].to_string()
    };
    let suffix_source = parts[1];
    let suffix = if suffix_source.len() >= 3 {
        &suffix_source[suffix_source.len() - 3..]
    } else {
        suffix_source
    };
    format!("{}/{}", area, suffix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Traffic,
    Pedestrian,
    Filter,
    Dummy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationType {
    EndOfStage,
    AssociatedGainsRow,
    AssociatedLosesRow,
    /// Termination type `3`, unnamed in the source data. Treated as Dummy.
    UnnamedThree,
}

impl TerminationType {
    pub fn from_raw(value: i64) -> Option<Self> {
        match value {
            0 => Some(TerminationType::EndOfStage),
            1 => Some(TerminationType::AssociatedGainsRow),
            2 => Some(TerminationType::AssociatedLosesRow),
            3 => Some(TerminationType::UnnamedThree),
            _ => None,
        }
    }
}

/// The phase kind as consumed downstream by the Sequencer and Projector,
/// derived from `(PhaseKind, TerminationType)` via [`linsig_phase_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinsigPhaseKind {
    Traffic,
    Pedestrian,
    Filter,
    IndicativeArrow,
    Dummy,
}

/// `kind x termination -> projected kind`, per the decision table.
///
/// Returns `None` only when the combination is genuinely absent from the
/// table and not the known-but-unnamed `UnnamedThree` case, signalling the
/// caller should raise `UnknownTerminationType`.
pub fn linsig_phase_kind(kind: PhaseKind, term: TerminationType) -> Option<LinsigPhaseKind> {
    use LinsigPhaseKind::*;
    use PhaseKind::*;
    use TerminationType::*;
    match (kind, term) {
        (Traffic, EndOfStage) => Some(Traffic),
        (Traffic, AssociatedGainsRow) => Some(Filter),
        (Traffic, AssociatedLosesRow) => Some(Traffic),
        (Pedestrian, EndOfStage) => Some(Pedestrian),
        (Filter, AssociatedGainsRow) => Some(Filter),
        (Filter, AssociatedLosesRow) => Some(IndicativeArrow),
        (Filter, EndOfStage) => Some(Dummy),
        (Dummy, _) => Some(Dummy),
        (_, UnnamedThree) => Some(Dummy),
        _ => None,
    }
}

/// A signal group. Attributes as declared on the timing sheet plus
/// derived data (`indicative_arrow_phase_ref`) computed once after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    phase_ref: PhaseRef,
    kind: PhaseKind,
    termination: TerminationType,
    min_time: i64,
    associated_phase_ref: Option<PhaseRef>,
    indicative_arrow_phase_ref: Option<PhaseRef>,
}

impl Phase {
    pub fn new(phase_ref: PhaseRef, kind: PhaseKind, termination: TerminationType, min_time: i64) -> Self {
        Self {
            phase_ref,
            kind,
            termination,
            min_time,
            associated_phase_ref: None,
            indicative_arrow_phase_ref: None,
        }
    }

    pub fn with_associated_phase(mut self, phase_ref: PhaseRef) -> Self {
        self.associated_phase_ref = Some(phase_ref);
        self
    }

    pub fn phase_ref(&self) -> &PhaseRef {
        &self.phase_ref
    }

    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    pub fn termination(&self) -> TerminationType {
        self.termination
    }

    pub fn min_time(&self) -> i64 {
        self.min_time
    }

    pub fn associated_phase_ref(&self) -> Option<&PhaseRef> {
        self.associated_phase_ref.as_ref()
    }

    pub fn indicative_arrow_phase_ref(&self) -> Option<&PhaseRef> {
        self.indicative_arrow_phase_ref.as_ref()
    }

    pub fn linsig_kind(&self) -> Option<LinsigPhaseKind> {
        linsig_phase_kind(self.kind, self.termination)
    }
}

/// A named, numbered set of phases holding right-of-way simultaneously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    stage_number: i64,
    stream_index: i64,
    stream_stage_number: i64,
    phase_refs: Vec<PhaseRef>,
}

impl Stage {
    pub fn new(stage_number: i64, stream_index: i64, stream_stage_number: i64, phase_refs: Vec<PhaseRef>) -> Self {
        Self { stage_number, stream_index, stream_stage_number, phase_refs }
    }

    pub fn stage_number(&self) -> i64 {
        self.stage_number
    }

    pub fn stream_index(&self) -> i64 {
        self.stream_index
    }

    pub fn stream_stage_number(&self) -> i64 {
        self.stream_stage_number
    }

    pub fn phase_refs(&self) -> &[PhaseRef] {
        &self.phase_refs
    }

    fn phase_set(&self) -> HashSet<&PhaseRef> {
        self.phase_refs.iter().collect()
    }

    /// `M37` stage-id label for this stage's ordinal position within its
    /// stream: `G1..G8` for vehicle stages, `GX`/`PG` for the two
    /// pedestrian-stream labels.
    pub fn m37_stage_id(&self, is_pedestrian: bool) -> String {
        if is_pedestrian {
            if self.stream_stage_number == 0 { "GX".to_string() } else { "PG".to_string() }
        } else {
            format!("G{}", self.stream_stage_number + 1)
        }
    }
}

/// An independent cyclic signal group within a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    stream_index: i64,
    pv_px_mode: bool,
    is_pedestrian: bool,
}

impl Stream {
    pub fn new(stream_index: i64) -> Self {
        Self { stream_index, pv_px_mode: false, is_pedestrian: false }
    }

    pub fn with_pv_px_mode(mut self, pv_px_mode: bool) -> Self {
        self.pv_px_mode = pv_px_mode;
        self
    }

    pub fn with_pedestrian(mut self, is_pedestrian: bool) -> Self {
        self.is_pedestrian = is_pedestrian;
        self
    }

    pub fn stream_index(&self) -> i64 {
        self.stream_index
    }

    pub fn pv_px_mode(&self) -> bool {
        self.pv_px_mode
    }

    pub fn is_pedestrian(&self) -> bool {
        self.is_pedestrian
    }

    /// 1-based stream number as used in LinSig-facing identifiers.
    pub fn stream_number_linsig(&self) -> i64 {
        self.stream_index + 1
    }
}

/// Minimum seconds between `end_phase` losing right-of-way and
/// `start_phase` gaining it. Keyed `(end_phase, start_phase)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intergreen {
    pub intergreen_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseDelayKind {
    Losing,
    Gaining,
}

/// Additional delay applied to `phase_ref` on transition
/// `(end_stage, start_stage)`. Kind is derived at load time from stage
/// membership, not declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDelay {
    pub delay_time: i64,
    pub kind: PhaseDelayKind,
}

/// A forbidden `(end_stage, start_stage)` ordered pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProhibitedStageMove {
    pub end_stage: i64,
    pub start_stage: i64,
}

/// A declared dependency of one phase's demand in a stage on another stage
/// being called. Carried as inert, round-tripped data: no algorithm in
/// this engine consumes it yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseStageDemandDependency {
    pub phase_ref: PhaseRef,
    pub stage_number: i64,
    pub depends_on_stage_number: i64,
}

/// The static junction description. Immutable after [`ControllerBuilder::build`].
#[derive(Debug, Clone)]
pub struct Controller {
    controller_key: String,
    is_parallel: bool,
    streams: IndexMap<i64, Stream>,
    stages: IndexMap<i64, Stage>,
    phases: IndexMap<PhaseRef, Phase>,
    intergreens: IndexMap<(PhaseRef, PhaseRef), Intergreen>,
    phase_delays: IndexMap<(i64, i64, PhaseRef), PhaseDelay>,
    prohibited_stage_moves: HashSet<ProhibitedStageMove>,
    demand_dependencies: Vec<PhaseStageDemandDependency>,
}

impl Controller {
    pub fn new(controller_key: impl Into<String>) -> ControllerBuilder {
        ControllerBuilder::new(controller_key)
    }

    pub fn controller_key(&self) -> &str {
        &self.controller_key
    }

    pub fn is_parallel(&self) -> bool {
        self.is_parallel
    }

    pub fn stream(&self, stream_index: i64) -> Option<&Stream> {
        self.streams.get(&stream_index)
    }

    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.values()
    }

    pub fn stage(&self, stage_number: i64) -> Option<&Stage> {
        self.stages.get(&stage_number)
    }

    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.values()
    }

    pub fn stages_in_stream(&self, stream_index: i64) -> Vec<&Stage> {
        let mut result: Vec<&Stage> = self
            .stages
            .values()
            .filter(|s| s.stream_index == stream_index)
            .collect();
        result.sort_by_key(|s| s.stream_stage_number);
        result
    }

    /// The stage within `stream_index` whose 1-based commanded number
    /// (`stream_stage_number + 1`, matching the plan item's F-bit/PV/PX
    /// encoding and the M37 `G1..G8` numbering) equals `commanded_number`.
    pub fn stage_in_stream_by_number(&self, stream_index: i64, commanded_number: i64) -> Option<&Stage> {
        self.stages
            .values()
            .find(|s| s.stream_index == stream_index && s.stream_stage_number + 1 == commanded_number)
    }

    pub fn phase(&self, phase_ref: &PhaseRef) -> Option<&Phase> {
        self.phases.get(phase_ref)
    }

    pub fn phases(&self) -> impl Iterator<Item = &Phase> {
        self.phases.values()
    }

    pub fn phases_in_stage(&self, stage_number: i64) -> Vec<&Phase> {
        let Some(stage) = self.stage(stage_number) else { return Vec::new() };
        stage.phase_refs.iter().filter_map(|r| self.phases.get(r)).collect()
    }

    /// `end_stage.phases \ start_stage.phases`
    pub fn end_phases(&self, end_stage: &Stage, start_stage: &Stage) -> Vec<&Phase> {
        let start_set = start_stage.phase_set();
        end_stage
            .phase_refs
            .iter()
            .filter(|r| !start_set.contains(r))
            .filter_map(|r| self.phases.get(r))
            .collect()
    }

    /// `start_stage.phases \ end_stage.phases`
    pub fn start_phases(&self, end_stage: &Stage, start_stage: &Stage) -> Vec<&Phase> {
        let end_set = end_stage.phase_set();
        start_stage
            .phase_refs
            .iter()
            .filter(|r| !end_set.contains(r))
            .filter_map(|r| self.phases.get(r))
            .collect()
    }

    pub fn intergreen(&self, end_phase: &PhaseRef, start_phase: &PhaseRef) -> i64 {
        self.intergreens
            .get(&(end_phase.clone(), start_phase.clone()))
            .map(|ig| ig.intergreen_time)
            .unwrap_or(0)
    }

    pub fn phase_delay(&self, end_stage_key: i64, start_stage_key: i64, phase_ref: &PhaseRef) -> i64 {
        self.phase_delays
            .get(&(end_stage_key, start_stage_key, phase_ref.clone()))
            .map(|d| d.delay_time)
            .unwrap_or(0)
    }

    pub fn is_prohibited(&self, end_stage: i64, start_stage: i64) -> bool {
        self.prohibited_stage_moves.contains(&ProhibitedStageMove { end_stage, start_stage })
    }

    pub fn demand_dependencies(&self) -> &[PhaseStageDemandDependency] {
        &self.demand_dependencies
    }
}

/// Builds a [`Controller`], validating phase delays and linking
/// indicative-arrow back-pointers once all phases are known.
pub struct ControllerBuilder {
    controller_key: String,
    is_parallel: bool,
    streams: IndexMap<i64, Stream>,
    stages: IndexMap<i64, Stage>,
    phases: IndexMap<PhaseRef, Phase>,
    intergreens: IndexMap<(PhaseRef, PhaseRef), Intergreen>,
    raw_phase_delays: Vec<(i64, i64, PhaseRef, i64)>,
    prohibited_stage_moves: HashSet<ProhibitedStageMove>,
    demand_dependencies: Vec<PhaseStageDemandDependency>,
}

impl ControllerBuilder {
    fn new(controller_key: impl Into<String>) -> Self {
        Self {
            controller_key: controller_key.into(),
            is_parallel: false,
            streams: IndexMap::new(),
            stages: IndexMap::new(),
            phases: IndexMap::new(),
            intergreens: IndexMap::new(),
            raw_phase_delays: Vec::new(),
            prohibited_stage_moves: HashSet::new(),
            demand_dependencies: Vec::new(),
        }
    }

    pub fn with_parallel(mut self, is_parallel: bool) -> Self {
        self.is_parallel = is_parallel;
        self
    }

    pub fn with_stream(mut self, stream: Stream) -> Self {
        self.streams.insert(stream.stream_index(), stream);
        self
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.insert(stage.stage_number(), stage);
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phases.insert(phase.phase_ref().clone(), phase);
        self
    }

    pub fn with_intergreen(mut self, end_phase: PhaseRef, start_phase: PhaseRef, intergreen_time: i64) -> Self {
        self.intergreens.insert((end_phase, start_phase), Intergreen { intergreen_time });
        self
    }

    /// Queued until [`build`](Self::build), where membership against the
    /// two stages' phase sets determines the delay kind or drops it with
    /// [`Warning::InvalidPhaseDelay`].
    pub fn with_phase_delay(mut self, end_stage_key: i64, start_stage_key: i64, phase_ref: PhaseRef, delay_time: i64) -> Self {
        self.raw_phase_delays.push((end_stage_key, start_stage_key, phase_ref, delay_time));
        self
    }

    pub fn with_prohibited_stage_move(mut self, end_stage: i64, start_stage: i64) -> Self {
        self.prohibited_stage_moves.insert(ProhibitedStageMove { end_stage, start_stage });
        self
    }

    pub fn with_demand_dependency(mut self, dep: PhaseStageDemandDependency) -> Self {
        self.demand_dependencies.push(dep);
        self
    }

    /// Validates phase delays (dropping invalid ones with a warning),
    /// links indicative-arrow back-pointers, and returns the immutable
    /// [`Controller`].
    pub fn build(self, warnings: &mut Vec<Warning>) -> Controller {
        let mut phases = self.phases;

        for phase in phases.values() {
            if let TerminationType::UnnamedThree = phase.termination {
                warnings.push(Warning::UnnamedTerminationTypeThree {
                    controller_key: self.controller_key.clone(),
                    phase_ref: phase.phase_ref.to_string(),
                });
                if is_verbose_level(VerboseLevel::Additional) {
                    crate::log_additional!(
                        crate::verbose::EVENT_CONTROLLER_LOAD,
                        "termination type 3 treated as Dummy",
                        phase_ref = phase.phase_ref.to_string()
                    );
                }
            }
        }

        let mut phase_delays = IndexMap::new();
        for (end_stage_key, start_stage_key, phase_ref, delay_time) in self.raw_phase_delays {
            let Some(end_stage) = self.stages.get(&end_stage_key) else { continue };
            let Some(start_stage) = self.stages.get(&start_stage_key) else { continue };
            let kind = if end_stage.phase_refs.contains(&phase_ref) {
                Some(PhaseDelayKind::Losing)
            } else if start_stage.phase_refs.contains(&phase_ref) {
                Some(PhaseDelayKind::Gaining)
            } else {
                None
            };
            match kind {
                Some(kind) => {
                    phase_delays.insert(
                        (end_stage_key, start_stage_key, phase_ref),
                        PhaseDelay { delay_time, kind },
                    );
                }
                None => {
                    warnings.push(Warning::InvalidPhaseDelay {
                        controller_key: self.controller_key.clone(),
                        end_stage_key,
                        start_stage_key,
                        phase_ref: phase_ref.to_string(),
                    });
                }
            }
        }

        // Indicative-arrow linkage: every ALR phase with an associated
        // phase sets that phase's back-pointer to itself.
        let links: Vec<(PhaseRef, PhaseRef)> = phases
            .values()
            .filter(|p| p.termination == TerminationType::AssociatedLosesRow)
            .filter_map(|p| p.associated_phase_ref.clone().map(|a| (a, p.phase_ref.clone())))
            .collect();
        for (associated, arrow) in links {
            if let Some(phase) = phases.get_mut(&associated) {
                phase.indicative_arrow_phase_ref = Some(arrow.clone());
                if is_verbose_level(VerboseLevel::Additional) {
                    crate::log_additional!(
                        crate::verbose::EVENT_INDICATIVE_ARROW_LINK,
                        "linked indicative arrow phase",
                        parent = associated.to_string(),
                        arrow = arrow.to_string()
                    );
                }
            }
        }

        Controller {
            controller_key: self.controller_key,
            is_parallel: self.is_parallel,
            streams: self.streams,
            stages: self.stages,
            phases,
            intergreens: self.intergreens,
            phase_delays,
            prohibited_stage_moves: self.prohibited_stage_moves,
            demand_dependencies: self.demand_dependencies,
        }
    }
}

/// An insertion-ordered collection of [`Controller`]s keyed by controller_key.
#[derive(Debug, Clone, Default)]
pub struct Controllers {
    data: IndexMap<String, Controller>,
}

impl Controllers {
    pub fn new() -> Self {
        Self { data: IndexMap::new() }
    }

    pub fn add(&mut self, controller: Controller) {
        self.data.insert(controller.controller_key().to_string(), controller);
    }

    pub fn get(&self, controller_key: &str) -> Option<&Controller> {
        self.data.get(controller_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Controller> {
        self.data.values()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ref_encodes_like_spreadsheet_columns() {
        assert_eq!(PhaseRef::new("A").encode(), 1);
        assert_eq!(PhaseRef::new("Z").encode(), 26);
        assert_eq!(PhaseRef::new("AA").encode(), 27);
    }

    #[test]
    fn site_id_normalization_scenarios() {
        assert_eq!(normalize_site_id("01/125"), "J01/125");
        assert_eq!(normalize_site_id("J01/000125/U"), "J01/125");
        assert_eq!(normalize_site_id("P01/000007/U"), "J01/007");
    }

    #[test]
    fn decision_table_matches_source() {
        use LinsigPhaseKind::*;
        use PhaseKind::*;
        use TerminationType::*;
        assert_eq!(linsig_phase_kind(Traffic, EndOfStage), Some(Traffic));
        assert_eq!(linsig_phase_kind(Traffic, AssociatedGainsRow), Some(Filter));
        assert_eq!(linsig_phase_kind(Traffic, AssociatedLosesRow), Some(Traffic));
        assert_eq!(linsig_phase_kind(Pedestrian, EndOfStage), Some(Pedestrian));
        assert_eq!(linsig_phase_kind(Filter, AssociatedGainsRow), Some(Filter));
        assert_eq!(linsig_phase_kind(Filter, AssociatedLosesRow), Some(IndicativeArrow));
        assert_eq!(linsig_phase_kind(Filter, EndOfStage), Some(Dummy));
        assert_eq!(linsig_phase_kind(Dummy, EndOfStage), Some(Dummy));
        assert_eq!(linsig_phase_kind(Dummy, UnnamedThree), Some(Dummy));
        assert_eq!(linsig_phase_kind(Pedestrian, UnnamedThree), Some(Dummy));
    }

    fn phase(phase_ref: &str, kind: PhaseKind, term: TerminationType) -> Phase {
        Phase::new(PhaseRef::new(phase_ref), kind, term, 7)
    }

    #[test]
    fn end_phases_and_start_phases_are_set_differences() {
        let mut warnings = Vec::new();
        let controller = Controller::new("J00/004")
            .with_phase(phase("A", PhaseKind::Traffic, TerminationType::EndOfStage))
            .with_phase(phase("B", PhaseKind::Traffic, TerminationType::EndOfStage))
            .with_phase(phase("C", PhaseKind::Traffic, TerminationType::EndOfStage))
            .with_stage(Stage::new(1, 0, 0, vec![PhaseRef::new("A"), PhaseRef::new("B")]))
            .with_stage(Stage::new(2, 0, 1, vec![PhaseRef::new("B"), PhaseRef::new("C")]))
            .build(&mut warnings);

        let s1 = controller.stage(1).unwrap();
        let s2 = controller.stage(2).unwrap();
        let end: Vec<&str> = controller.end_phases(s1, s2).iter().map(|p| p.phase_ref().as_str()).collect();
        let start: Vec<&str> = controller.start_phases(s1, s2).iter().map(|p| p.phase_ref().as_str()).collect();
        assert_eq!(end, vec!["A"]);
        assert_eq!(start, vec!["C"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn invalid_phase_delay_is_dropped_with_warning() {
        let mut warnings = Vec::new();
        let controller = Controller::new("J00/004")
            .with_phase(phase("A", PhaseKind::Traffic, TerminationType::EndOfStage))
            .with_stage(Stage::new(1, 0, 0, vec![PhaseRef::new("A")]))
            .with_stage(Stage::new(2, 0, 1, vec![]))
            .with_phase_delay(1, 2, PhaseRef::new("Z"), 5)
            .build(&mut warnings);

        assert_eq!(controller.phase_delay(1, 2, &PhaseRef::new("Z")), 0);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], Warning::InvalidPhaseDelay { .. }));
    }

    #[test]
    fn indicative_arrow_linkage_sets_back_pointer() {
        let mut warnings = Vec::new();
        let controller = Controller::new("J00/004")
            .with_phase(phase("T", PhaseKind::Traffic, TerminationType::EndOfStage))
            .with_phase(
                phase("F", PhaseKind::Filter, TerminationType::AssociatedLosesRow)
                    .with_associated_phase(PhaseRef::new("T")),
            )
            .build(&mut warnings);

        let t = controller.phase(&PhaseRef::new("T")).unwrap();
        assert_eq!(t.indicative_arrow_phase_ref(), Some(&PhaseRef::new("F")));
        let f = controller.phase(&PhaseRef::new("F")).unwrap();
        assert_eq!(f.linsig_kind(), Some(LinsigPhaseKind::IndicativeArrow));
    }
}
