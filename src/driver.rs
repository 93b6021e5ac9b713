//! Signal-Plan Driver: per-(controller, period) orchestration. Selects a
//! plan for each stream (§4.4 step 1), harmonizes the cycle time against
//! the Observation Model, then runs the Sequencer, Stage-Length
//! Computation and Phase Projector for every stream and assembles one
//! [`SignalPlan`].

use crate::config::EmulatorConfig;
use crate::controller::{Controller, Controllers};
use crate::errors::{EmulationError, RunLog, Warning};
use crate::observation::M37Averages;
use crate::overlay::ModificationOverlay;
use crate::plan::{Plan, PlanTimetables, Plans};
use crate::projector::project_phase_timings;
use crate::sequencer::build_stage_sequence;
use crate::signal_plan::{compute_signal_plan_stream, PhaseTimingsByPhase, SignalPlan};
use crate::time_period::TimePeriods;
use crate::verbose::{is_verbose_level, VerboseLevel};

/// All per-(controller, period) outputs of one [`drive_controller_period`] call.
pub struct PeriodResult {
    pub signal_plan: SignalPlan,
    pub phase_timings: Vec<(i64, PhaseTimingsByPhase)>,
}

/// Best-matching plan for `controller`'s stream `stream_index` in
/// `period_id`, per §4.4 step 1: PJA entry first, then a WAT/period-name
/// match, then the first non-MINS plan declared for the site.
pub fn select_plan<'a>(
    plans: &'a Plans,
    plan_timetables: &PlanTimetables,
    periods: &TimePeriods,
    site_id: &str,
    period_id: &str,
) -> Option<&'a Plan> {
    if let Some(entry) = plan_timetables.get(site_id, period_id) {
        if let Some(plan_number) = entry.wat_plan_number().or_else(|| entry.control_plan_number()) {
            if let Some(plan) = plans.get(site_id, plan_number) {
                return Some(plan);
            }
        }
    }

    let candidates = plans.for_site(site_id);
    let active_period = periods.get(period_id);

    let wat_named = candidates
        .iter()
        .find(|p| p.name() == format!("WAT {}", period_id) || p.name() == period_id)
        .copied();
    if let Some(plan) = wat_named {
        return Some(plan);
    }

    let wat_loose = candidates
        .iter()
        .find(|p| {
            p.name().contains("WAT")
                && active_period
                    .map(|ap| p.name().contains(ap.name()) || ap.long_name().map(|n| p.name().contains(n)).unwrap_or(false))
                    .unwrap_or(false)
        })
        .copied();
    if let Some(plan) = wat_loose {
        return Some(plan);
    }

    let loose = candidates
        .iter()
        .find(|p| {
            active_period
                .map(|ap| p.name().contains(ap.name()) || ap.long_name().map(|n| p.name().contains(n)).unwrap_or(false))
                .unwrap_or(false)
        })
        .copied();
    if let Some(plan) = loose {
        return Some(plan);
    }

    candidates.into_iter().find(|p| !p.is_mins_fallback())
}

/// Harmonized cycle time for the period: the first stream plan's declared
/// cycle time, unless the Observation Model reports a different one for
/// that site/period, in which case the observed value wins (§4.4 step 2).
fn harmonize_cycle_time(observations: Option<&M37Averages>, site_id: &str, period_id: &str, plan_cycle_time: i64) -> i64 {
    match observations.and_then(|o| o.cycle_time_for_site_period(site_id, period_id)) {
        Some(observed) if observed > 0 => observed,
        _ => plan_cycle_time,
    }
}

/// Drives one controller for one period, producing a [`SignalPlan`] plus
/// each stream's projected [`PhaseTimingsByPhase`]. Returns `Ok(None)`
/// when the controller is skipped entirely (parallel-stream site, or no
/// stream has a usable plan) — recorded as a [`Warning`], not an error.
pub fn drive_controller_period(
    controller: &Controller,
    plans: &Plans,
    plan_timetables: &PlanTimetables,
    periods: &TimePeriods,
    observations: Option<&M37Averages>,
    period_id: &str,
    config: &EmulatorConfig,
    run_log: &mut RunLog,
) -> Result<Option<PeriodResult>, EmulationError> {
    if controller.is_parallel() {
        run_log.push(Warning::NoStagesForController { controller_key: controller.controller_key().to_string() });
        return Ok(None);
    }

    let mut stream_plans = Vec::new();
    for stream in controller.streams() {
        if config.ped_only && !stream.pv_px_mode() {
            continue;
        }
        match select_plan(plans, plan_timetables, periods, controller.controller_key(), period_id) {
            Some(plan) => stream_plans.push((stream.stream_index(), plan)),
            None => run_log.push(Warning::MissingPlanForStream {
                controller_key: controller.controller_key().to_string(),
                stream_index: stream.stream_index(),
            }),
        }
    }

    if stream_plans.is_empty() {
        run_log.push(Warning::NoStagesForController { controller_key: controller.controller_key().to_string() });
        return Ok(None);
    }

    let plan_cycle_time = stream_plans[0].1.cycle_time();
    let cycle_time = harmonize_cycle_time(observations, controller.controller_key(), period_id, plan_cycle_time);

    if is_verbose_level(VerboseLevel::Main) {
        crate::log_main!(
            crate::verbose::EVENT_DRIVER_PERIOD,
            "driving controller for period",
            controller_key = controller.controller_key().to_string(),
            period_id = period_id.to_string(),
            cycle_time = cycle_time
        );
    }

    let mut signal_plan = SignalPlan::new(controller.controller_key(), period_id, cycle_time);
    let mut phase_timings = Vec::new();

    for (stream_index, plan) in &stream_plans {
        let mut sequencer_warnings = Vec::new();
        let overlay_for_sequencer = ModificationOverlay::new();
        let sequence = build_stage_sequence(
            controller,
            &overlay_for_sequencer,
            *stream_index,
            controller.controller_key(),
            plan,
            observations,
            cycle_time,
            period_id,
            config,
            &mut sequencer_warnings,
        );
        for w in sequencer_warnings {
            run_log.push(w);
        }

        if sequence.is_empty() {
            if is_verbose_level(VerboseLevel::Additional) {
                crate::log_additional!(
                    crate::verbose::EVENT_DRIVER_SKIP_STREAM,
                    "stream produced an empty stage sequence, skipped",
                    controller_key = controller.controller_key().to_string(),
                    stream_index = *stream_index
                );
            }
            continue;
        }

        let mut overlay = ModificationOverlay::new();
        let stream = compute_signal_plan_stream(
            controller,
            &overlay,
            observations,
            controller.controller_key(),
            period_id,
            *stream_index,
            cycle_time,
            &sequence,
        )?;

        let timings = project_phase_timings(controller, &mut overlay, &stream)?;
        phase_timings.push((*stream_index, timings));
        signal_plan.add_stream(stream);
    }

    Ok(Some(PeriodResult { signal_plan, phase_timings }))
}

/// Drives every non-parallel controller across every registered period,
/// skipping (with a warning) any controller/period combination that
/// produces no usable stream.
pub fn drive_all(
    controllers: &Controllers,
    plans: &Plans,
    plan_timetables: &PlanTimetables,
    periods: &TimePeriods,
    observations: Option<&M37Averages>,
    config: &EmulatorConfig,
    run_log: &mut RunLog,
) -> Result<Vec<PeriodResult>, EmulationError> {
    let mut results = Vec::new();
    for controller in controllers.iter() {
        if is_verbose_level(VerboseLevel::Main) {
            crate::log_main!(
                crate::verbose::EVENT_DRIVER_CONTROLLER,
                "processing controller",
                controller_key = controller.controller_key().to_string()
            );
        }
        for period in periods.iter() {
            if let Some(result) = drive_controller_period(
                controller,
                plans,
                plan_timetables,
                periods,
                observations,
                period.name(),
                config,
                run_log,
            )? {
                results.push(result);
            }
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Phase, PhaseKind, PhaseRef, Stage, Stream, TerminationType};
    use crate::plan::PlanSequenceItem;
    use crate::time_period::TimePeriod;

    fn phase(phase_ref: &str) -> Phase {
        Phase::new(PhaseRef::new(phase_ref), PhaseKind::Traffic, TerminationType::EndOfStage, 7)
    }

    fn test_controller() -> Controller {
        let mut warnings = Vec::new();
        Controller::new("J00/004")
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
            .build(&mut warnings)
    }

    fn test_plans() -> Plans {
        let mut plans = Plans::new();
        plans.add(
            Plan::new("J00/004", 1, 80, "WAT AM")
                .with_item(PlanSequenceItem::new(0, 0).with_f_bits(vec!["F1".to_string()]))
                .with_item(PlanSequenceItem::new(1, 30).with_f_bits(vec!["F2".to_string()]))
                .with_item(PlanSequenceItem::new(2, 55).with_f_bits(vec!["F3".to_string()])),
        );
        plans
    }

    fn test_periods() -> TimePeriods {
        let mut periods = TimePeriods::new();
        periods.add(TimePeriod::new("AM", 1, "08:00:00", "09:00:00").unwrap()).unwrap();
        periods
    }

    #[test]
    fn select_plan_prefers_wat_period_name_match() {
        let plans = test_plans();
        let timetables = PlanTimetables::new();
        let periods = test_periods();
        let plan = select_plan(&plans, &timetables, &periods, "J00/004", "AM").unwrap();
        assert_eq!(plan.plan_number(), 1);
    }

    #[test]
    fn drive_controller_period_produces_a_full_cycle_signal_plan() {
        let controller = test_controller();
        let plans = test_plans();
        let timetables = PlanTimetables::new();
        let periods = test_periods();
        let config = EmulatorConfig::default();
        let mut run_log = RunLog::new();

        let result = drive_controller_period(
            &controller,
            &plans,
            &timetables,
            &periods,
            None,
            "AM",
            &config,
            &mut run_log,
        )
        .unwrap()
        .expect("controller should produce a signal plan");

        assert_eq!(result.signal_plan.cycle_time(), 80);
        assert_eq!(result.signal_plan.streams().len(), 1);
        assert_eq!(result.signal_plan.streams()[0].sum_total_length(), 80);
        assert_eq!(result.phase_timings.len(), 1);
        assert!(run_log.is_clean());
    }

    #[test]
    fn drive_controller_period_skips_parallel_stream_controllers() {
        let mut warnings = Vec::new();
        let parallel_controller = Controller::new("J00/005").with_parallel(true).build(&mut warnings);
        let plans = test_plans();
        let timetables = PlanTimetables::new();
        let periods = test_periods();
        let config = EmulatorConfig::default();
        let mut run_log = RunLog::new();

        let result = drive_controller_period(
            &parallel_controller,
            &plans,
            &timetables,
            &periods,
            None,
            "AM",
            &config,
            &mut run_log,
        )
        .unwrap();

        assert!(result.is_none());
        assert_eq!(run_log.warnings().len(), 1);
        assert!(matches!(run_log.warnings()[0], Warning::NoStagesForController { .. }));
    }
}
