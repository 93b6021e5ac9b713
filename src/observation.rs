//! Observation Model: per (site, stage, period) averaged green and
//! interstage seconds with a measured cycle time, pre-aggregated upstream
//! of this crate. Optional; absence triggers fallback behavior throughout
//! the Sequencer and Stage-Length Computation.

use indexmap::IndexMap;

/// `(site, stage_id, period) -> (green_time, interstage_time, cycle_time)`.
/// `stage_id` is the M37 label (`G1..G8`, `GX`, `PG`), not a raw stage
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct M37Average {
    pub green_time: i64,
    pub interstage_time: i64,
    pub cycle_time: i64,
}

impl M37Average {
    pub fn total_time(&self) -> i64 {
        self.green_time + self.interstage_time
    }
}

/// Known M37 stage-id labels mapped to the canonical stage number within
/// a stream: `G1..G8 -> 1..8`, `GX -> 1`, `PG -> 2`.
pub fn m37_stage_label_to_number(label: &str) -> Option<i64> {
    match label {
        "G1" | "GX" => Some(1),
        "G2" | "PG" => Some(2),
        "G3" => Some(3),
        "G4" => Some(4),
        "G5" => Some(5),
        "G6" => Some(6),
        "G7" => Some(7),
        "G8" => Some(8),
        _ => None,
    }
}

/// All known M37 stage-id labels, in lookup priority order, used to probe
/// for "any observation at this site/period" without knowing the stage
/// number up front.
pub const M37_STAGE_LABELS: &[&str] = &["G1", "G2", "G3", "G4", "G5", "G6", "G7", "G8", "GX", "PG"];

#[derive(Debug, Clone, Default)]
pub struct M37Averages {
    data: IndexMap<(String, String, String), M37Average>,
}

impl M37Averages {
    pub fn new() -> Self {
        Self { data: IndexMap::new() }
    }

    pub fn add(&mut self, site_id: impl Into<String>, stage_id: impl Into<String>, period_id: impl Into<String>, average: M37Average) {
        self.data.insert((site_id.into(), stage_id.into(), period_id.into()), average);
    }

    pub fn get(&self, site_id: &str, stage_id: &str, period_id: &str) -> Option<&M37Average> {
        self.data.get(&(site_id.to_string(), stage_id.to_string(), period_id.to_string()))
    }

    pub fn exists(&self, site_id: &str, stage_id: &str, period_id: &str) -> bool {
        self.get(site_id, stage_id, period_id).is_some()
    }

    /// Cycle time from the first matching stage-label observation at this
    /// site/period, probing `M37_STAGE_LABELS` in order.
    pub fn cycle_time_for_site_period(&self, site_id: &str, period_id: &str) -> Option<i64> {
        M37_STAGE_LABELS.iter().find_map(|label| self.get(site_id, label, period_id).map(|m| m.cycle_time))
    }

    /// Stage numbers (1..8) with a non-zero observed total time at this
    /// site/period, probing the `J`-prefixed site id and falling back to
    /// the `P`-prefixed one (pedestrian-controller timing sheets use `P`).
    pub fn stage_numbers_with_observation(&self, site_id: &str, period_id: &str) -> Vec<i64> {
        let alt_site_id = if site_id.starts_with('J') {
            format!("P{}", &site_id[1..])
        } else {
            site_id.to_string()
        };
        let mut stages = Vec::new();
        for label in M37_STAGE_LABELS {
            let Some(stage_number) = m37_stage_label_to_number(label) else { continue };
            let matched = self
                .get(site_id, label, period_id)
                .filter(|m| m.total_time() > 0)
                .or_else(|| self.get(&alt_site_id, label, period_id).filter(|m| m.total_time() > 0));
            if matched.is_some() && !stages.contains(&stage_number) {
                stages.push(stage_number);
            }
        }
        stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_time_sums_green_and_interstage() {
        let m = M37Average { green_time: 30, interstage_time: 8, cycle_time: 80 };
        assert_eq!(m.total_time(), 38);
    }

    #[test]
    fn stage_label_to_number_handles_pedestrian_labels() {
        assert_eq!(m37_stage_label_to_number("G3"), Some(3));
        assert_eq!(m37_stage_label_to_number("GX"), Some(1));
        assert_eq!(m37_stage_label_to_number("PG"), Some(2));
        assert_eq!(m37_stage_label_to_number("???"), None);
    }

    #[test]
    fn stage_numbers_with_observation_filters_zero_total_time() {
        let mut averages = M37Averages::new();
        averages.add("J00/004", "G1", "AM", M37Average { green_time: 20, interstage_time: 5, cycle_time: 80 });
        averages.add("J00/004", "G2", "AM", M37Average { green_time: 0, interstage_time: 0, cycle_time: 80 });
        let stages = averages.stage_numbers_with_observation("J00/004", "AM");
        assert_eq!(stages, vec![1]);
    }

    #[test]
    fn cycle_time_probes_labels_in_order() {
        let mut averages = M37Averages::new();
        averages.add("J00/004", "G3", "AM", M37Average { green_time: 10, interstage_time: 5, cycle_time: 96 });
        assert_eq!(averages.cycle_time_for_site_period("J00/004", "AM"), Some(96));
        assert_eq!(averages.cycle_time_for_site_period("J00/005", "AM"), None);
    }
}
