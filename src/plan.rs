//! Plan Model: an ordered, cyclic sequence of pulse-time commands per
//! (site, plan_number), plus the PJA timetable used for plan selection.

use indexmap::IndexMap;

/// One entry in a [`Plan`]'s sequence: a pulse-time offset and the bits
/// that declare which stages it commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSequenceItem {
    index: usize,
    pulse_time: i64,
    f_bits: Vec<String>,
    p_bits: Vec<String>,
    d_bits: Vec<String>,
    nto: bool,
}

impl PlanSequenceItem {
    pub fn new(index: usize, pulse_time: i64) -> Self {
        Self { index, pulse_time, f_bits: Vec::new(), p_bits: Vec::new(), d_bits: Vec::new(), nto: false }
    }

    pub fn with_f_bits(mut self, f_bits: Vec<String>) -> Self {
        self.f_bits = f_bits;
        self
    }

    pub fn with_p_bits(mut self, p_bits: Vec<String>) -> Self {
        self.p_bits = p_bits;
        self
    }

    pub fn with_d_bits(mut self, d_bits: Vec<String>) -> Self {
        self.d_bits = d_bits;
        self
    }

    pub fn with_nto(mut self, nto: bool) -> Self {
        self.nto = nto;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pulse_time(&self) -> i64 {
        self.pulse_time
    }

    pub fn f_bits(&self) -> &[String] {
        &self.f_bits
    }

    pub fn p_bits(&self) -> &[String] {
        &self.p_bits
    }

    pub fn d_bits(&self) -> &[String] {
        &self.d_bits
    }

    pub fn nto(&self) -> bool {
        self.nto
    }

    pub fn has_no_stage_bits(&self) -> bool {
        self.f_bits.is_empty() && self.p_bits.is_empty()
    }

    /// Integer stage numbers commanded by this item: `F3 -> 3`, `PV -> 1`,
    /// `PX -> 2`; an item with neither F- nor P-bits commands stage 2 (the
    /// legacy default).
    pub fn commanded_stage_numbers(&self) -> Vec<i64> {
        let mut stages: Vec<i64> = self
            .f_bits
            .iter()
            .filter_map(|bit| bit.strip_prefix('F').and_then(|n| n.parse().ok()))
            .collect();
        stages.extend(self.p_bits.iter().filter_map(|bit| match bit.as_str() {
            "PV" => Some(1),
            "PX" => Some(2),
            _ => None,
        }));
        if self.has_no_stage_bits() {
            stages.push(2);
        }
        stages
    }
}

/// `(site, plan_number)` with cycle_time, name, and an ordered, cyclic
/// list of [`PlanSequenceItem`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    site_id: String,
    plan_number: i64,
    cycle_time: i64,
    name: String,
    items: Vec<PlanSequenceItem>,
}

impl Plan {
    pub fn new(site_id: impl Into<String>, plan_number: i64, cycle_time: i64, name: impl Into<String>) -> Self {
        Self { site_id: site_id.into(), plan_number, cycle_time, name: name.into(), items: Vec::new() }
    }

    pub fn with_item(mut self, item: PlanSequenceItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn plan_number(&self) -> i64 {
        self.plan_number
    }

    pub fn cycle_time(&self) -> i64 {
        self.cycle_time
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn items(&self) -> &[PlanSequenceItem] {
        &self.items
    }

    /// A plan is valid iff any item declares F- or P-bits.
    pub fn is_valid(&self) -> bool {
        self.items.iter().any(|i| !i.has_no_stage_bits())
    }

    /// Plans whose name contains "MINS" are a fallback minimums plan;
    /// plan selection prefers non-MINS plans.
    pub fn is_mins_fallback(&self) -> bool {
        self.name.contains("MINS")
    }
}

/// An insertion-ordered collection of [`Plan`]s keyed `(site_id, plan_number)`.
#[derive(Debug, Clone, Default)]
pub struct Plans {
    data: IndexMap<(String, i64), Plan>,
}

impl Plans {
    pub fn new() -> Self {
        Self { data: IndexMap::new() }
    }

    pub fn add(&mut self, plan: Plan) {
        self.data.insert((plan.site_id().to_string(), plan.plan_number()), plan);
    }

    pub fn get(&self, site_id: &str, plan_number: i64) -> Option<&Plan> {
        self.data.get(&(site_id.to_string(), plan_number))
    }

    pub fn for_site(&self, site_id: &str) -> Vec<&Plan> {
        self.data.values().filter(|p| p.site_id() == site_id).collect()
    }
}

/// `(site, period) -> preferred plan_number`, used only for plan
/// selection (§4.4 step 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTimetable {
    site_number: String,
    period: String,
    wat: String,
    control: String,
}

impl PlanTimetable {
    pub fn new(site_number: impl Into<String>, period: impl Into<String>, wat: impl Into<String>, control: impl Into<String>) -> Self {
        Self { site_number: site_number.into(), period: period.into(), wat: wat.into(), control: control.into() }
    }

    pub fn site_number(&self) -> &str {
        &self.site_number
    }

    pub fn period(&self) -> &str {
        &self.period
    }

    /// Only the integer after a leading `SC` prefix is used as a plan number.
    pub fn wat_plan_number(&self) -> Option<i64> {
        self.wat.strip_prefix("SC").and_then(|n| n.parse().ok())
    }

    pub fn control_plan_number(&self) -> Option<i64> {
        self.control.strip_prefix("SC").and_then(|n| n.parse().ok())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanTimetables {
    data: IndexMap<(String, String), PlanTimetable>,
}

impl PlanTimetables {
    pub fn new() -> Self {
        Self { data: IndexMap::new() }
    }

    pub fn add(&mut self, entry: PlanTimetable) {
        self.data.insert((entry.site_number().to_string(), entry.period().to_string()), entry);
    }

    pub fn get(&self, site_number: &str, period: &str) -> Option<&PlanTimetable> {
        self.data.get(&(site_number.to_string(), period.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commanded_stage_numbers_from_f_and_p_bits() {
        let item = PlanSequenceItem::new(0, 10).with_f_bits(vec!["F3".to_string()]);
        assert_eq!(item.commanded_stage_numbers(), vec![3]);

        let item = PlanSequenceItem::new(1, 20).with_p_bits(vec!["PV".to_string()]);
        assert_eq!(item.commanded_stage_numbers(), vec![1]);

        let item = PlanSequenceItem::new(2, 30);
        assert_eq!(item.commanded_stage_numbers(), vec![2]);
    }

    #[test]
    fn plan_validity_and_mins_fallback() {
        let empty_plan = Plan::new("J00/004", 1, 80, "WAT AM").with_item(PlanSequenceItem::new(0, 0));
        assert!(!empty_plan.is_valid());

        let valid_plan = Plan::new("J00/004", 2, 80, "AM MINS")
            .with_item(PlanSequenceItem::new(0, 0).with_f_bits(vec!["F1".to_string()]));
        assert!(valid_plan.is_valid());
        assert!(valid_plan.is_mins_fallback());
    }

    #[test]
    fn wat_plan_number_parses_sc_prefix() {
        let timetable = PlanTimetable::new("J00/004", "AM", "SC03", "SC04");
        assert_eq!(timetable.wat_plan_number(), Some(3));
        assert_eq!(timetable.control_plan_number(), Some(4));

        let no_sc = PlanTimetable::new("J00/004", "AM", "FIX", "FIX");
        assert_eq!(no_sc.wat_plan_number(), None);
    }
}
