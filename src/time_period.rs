//! Time-Period Registry: a small ordered set of named intervals (e.g.
//! AM/OP/PM) with start/end offsets from midnight. Every emulation runs
//! once per period.

use std::fmt;

use indexmap::IndexMap;

/// Seconds since midnight. Kept as a plain integer rather than a duration
/// type since the rest of the engine only ever adds/subtracts/mods it.
pub type TimeOfDay = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimePeriodError {
    InvalidTimeString(String),
    DuplicatePeriod(String),
}

impl fmt::Display for TimePeriodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimePeriodError::InvalidTimeString(s) => {
                write!(f, "invalid HH:MM:SS time string: '{}'", s)
            }
            TimePeriodError::DuplicatePeriod(name) => {
                write!(f, "time period '{}' already registered", name)
            }
        }
    }
}

impl std::error::Error for TimePeriodError {}

/// Parses a `HH:MM:SS` string into seconds since midnight.
pub fn time_str_to_seconds(s: &str) -> Result<TimeOfDay, TimePeriodError> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(TimePeriodError::InvalidTimeString(s.to_string()));
    }
    let hours: i64 = parts[0].parse().map_err(|_| TimePeriodError::InvalidTimeString(s.to_string()))?;
    let minutes: i64 = parts[1].parse().map_err(|_| TimePeriodError::InvalidTimeString(s.to_string()))?;
    let seconds: i64 = parts[2].parse().map_err(|_| TimePeriodError::InvalidTimeString(s.to_string()))?;
    Ok(hours * 3600 + minutes * 60 + seconds)
}

/// One named time-of-day interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePeriod {
    name: String,
    index: i64,
    start_time: TimeOfDay,
    end_time: TimeOfDay,
    long_name: Option<String>,
}

impl TimePeriod {
    pub fn new(name: impl Into<String>, index: i64, start_time_str: &str, end_time_str: &str) -> Result<Self, TimePeriodError> {
        Ok(Self {
            name: name.into(),
            index,
            start_time: time_str_to_seconds(start_time_str)?,
            end_time: time_str_to_seconds(end_time_str)?,
            long_name: None,
        })
    }

    pub fn with_long_name(mut self, long_name: impl Into<String>) -> Self {
        self.long_name = Some(long_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn start_time(&self) -> TimeOfDay {
        self.start_time
    }

    pub fn end_time(&self) -> TimeOfDay {
        self.end_time
    }

    pub fn long_name(&self) -> Option<&str> {
        self.long_name.as_deref()
    }

    pub fn total_seconds(&self) -> i64 {
        self.end_time - self.start_time
    }

    pub fn contains(&self, t: TimeOfDay) -> bool {
        self.start_time <= t && t <= self.end_time
    }
}

/// An ordered, insertion-keyed collection of [`TimePeriod`]s plus the
/// currently active one for a running emulation.
#[derive(Debug, Clone, Default)]
pub struct TimePeriods {
    data: IndexMap<String, TimePeriod>,
    active_period_id: Option<String>,
}

impl TimePeriods {
    pub fn new() -> Self {
        Self { data: IndexMap::new(), active_period_id: None }
    }

    pub fn add(&mut self, period: TimePeriod) -> Result<(), TimePeriodError> {
        if self.data.contains_key(period.name()) {
            return Err(TimePeriodError::DuplicatePeriod(period.name().to_string()));
        }
        self.data.insert(period.name().to_string(), period);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TimePeriod> {
        self.data.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimePeriod> {
        self.data.values()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn set_active_period_id(&mut self, name: Option<String>) {
        self.active_period_id = name;
    }

    pub fn active_period_id(&self) -> Option<&str> {
        self.active_period_id.as_deref()
    }

    pub fn active_period(&self) -> Option<&TimePeriod> {
        self.active_period_id.as_ref().and_then(|id| self.data.get(id))
    }

    /// Returns every period whose interval contains `t`.
    pub fn periods_for_time(&self, t: TimeOfDay) -> Vec<&TimePeriod> {
        self.data.values().filter(|p| p.contains(t)).collect()
    }

    /// Returns the name of the first period whose interval contains `t`.
    pub fn period_id_for_time(&self, t: TimeOfDay) -> Option<&str> {
        self.data.values().find(|p| p.contains(t)).map(|p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_strings() {
        assert_eq!(time_str_to_seconds("08:00:00").unwrap(), 8 * 3600);
        assert_eq!(time_str_to_seconds("00:30:15").unwrap(), 30 * 60 + 15);
        assert!(time_str_to_seconds("bad").is_err());
    }

    #[test]
    fn registers_and_looks_up_periods() {
        let mut periods = TimePeriods::new();
        periods.add(TimePeriod::new("AM", 1, "08:00:00", "09:00:00").unwrap()).unwrap();
        periods.add(TimePeriod::new("PM", 3, "16:00:00", "19:00:00").unwrap()).unwrap();

        assert_eq!(periods.len(), 2);
        assert_eq!(periods.period_id_for_time(8 * 3600 + 1800), Some("AM"));
        assert_eq!(periods.period_id_for_time(20 * 3600), None);

        periods.set_active_period_id(Some("AM".to_string()));
        assert_eq!(periods.active_period().unwrap().name(), "AM");
    }

    #[test]
    fn rejects_duplicate_period_names() {
        let mut periods = TimePeriods::new();
        periods.add(TimePeriod::new("AM", 1, "08:00:00", "09:00:00").unwrap()).unwrap();
        let err = periods.add(TimePeriod::new("AM", 2, "10:00:00", "11:00:00").unwrap()).unwrap_err();
        assert_eq!(err, TimePeriodError::DuplicatePeriod("AM".to_string()));
    }
}
