//! Error taxonomy and the per-run warning log.
//!
//! Every component function that can fail returns a `Result` whose error
//! type is one of the enums below rather than a boxed/opaque error. Fatal
//! kinds ([`EmulationError`]) abort only the (controller, period) unit of
//! work that produced them; recoverable kinds ([`Warning`]) are recorded on
//! a [`RunLog`] and logged, and the caller continues.

use std::fmt;

/// A recoverable condition. The offending key(s) are carried verbatim so a
/// host can report them without re-deriving context from the log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    MissingPlanForStream {
        controller_key: String,
        stream_index: i64,
    },
    NoStagesForController {
        controller_key: String,
    },
    ProhibitedStageTransition {
        controller_key: String,
        end_stage: i64,
        start_stage: i64,
    },
    RepeatedStageInSequence {
        controller_key: String,
        stage_number: i64,
    },
    InvalidPhaseDelay {
        controller_key: String,
        end_stage_key: i64,
        start_stage_key: i64,
        phase_ref: String,
    },
    /// Termination type `3` is a known-but-unnamed value in the source
    /// data; it is not an error, just logged and treated as `Dummy`.
    UnnamedTerminationTypeThree {
        controller_key: String,
        phase_ref: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingPlanForStream { controller_key, stream_index } => write!(
                f,
                "no plan selected for stream {}/{}",
                controller_key, stream_index
            ),
            Warning::NoStagesForController { controller_key } => {
                write!(f, "controller {} has no usable stream/plan", controller_key)
            }
            Warning::ProhibitedStageTransition { controller_key, end_stage, start_stage } => {
                write!(
                    f,
                    "controller {} used prohibited stage move {} -> {}",
                    controller_key, end_stage, start_stage
                )
            }
            Warning::RepeatedStageInSequence { controller_key, stage_number } => write!(
                f,
                "controller {} repeated stage {} in sequence, pruned",
                controller_key, stage_number
            ),
            Warning::InvalidPhaseDelay { controller_key, end_stage_key, start_stage_key, phase_ref } => {
                write!(
                    f,
                    "controller {} phase delay for {} on transition {}->{} references a phase in neither stage, dropped",
                    controller_key, phase_ref, end_stage_key, start_stage_key
                )
            }
            Warning::UnnamedTerminationTypeThree { controller_key, phase_ref } => write!(
                f,
                "controller {} phase {} has termination type 3 (unnamed in source data), treated as Dummy",
                controller_key, phase_ref
            ),
        }
    }
}

/// A fatal condition, scoped to one (controller, period) emulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmulationError {
    InterstageReductionImpossible {
        controller_key: String,
        end_stage: i64,
        start_stage: i64,
        required: i64,
        observed: i64,
    },
    InfeasibleSchedule {
        controller_key: String,
        stage_number: i64,
        green_length: i64,
    },
    UnknownPhaseType {
        controller_key: String,
        phase_ref: String,
        phase_type: i64,
    },
    UnknownTerminationType {
        controller_key: String,
        phase_ref: String,
        term_type: i64,
    },
    /// An overlay write attempted to raise a value above what is currently
    /// visible. Surfaced rather than discarded: the post-write re-check in
    /// [`crate::resolver::reduce_to_observed`] would likely also fail, but
    /// the raise attempt itself is the actionable fact.
    OverlayWriteRejected {
        controller_key: String,
        message: String,
    },
}

impl fmt::Display for EmulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmulationError::InterstageReductionImpossible {
                controller_key, end_stage, start_stage, required, observed,
            } => write!(
                f,
                "controller {}: cannot reduce interstage {} -> {} from {} down to observed {}",
                controller_key, end_stage, start_stage, required, observed
            ),
            EmulationError::InfeasibleSchedule { controller_key, stage_number, green_length } => write!(
                f,
                "controller {}: stage {} has negative green length {} after interstage reduction",
                controller_key, stage_number, green_length
            ),
            EmulationError::UnknownPhaseType { controller_key, phase_ref, phase_type } => write!(
                f,
                "controller {}: phase {} has unrecognized phase type {}",
                controller_key, phase_ref, phase_type
            ),
            EmulationError::UnknownTerminationType { controller_key, phase_ref, term_type } => write!(
                f,
                "controller {}: phase {} has unrecognized termination type {}",
                controller_key, phase_ref, term_type
            ),
            EmulationError::OverlayWriteRejected { controller_key, message } => {
                write!(f, "controller {}: {}", controller_key, message)
            }
        }
    }
}

impl std::error::Error for EmulationError {}

/// Accumulates warnings for a single engine run so a host can inspect what
/// was skipped or pruned without scraping tracing output.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    warnings: Vec<Warning>,
}

impl RunLog {
    pub fn new() -> Self {
        Self { warnings: Vec::new() }
    }

    pub fn push(&mut self, warning: Warning) {
        crate::log_main!("warning", "recoverable condition during emulation", detail = warning.to_string());
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_log_accumulates_in_order() {
        let mut log = RunLog::new();
        assert!(log.is_clean());
        log.push(Warning::NoStagesForController { controller_key: "J00/004".to_string() });
        log.push(Warning::RepeatedStageInSequence { controller_key: "J00/004".to_string(), stage_number: 2 });
        assert_eq!(log.warnings().len(), 2);
        assert!(!log.is_clean());
    }

    #[test]
    fn display_messages_carry_offending_keys() {
        let w = Warning::ProhibitedStageTransition {
            controller_key: "J03/193".to_string(),
            end_stage: 2,
            start_stage: 4,
        };
        assert!(w.to_string().contains("J03/193"));
        assert!(w.to_string().contains("2 -> 4"));
    }
}
