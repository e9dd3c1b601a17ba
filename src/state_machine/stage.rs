use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::item::StageOutcome;

/// The five stages a case passes through.
///
/// Each case flows through: NEW → CLASSIFICATION → DATA_EXTRACTION → PROCESSING → DONE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "New")]
    New,
    #[serde(rename = "Classification")]
    Classification,
    #[serde(rename = "Data Extraction")]
    DataExtraction,
    #[serde(rename = "Processing")]
    Processing,
    #[serde(rename = "Done")]
    Done,
}

impl Stage {
    /// Fixed pipeline order.
    pub const ORDER: [Stage; 5] = [
        Stage::New,
        Stage::Classification,
        Stage::DataExtraction,
        Stage::Processing,
        Stage::Done,
    ];

    pub fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or(Self::ORDER.len() - 1)
    }

    /// The successor in the fixed order, `None` for the terminal stage.
    pub fn next(self) -> Option<Stage> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self == Stage::Done
    }

    /// Name stored in the record store's `stage` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::New => "New",
            Stage::Classification => "Classification",
            Stage::DataExtraction => "Data Extraction",
            Stage::Processing => "Processing",
            Stage::Done => "Done",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Stage::New => "Items uploaded and ready for classification",
            Stage::Classification => "AI classification of document type/content",
            Stage::DataExtraction => "Extract structured data from classified documents",
            Stage::Processing => "Final processing and business rule application",
            Stage::Done => "Completed items ready for export/usage",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stage::New => write!(f, "NEW"),
            Stage::Classification => write!(f, "CLASSIFICATION"),
            Stage::DataExtraction => write!(f, "DATA_EXTRACTION"),
            Stage::Processing => write!(f, "PROCESSING"),
            Stage::Done => write!(f, "DONE"),
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    /// Accepts the stored name ("Data Extraction") as well as
    /// snake/kebab/upper case spellings ("data_extraction", "DATA-EXTRACTION").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "new" => Ok(Stage::New),
            "classification" => Ok(Stage::Classification),
            "dataextraction" => Ok(Stage::DataExtraction),
            "processing" => Ok(Stage::Processing),
            "done" => Ok(Stage::Done),
            _ => Err(format!("unknown stage: {s}")),
        }
    }
}

/// The result of evaluating a stage transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Advance to the successor stage.
    Next(Stage),
    /// Jump straight to the terminal stage, skipping the normal order.
    ShortCircuit(Stage),
    /// Leave the item where it is; it is pulled again next cycle.
    Retain { stage: Stage, reason: String },
    /// The item is already terminal.
    Complete,
}

impl Transition {
    /// Stage to write back, if the transition moves the item.
    pub fn target(&self) -> Option<Stage> {
        match self {
            Transition::Next(stage) | Transition::ShortCircuit(stage) => Some(*stage),
            Transition::Retain { .. } | Transition::Complete => None,
        }
    }
}

/// Computes where an item goes after a processor has handled it.
pub struct StageMachine;

impl StageMachine {
    /// Compute the transition for an item that was pulled from `from`.
    ///
    /// - Success moves to the successor of `from`, or to `Done` when
    ///   `short_circuit` is set.
    /// - Failure never mutates the stage.
    /// - `Done` is terminal and always returns `Complete`.
    pub fn next(from: Stage, outcome: &StageOutcome, short_circuit: bool) -> Transition {
        let Some(successor) = from.next() else {
            return Transition::Complete;
        };
        match outcome {
            StageOutcome::Success if short_circuit => Transition::ShortCircuit(Stage::Done),
            StageOutcome::Success => Transition::Next(successor),
            StageOutcome::Failure(reason) => Transition::Retain {
                stage: from,
                reason: reason.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_all_stages() {
        let mut stage = Stage::New;
        let mut visited = vec![stage];
        while let Transition::Next(next) = StageMachine::next(stage, &StageOutcome::Success, false)
        {
            stage = next;
            visited.push(stage);
        }
        assert_eq!(visited, Stage::ORDER.to_vec());
        assert_eq!(
            StageMachine::next(Stage::Done, &StageOutcome::Success, false),
            Transition::Complete
        );
    }

    #[test]
    fn short_circuit_jumps_to_done_from_any_stage() {
        for stage in [Stage::New, Stage::Classification, Stage::DataExtraction] {
            let t = StageMachine::next(stage, &StageOutcome::Success, true);
            assert_eq!(t, Transition::ShortCircuit(Stage::Done));
            assert_eq!(t.target(), Some(Stage::Done));
        }
    }

    #[test]
    fn failure_retains_stage() {
        let t = StageMachine::next(
            Stage::New,
            &StageOutcome::Failure("store timeout".into()),
            true,
        );
        assert_eq!(
            t,
            Transition::Retain {
                stage: Stage::New,
                reason: "store timeout".into(),
            }
        );
        assert_eq!(t.target(), None);
    }

    #[test]
    fn stage_never_regresses() {
        for stage in Stage::ORDER {
            for short_circuit in [false, true] {
                if let Some(target) =
                    StageMachine::next(stage, &StageOutcome::Success, short_circuit).target()
                {
                    assert!(target > stage);
                }
            }
        }
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::New.to_string(), "NEW");
        assert_eq!(Stage::DataExtraction.to_string(), "DATA_EXTRACTION");
        assert_eq!(Stage::Done.to_string(), "DONE");
    }

    #[test]
    fn stage_parses_stored_and_cli_spellings() {
        assert_eq!("Data Extraction".parse::<Stage>(), Ok(Stage::DataExtraction));
        assert_eq!("data_extraction".parse::<Stage>(), Ok(Stage::DataExtraction));
        assert_eq!("CLASSIFICATION".parse::<Stage>(), Ok(Stage::Classification));
        assert!("archived".parse::<Stage>().is_err());
    }

    #[test]
    fn stage_serializes_to_stored_name() {
        let json = serde_json::to_string(&Stage::DataExtraction).unwrap();
        assert_eq!(json, r#""Data Extraction""#);
        let parsed: Stage = serde_json::from_str(r#""Processing""#).unwrap();
        assert_eq!(parsed, Stage::Processing);
    }
}
