use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Lifecycle stage of a ticket, one column on the board.
///
/// Stages are totally ordered for display (`Start < Dev < Qa < Finish`),
/// but a ticket may move between any two stages directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    Start,
    Dev,
    Qa,
    Finish,
}

impl Stage {
    /// All stages in display order
    pub const ALL: [Stage; 4] = [Stage::Start, Stage::Dev, Stage::Qa, Stage::Finish];

    /// Wire name, also used as the id of the stage's column drop target
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Dev => "DEV",
            Self::Qa => "QA",
            Self::Finish => "FINISH",
        }
    }

    /// Checks if the stage is the terminal one
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finish)
    }
}

impl FromStr for Stage {
    type Err = crate::error::StageboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "START" => Ok(Self::Start),
            "DEV" => Ok(Self::Dev),
            "QA" => Ok(Self::Qa),
            "FINISH" => Ok(Self::Finish),
            _ => Err(crate::error::StageboardError::InvalidStage(s.to_string())),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_order() {
        assert!(Stage::Start < Stage::Dev);
        assert!(Stage::Dev < Stage::Qa);
        assert!(Stage::Qa < Stage::Finish);

        let mut shuffled = vec![Stage::Finish, Stage::Start, Stage::Qa, Stage::Dev];
        shuffled.sort();
        assert_eq!(shuffled, Stage::ALL.to_vec());
    }

    #[test]
    fn test_stage_parsing() {
        assert_eq!(Stage::from_str("START").unwrap(), Stage::Start);
        assert_eq!(Stage::from_str("dev").unwrap(), Stage::Dev);
        assert_eq!(Stage::from_str(" Qa ").unwrap(), Stage::Qa);
        assert_eq!(Stage::from_str("finish").unwrap(), Stage::Finish);

        assert!(Stage::from_str("DONE").is_err());
        assert!(Stage::from_str("").is_err());
    }

    #[test]
    fn test_stage_serialization() {
        assert_eq!(serde_json::to_string(&Stage::Qa).unwrap(), "\"QA\"");

        let stage: Stage = serde_json::from_str("\"FINISH\"").unwrap();
        assert_eq!(stage, Stage::Finish);

        assert!(serde_json::from_str::<Stage>("\"finish\"").is_err());
    }
}
