//! Conversation phases.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle stage of a conversation, as declared by the server.
///
/// Nominal order: intent → context → proposing → generation/generating →
/// viewing, with refinement reachable from viewing and complete from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Intent,
    Context,
    Proposing,
    Generation,
    Generating,
    Viewing,
    Refinement,
    Complete,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Intent,
        Phase::Context,
        Phase::Proposing,
        Phase::Generation,
        Phase::Generating,
        Phase::Viewing,
        Phase::Refinement,
        Phase::Complete,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::Context => "context",
            Self::Proposing => "proposing",
            Self::Generation => "generation",
            Self::Generating => "generating",
            Self::Viewing => "viewing",
            Self::Refinement => "refinement",
            Self::Complete => "complete",
        }
    }

    /// Position in the nominal flow. `generation`/`generating` share a rank,
    /// as do `viewing`/`refinement`.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::Intent => 0,
            Self::Context => 1,
            Self::Proposing => 2,
            Self::Generation | Self::Generating => 3,
            Self::Viewing | Self::Refinement => 4,
            Self::Complete => 5,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        *self == Self::Complete
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown phase: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>(), Ok(phase));
        }
        assert_eq!(" Viewing ".parse::<Phase>(), Ok(Phase::Viewing));
        assert!("drafting".parse::<Phase>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Generating).unwrap(), "\"generating\"");
        let phase: Phase = serde_json::from_str("\"refinement\"").unwrap();
        assert_eq!(phase, Phase::Refinement);
    }

    #[test]
    fn test_rank_order() {
        assert!(Phase::Intent.rank() < Phase::Context.rank());
        assert_eq!(Phase::Generation.rank(), Phase::Generating.rank());
        assert_eq!(Phase::Viewing.rank(), Phase::Refinement.rank());
        assert!(Phase::Complete.rank() > Phase::Refinement.rank());
        assert_eq!(Phase::default(), Phase::Intent);
    }
}
