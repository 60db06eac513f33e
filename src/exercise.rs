use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Exercises the analysis service knows how to track.
///
/// The wire name is the lowercase variant name. Kinds outside this set are
/// rejected by the remote side, not locally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Squat,
    Pushup,
    Plank,
    Lunge,
}

impl Default for ExerciseKind {
    fn default() -> Self {
        ExerciseKind::Squat
    }
}

impl ExerciseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::Squat => "squat",
            ExerciseKind::Pushup => "pushup",
            ExerciseKind::Plank => "plank",
            ExerciseKind::Lunge => "lunge",
        }
    }

    /// Fixed per-exercise calorie estimate used for the end-of-session record.
    pub fn calories_per_rep(&self) -> u32 {
        match self {
            ExerciseKind::Squat => 8,
            ExerciseKind::Pushup => 6,
            _ => 5,
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "squat" => Ok(ExerciseKind::Squat),
            "pushup" => Ok(ExerciseKind::Pushup),
            "plank" => Ok(ExerciseKind::Plank),
            "lunge" => Ok(ExerciseKind::Lunge),
            other => Err(anyhow::anyhow!("unknown exercise kind: {other}")),
        }
    }
}
