use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::exercise::ExerciseKind;

/// Floor for the estimated duration of very short sessions.
const MIN_DURATION_MINUTES: u32 = 5;
/// Rough effort estimate: ~2 minutes per completed repetition.
const MINUTES_PER_REP: u32 = 2;
/// Assumed reps per set when deriving the set count.
const REPS_PER_SET: u32 = 10;

/// One logged workout, derived once at session end and submitted to the
/// analytics backend. The controller keeps no copy after submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkoutRecord {
    /// UTC calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub exercise_type: ExerciseKind,
    pub duration_minutes: u32,
    pub calories_burned: u32,
    /// Form score mapped from 0-100 down to 0-10.
    pub intensity: u32,
    pub reps: u32,
    pub sets: u32,
}

impl WorkoutRecord {
    /// Derive the record from the session counters.
    ///
    /// Duration and calories are heuristics, not measurements: the backend
    /// only needs a plausible magnitude for its analytics charts.
    pub fn derive(exercise: ExerciseKind, rep_count: u32, form_score: u32) -> Self {
        Self {
            date: Utc::now().format("%Y-%m-%d").to_string(),
            exercise_type: exercise,
            duration_minutes: (rep_count * MINUTES_PER_REP).max(MIN_DURATION_MINUTES),
            calories_burned: rep_count * exercise.calories_per_rep(),
            intensity: intensity_from_form_score(form_score),
            reps: rep_count,
            sets: rep_count.div_ceil(REPS_PER_SET),
        }
    }
}

/// Round a 0-100 form score to the backend's 0-10 intensity scale.
fn intensity_from_form_score(form_score: u32) -> u32 {
    ((form_score + 5) / 10).min(10)
}
