use serde::{Deserialize, Serialize};

use crate::exercise::ExerciseKind;

/// Outbound messages on the analysis channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One captured still, as a `data:image/jpeg;base64,` URI.
    Frame {
        image: String,
        exercise: ExerciseKind,
    },
    /// Ask the remote side to restart its rep counting.
    Reset,
    ChangeExercise { exercise: ExerciseKind },
}

/// Inbound messages from the analysis service.
///
/// The service either sends a typed event or a bare `{"error": ...}` object;
/// anything that matches neither is treated as malformed and ignored by the
/// reader, never as fatal.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServerMessage {
    Event(ServerEvent),
    Error(ServerError),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Analysis(AnalysisPayload),
    /// Acknowledgement after a `change_exercise`; informational only.
    ExerciseChanged { exercise: String },
    /// Acknowledgement after a `reset`; informational only.
    ResetComplete,
}

/// Analysis results for the most recent frame. Missing numeric fields read
/// as 0 and missing feedback as empty; extra fields (annotated frame image,
/// movement stage) are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AnalysisPayload {
    #[serde(default)]
    pub rep_count: u32,
    #[serde(default)]
    pub form_score: u32,
    #[serde(default)]
    pub feedback: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerError {
    pub error: String,
}
