//! Error types for skeleton construction, sampling and engine control.
//!
//! Every error is surfaced synchronously at the offending call. None of them
//! describe transient conditions, so nothing in the crate retries.

use thiserror::Error;

/// Errors produced by the evaluation core.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AnimError {
    /// Malformed bone list (bad parent ordering, duplicate names, bad reference data).
    #[error("invalid hierarchy at bone {bone} ('{name}'): {reason}")]
    InvalidHierarchy {
        bone: usize,
        name: String,
        reason: String,
    },

    /// A clip was built or sampled without any keyframes.
    #[error("clip '{clip}' has no keyframes")]
    EmptyClip { clip: String },

    /// Every blend weight is zero, so no normalization is possible.
    #[error("blend '{blend}' has no positive weight across {children} children")]
    DegenerateBlend { blend: String, children: usize },

    /// A cross-fade was requested while another one is still running.
    #[error("session {session} is already transitioning ({elapsed}/{duration}s)")]
    TransitionInProgress {
        session: u32,
        elapsed: f32,
        duration: f32,
    },

    /// Operation not valid in the current engine state.
    #[error("'{operation}' is not valid while session {session} is {state}")]
    State {
        session: u32,
        operation: &'static str,
        state: &'static str,
    },

    /// A pose buffer does not match the skeleton it is evaluated against.
    #[error("bone count mismatch: expected {expected}, got {actual}")]
    BoneCountMismatch { expected: usize, actual: usize },

    /// A source references a bone index the target buffer does not have.
    #[error("bone index {bone} out of range for {bone_count} bones")]
    BoneOutOfRange { bone: usize, bone_count: usize },

    /// A retarget or mirror table is inconsistent with its skeletons.
    #[error("invalid bone correspondence: {reason}")]
    InvalidCorrespondence { reason: String },

    /// A numeric argument is negative, NaN or infinite where that is not allowed.
    #[error("invalid parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    /// Authoring JSON could not be parsed.
    #[error("authoring parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for AnimError {
    fn from(err: serde_json::Error) -> Self {
        AnimError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnimError>;
