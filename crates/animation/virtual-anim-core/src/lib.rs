//! Virtual Animation Core (engine-agnostic)
//!
//! Runtime evaluation of skeletal poses from procedural sources. A host creates
//! a [`Session`] per animated skeleton, attaches a root [`AnimationSource`] and
//! calls [`Engine::tick`] once per frame; the session then exposes local and
//! world-space bone transforms for rendering, physics or recording.
//!
//! Layout:
//! - `transform`, `skeleton`, `pose`: bone hierarchy and pose storage
//! - `source`: clip / blend / retarget / mirror sources behind one trait
//! - `engine`, `session`: Idle → Playing → Transitioning state machine
//! - `baking`: fixed-step recording of a session into keyframe tracks
//! - `authoring`: JSON documents for skeletons, clips and retarget tables

pub mod accumulate;
pub mod authoring;
pub mod baking;
pub mod config;
pub mod curve;
pub mod engine;
pub mod error;
pub mod ids;
pub mod outputs;
pub mod pose;
pub mod pose_search;
pub mod scratch;
pub mod session;
pub mod skeleton;
pub mod source;
pub mod transform;

// Re-exports for consumers (adapters)
pub use baking::{record_session, BakedAnimation, BakedTrack, Baker, BakingConfig, PoseRecorder};
pub use config::Config;
pub use curve::{Curve, CurveKey};
pub use engine::Engine;
pub use error::{AnimError, Result};
pub use ids::{IdAllocator, SessionId};
pub use outputs::{EngineEvent, TickReport};
pub use pose::PoseBuffer;
pub use session::{EngineState, Session};
pub use skeleton::{Bone, Skeleton};
pub use source::{
    resolve_time, AnimationSource, BlendChild, BlendSource, BoneTrack, ClipSource, MirrorAxis,
    MirrorEntry, MirrorSource, MirrorTable, RetargetChannels, RetargetEntry, RetargetMap,
    RetargetSource, SharedSource, TransformKey,
};
pub use transform::Transform;
