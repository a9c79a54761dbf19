//! JSON authoring documents for skeletons, clips and retarget tables.
//!
//! Documents refer to bones by name; parsing resolves names to indices against
//! the relevant skeleton and then runs the same validation as the programmatic
//! constructors. Transforms use glam's array layout: `translation` and `scale`
//! as `[x, y, z]`, `rotation` as `[x, y, z, w]`; any field may be omitted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::error::{AnimError, Result};
use crate::skeleton::{Bone, Skeleton};
use crate::source::{
    BoneTrack, ClipSource, MirrorAxis, MirrorTable, RetargetChannels, RetargetEntry, RetargetMap,
    TransformKey,
};
use crate::transform::Transform;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkeletonDoc {
    #[serde(default)]
    pub name: String,
    pub bones: Vec<BoneDoc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoneDoc {
    pub name: String,
    /// Parent bone name; must be declared earlier in the list.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub reference: Transform,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClipDoc {
    pub name: String,
    #[serde(default)]
    pub looping: bool,
    #[serde(default)]
    pub duration: Option<f32>,
    pub tracks: Vec<TrackDoc>,
    #[serde(default)]
    pub curves: BTreeMap<String, Curve>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackDoc {
    pub bone: String,
    pub keys: Vec<TransformKey>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RetargetDoc {
    /// Also pair same-named bones not listed in `entries`.
    #[serde(default)]
    pub match_names: bool,
    #[serde(default)]
    pub entries: Vec<RetargetEntryDoc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetargetEntryDoc {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub channels: RetargetChannels,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MirrorDoc {
    pub axis: MirrorAxis,
    /// Name affix pairs such as `["_l", "_r"]`.
    pub affixes: Vec<(String, String)>,
}

/// Parse a skeleton document and validate the hierarchy.
pub fn parse_skeleton_json(json: &str) -> Result<Skeleton> {
    let doc: SkeletonDoc = serde_json::from_str(json)?;
    skeleton_from_doc(doc)
}

pub fn skeleton_from_doc(doc: SkeletonDoc) -> Result<Skeleton> {
    let mut bones: Vec<Bone> = Vec::with_capacity(doc.bones.len());
    for (index, bone) in doc.bones.into_iter().enumerate() {
        let parent = match &bone.parent {
            None => None,
            Some(parent) => Some(
                bones
                    .iter()
                    .position(|b| &b.name == parent)
                    .ok_or_else(|| AnimError::InvalidHierarchy {
                        bone: index,
                        name: bone.name.clone(),
                        reason: format!("parent '{parent}' is not declared before this bone"),
                    })?,
            ),
        };
        bones.push(Bone::new(bone.name, parent, bone.reference));
    }
    Skeleton::build_from_bone_list(bones)
}

/// Parse a clip document, resolving bone names against `skeleton`.
///
/// Tracks naming unknown bones are skipped with a warning; a clip left with no
/// keys fails with [`AnimError::EmptyClip`].
pub fn parse_clip_json(json: &str, skeleton: &Skeleton) -> Result<ClipSource> {
    let doc: ClipDoc = serde_json::from_str(json)?;
    clip_from_doc(doc, skeleton)
}

pub fn clip_from_doc(doc: ClipDoc, skeleton: &Skeleton) -> Result<ClipSource> {
    let mut tracks = Vec::with_capacity(doc.tracks.len());
    for track in doc.tracks {
        match skeleton.find_bone_index(&track.bone) {
            Some(bone) => tracks.push(BoneTrack::new(bone, track.keys)),
            None => log::warn!(
                "clip '{}': skipping track for unknown bone '{}'",
                doc.name,
                track.bone
            ),
        }
    }

    let mut clip = ClipSource::new(doc.name, tracks)?.with_looping(doc.looping);
    if let Some(duration) = doc.duration {
        clip = clip.with_duration(duration);
    }
    for (name, curve) in doc.curves {
        clip = clip.with_curve(name, curve);
    }
    Ok(clip)
}

/// Parse a retarget document mapping `source` bone names onto `target` bone names.
pub fn parse_retarget_json(json: &str, source: &Skeleton, target: &Skeleton) -> Result<RetargetMap> {
    let doc: RetargetDoc = serde_json::from_str(json)?;
    retarget_from_doc(&doc, source, target)
}

pub fn retarget_from_doc(
    doc: &RetargetDoc,
    source: &Skeleton,
    target: &Skeleton,
) -> Result<RetargetMap> {
    let lookup = |skeleton: &Skeleton, side: &str, name: &str| {
        skeleton
            .find_bone_index(name)
            .ok_or_else(|| AnimError::InvalidCorrespondence {
                reason: format!("unknown {side} bone '{name}'"),
            })
    };

    let mut entries = Vec::with_capacity(doc.entries.len());
    for entry in &doc.entries {
        entries.push(RetargetEntry {
            source: lookup(source, "source", &entry.source)?,
            target: lookup(target, "target", &entry.target)?,
            channels: entry.channels,
        });
    }

    if doc.match_names {
        let by_name = RetargetMap::by_name(source, target);
        let extra: Vec<RetargetEntry> = by_name
            .entries()
            .filter(|auto| !entries.iter().any(|e| e.target == auto.target))
            .copied()
            .collect();
        entries.extend(extra);
    }

    if entries.is_empty() {
        log::warn!("retarget document produced no bone pairs");
    }
    RetargetMap::from_pairs(source, target, entries)
}

/// Parse a mirror document into a name-paired table for `skeleton`.
pub fn parse_mirror_json(json: &str, skeleton: &Skeleton) -> Result<MirrorTable> {
    let doc: MirrorDoc = serde_json::from_str(json)?;
    let affixes: Vec<(&str, &str)> = doc
        .affixes
        .iter()
        .map(|(l, r)| (l.as_str(), r.as_str()))
        .collect();
    Ok(MirrorTable::by_affixes(skeleton, doc.axis, &affixes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::AnimationSource;

    const SKELETON: &str = r#"{
        "name": "biped",
        "bones": [
            { "name": "root" },
            { "name": "spine", "parent": "root", "reference": { "translation": [0.0, 1.0, 0.0] } },
            { "name": "head", "parent": "spine", "reference": { "translation": [0.0, 0.5, 0.0] } }
        ]
    }"#;

    #[test]
    fn skeleton_parents_resolve_by_name() {
        let skel = parse_skeleton_json(SKELETON).unwrap();
        assert_eq!(skel.bone_count(), 3);
        assert_eq!(skel.parent(2), Some(1));
        assert_eq!(skel.reference_world()[2].translation.y, 1.5);
    }

    #[test]
    fn forward_parent_reference_is_rejected() {
        let json = r#"{ "bones": [ { "name": "a", "parent": "b" }, { "name": "b" } ] }"#;
        assert!(matches!(
            parse_skeleton_json(json),
            Err(AnimError::InvalidHierarchy { bone: 0, .. })
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(parse_skeleton_json("{"), Err(AnimError::Parse(_))));
    }

    #[test]
    fn clip_skips_unknown_bones() {
        let skel = parse_skeleton_json(SKELETON).unwrap();
        let json = r#"{
            "name": "nod",
            "looping": true,
            "tracks": [
                { "bone": "head", "keys": [ { "time": 0.0, "transform": {} }, { "time": 2.0, "transform": {} } ] },
                { "bone": "tail", "keys": [ { "time": 0.0, "transform": {} } ] }
            ],
            "curves": { "distance": [ { "time": 0.0, "value": 1.0 } ] }
        }"#;
        let clip = parse_clip_json(json, &skel).unwrap();
        assert_eq!(clip.tracks().len(), 1);
        assert_eq!(clip.tracks()[0].bone, 2);
        assert_eq!(clip.duration(), 2.0);
        assert!(clip.looping());
        assert!(clip.curve("distance").is_some());
    }

    #[test]
    fn retarget_unknown_name_is_rejected() {
        let skel = parse_skeleton_json(SKELETON).unwrap();
        let json = r#"{ "entries": [ { "source": "root", "target": "pelvis" } ] }"#;
        assert!(matches!(
            parse_retarget_json(json, &skel, &skel),
            Err(AnimError::InvalidCorrespondence { .. })
        ));
    }

    #[test]
    fn retarget_explicit_entries_win_over_name_matches() {
        let skel = parse_skeleton_json(SKELETON).unwrap();
        let json = r#"{
            "match_names": true,
            "entries": [ { "source": "spine", "target": "head", "channels": { "translation": false } } ]
        }"#;
        let map = parse_retarget_json(json, &skel, &skel).unwrap();
        assert_eq!(map.len(), 3);
        let head = map.entries().find(|e| e.target == 2).unwrap();
        assert_eq!(head.source, 1);
        assert!(!head.channels.translation);
        assert!(head.channels.rotation);
    }
}
