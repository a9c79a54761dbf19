use std::sync::Arc;

use glam::Vec3;
use virtual_anim_core::baking::export_baked_json;
use virtual_anim_core::{
    record_session, AnimationSource, Baker, BakingConfig, Bone, BoneTrack, ClipSource, Engine,
    PoseBuffer, PoseRecorder, SharedSource, Skeleton, Transform, TransformKey,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn two_bones() -> Arc<Skeleton> {
    Arc::new(
        Skeleton::build_from_bone_list(vec![
            Bone::root("root", Transform::IDENTITY),
            Bone::new("tip", Some(0), Transform::from_translation(Vec3::Y)),
        ])
        .unwrap(),
    )
}

fn ramp() -> SharedSource {
    Arc::new(
        ClipSource::new(
            "ramp",
            vec![BoneTrack::new(
                0,
                vec![
                    TransformKey::new(0.0, Transform::IDENTITY),
                    TransformKey::new(1.0, Transform::from_translation(Vec3::X)),
                ],
            )],
        )
        .unwrap(),
    )
}

#[derive(Default)]
struct Times(Vec<f32>, Vec<f32>);

impl PoseRecorder for Times {
    fn record_frame(&mut self, time: f32, _pose: &PoseBuffer, world: &[Transform]) {
        self.0.push(time);
        self.1.push(world[1].translation.x);
    }
}

/// it should record frame_rate-spaced frames inclusive of the end, first frame at dt 0
#[test]
fn record_session_steps_at_fixed_rate() {
    let mut engine = Engine::default();
    let mut session = engine.create_session(two_bones());
    engine.attach(&mut session, ramp()).unwrap();

    let cfg = BakingConfig {
        frame_rate: 4.0,
        ..Default::default()
    };
    let mut times = Times::default();
    let frames = record_session(&mut engine, &mut session, &cfg, &mut times).unwrap();
    assert_eq!(frames, 5);
    assert_eq!(times.0, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    // tip follows the root in world space
    for (t, x) in times.0.iter().zip(&times.1) {
        approx(*x, *t, 1e-5);
    }
}

/// it should bake contributed bones into a clip that plays back the same pose
#[test]
fn baker_round_trips_through_clip() {
    let skeleton = two_bones();
    let mut engine = Engine::default();
    let mut session = engine.create_session(skeleton.clone());
    engine.attach(&mut session, ramp()).unwrap();

    let cfg = BakingConfig {
        frame_rate: 10.0,
        ..Default::default()
    };
    let mut baker = Baker::new("ramp-baked", &skeleton, &cfg);
    record_session(&mut engine, &mut session, &cfg, &mut baker).unwrap();
    assert_eq!(baker.frame_count(), 11);

    let baked = baker.finish();
    assert_eq!(baked.tracks.len(), 1);
    assert_eq!(baked.tracks[0].name, "root");
    approx(baked.duration, 1.0, 1e-6);

    let clip = baked.to_clip(false).unwrap();
    let mut pose = skeleton.reference_pose();
    clip.sample(0.55, &mut pose).unwrap();
    approx(pose.locals()[0].translation.x, 0.55, 1e-4);

    let json = export_baked_json(&baked);
    assert_eq!(json["name"], "ramp-baked");
    assert_eq!(json["frame_rate"], 10.0);
    assert_eq!(json["tracks"][0]["keys"].as_array().unwrap().len(), 11);
}

/// it should honour an explicit window and fail when the session is idle
#[test]
fn record_window_and_idle_error() {
    let mut engine = Engine::default();
    let mut session = engine.create_session(two_bones());
    let mut times = Times::default();
    let cfg = BakingConfig {
        frame_rate: 2.0,
        start_time: 0.5,
        end_time: Some(1.0),
    };
    assert!(record_session(&mut engine, &mut session, &cfg, &mut times).is_err());

    engine.attach(&mut session, ramp()).unwrap();
    let frames = record_session(&mut engine, &mut session, &cfg, &mut times).unwrap();
    assert_eq!(frames, 2);
    assert_eq!(times.0, vec![0.5, 1.0]);
    approx(times.1[0], 0.5, 1e-5);
}
