use std::sync::Arc;

use glam::Vec3;
use virtual_anim_core::{
    AnimError, Bone, BoneTrack, ClipSource, Config, Engine, EngineEvent, EngineState,
    SharedSource, Skeleton, Transform, TransformKey,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn chain3() -> Arc<Skeleton> {
    Arc::new(
        Skeleton::build_from_bone_list(vec![
            Bone::root("root", Transform::IDENTITY),
            Bone::new("spine", Some(0), Transform::from_translation(Vec3::Y)),
            Bone::new("head", Some(1), Transform::from_translation(Vec3::new(0.0, 0.5, 0.0))),
        ])
        .unwrap(),
    )
}

fn constant_root(name: &str, x: f32) -> SharedSource {
    Arc::new(
        ClipSource::new(
            name,
            vec![BoneTrack::constant(0, Transform::from_translation(Vec3::new(x, 0.0, 0.0)))],
        )
        .unwrap()
        .with_duration(10.0)
        .with_looping(true),
    )
}

fn ramp_root(name: &str, duration: f32, looping: bool) -> SharedSource {
    Arc::new(
        ClipSource::new(
            name,
            vec![BoneTrack::new(
                0,
                vec![
                    TransformKey::new(0.0, Transform::IDENTITY),
                    TransformKey::new(duration, Transform::from_translation(Vec3::X)),
                ],
            )],
        )
        .unwrap()
        .with_looping(looping),
    )
}

/// it should reproduce the reference pose for an identity clip and report weight 0.5 mid-fade
#[test]
fn three_bone_scenario() {
    let skeleton = chain3();
    let mut engine = Engine::new(Config::default());
    let mut session = engine.create_session(skeleton.clone());

    let clip_a: SharedSource = Arc::new(
        ClipSource::new("a", vec![BoneTrack::constant(0, Transform::IDENTITY)]).unwrap(),
    );
    engine.attach(&mut session, clip_a).unwrap();
    engine.tick(&mut session, 0.016).unwrap();

    for (local, reference) in session.pose().locals().iter().zip(skeleton.bones()) {
        assert!(local.abs_diff_eq(&reference.reference, 1e-6));
    }
    for (world, reference) in session.world().iter().zip(skeleton.reference_world()) {
        assert!(world.abs_diff_eq(reference, 1e-6));
    }
    approx(session.world()[2].translation.y, 1.5, 1e-6);

    engine
        .cross_fade_to(&mut session, constant_root("b", 1.0), 1.0)
        .unwrap();
    let report = engine.tick(&mut session, 0.5).unwrap();
    approx(report.transition_weight.unwrap(), 0.5, 1e-6);
    assert_eq!(report.state, EngineState::Transitioning);
}

/// it should move from the old pose to the new pose monotonically and complete at weight 1
#[test]
fn cross_fade_is_monotonic_and_completes() {
    let mut engine = Engine::default();
    let mut session = engine.create_session(chain3());
    engine
        .attach(&mut session, constant_root("from", 0.0))
        .unwrap();
    engine.tick(&mut session, 0.1).unwrap();
    engine
        .cross_fade_to(&mut session, constant_root("to", 1.0), 1.0)
        .unwrap();

    // weight 0: exactly the old pose
    let report = engine.tick(&mut session, 0.0).unwrap();
    assert_eq!(report.transition_weight, Some(0.0));
    assert_eq!(session.pose().locals()[0].translation, Vec3::ZERO);

    let mut last = 0.0;
    for step in 1..=4 {
        let report = engine.tick(&mut session, 0.25).unwrap();
        approx(report.transition_weight.unwrap(), step as f32 * 0.25, 1e-5);
        let x = session.pose().locals()[0].translation.x;
        assert!(x > last, "step {step}: {x} <= {last}");
        last = x;
    }
    approx(last, 1.0, 1e-5);
    assert_eq!(session.state(), EngineState::Playing);
    assert!(engine.last_report().has_event(|e| matches!(
        e,
        EngineEvent::TransitionCompleted { source, .. } if source == "to"
    )));
    assert_eq!(session.current_source().unwrap().name(), "to");
}

/// it should refuse a second cross-fade and leave the running one untouched
#[test]
fn second_cross_fade_is_rejected() {
    let mut engine = Engine::default();
    let mut session = engine.create_session(chain3());
    engine.attach(&mut session, constant_root("a", 0.0)).unwrap();
    engine
        .cross_fade_to(&mut session, constant_root("b", 1.0), 1.0)
        .unwrap();
    engine.tick(&mut session, 0.25).unwrap();

    let err = engine
        .cross_fade_to(&mut session, constant_root("c", 5.0), 0.5)
        .unwrap_err();
    assert!(matches!(err, AnimError::TransitionInProgress { duration, .. } if duration == 1.0));

    let report = engine.tick(&mut session, 0.25).unwrap();
    approx(report.transition_weight.unwrap(), 0.5, 1e-6);
    approx(session.pose().locals()[0].translation.x, 0.5, 1e-5);
    assert_eq!(session.current_source().unwrap().name(), "b");
}

/// it should complete a zero-length cross-fade on the next tick, keeping the incoming clock
#[test]
fn zero_duration_fade_completes_immediately() {
    let mut engine = Engine::default();
    let mut session = engine.create_session(chain3());
    engine.attach(&mut session, constant_root("a", 0.0)).unwrap();
    engine
        .cross_fade_to_at(&mut session, ramp_root("b", 2.0, false), 0.0, 0.5)
        .unwrap();
    let report = engine.tick(&mut session, 0.5).unwrap();
    assert_eq!(report.transition_weight, Some(1.0));
    assert_eq!(report.state, EngineState::Playing);
    approx(session.time().unwrap(), 1.0, 1e-6);
    approx(session.pose().locals()[0].translation.x, 0.5, 1e-5);
}

/// it should enforce the Idle → Playing → Transitioning state machine
#[test]
fn state_errors() {
    let mut engine = Engine::default();
    let mut session = engine.create_session(chain3());
    assert_eq!(session.state(), EngineState::Idle);

    assert!(matches!(
        engine.tick(&mut session, 0.1),
        Err(AnimError::State { operation: "tick", state: "idle", .. })
    ));
    assert!(matches!(
        engine.cross_fade_to(&mut session, constant_root("b", 1.0), 1.0),
        Err(AnimError::State { .. })
    ));

    engine.attach(&mut session, constant_root("a", 0.0)).unwrap();
    assert!(matches!(
        engine.attach(&mut session, constant_root("b", 0.0)),
        Err(AnimError::State { state: "playing", .. })
    ));
    assert!(matches!(
        engine.cross_fade_to(&mut session, constant_root("b", 1.0), -1.0),
        Err(AnimError::InvalidParameter { .. })
    ));
    assert!(matches!(
        engine.tick(&mut session, f32::NAN),
        Err(AnimError::InvalidParameter { name: "dt", .. })
    ));

    engine
        .cross_fade_to(&mut session, constant_root("b", 1.0), 1.0)
        .unwrap();
    engine.detach(&mut session);
    assert_eq!(session.state(), EngineState::Idle);
    assert!(session.current_source().is_none());
    assert!(engine.tick(&mut session, 0.1).is_err());
    engine.attach(&mut session, constant_root("c", 0.0)).unwrap();
}

/// it should leave pose, world and clock untouched when sampling fails
#[test]
fn failed_tick_changes_nothing() {
    let mut engine = Engine::default();
    let mut session = engine.create_session(chain3());
    engine.attach(&mut session, ramp_root("ok", 1.0, false)).unwrap();
    engine.tick(&mut session, 0.5).unwrap();
    engine.detach(&mut session);

    let broken: SharedSource = Arc::new(
        ClipSource::new("broken", vec![BoneTrack::constant(7, Transform::IDENTITY)]).unwrap(),
    );
    engine.attach(&mut session, broken).unwrap();
    let pose_before = session.pose().clone();
    let world_before = session.world().to_vec();

    let err = engine.tick(&mut session, 0.25).unwrap_err();
    assert!(matches!(err, AnimError::BoneOutOfRange { bone: 7, bone_count: 3 }));
    assert_eq!(session.pose(), &pose_before);
    assert_eq!(session.world(), world_before.as_slice());
    assert_eq!(session.time(), Some(0.0));
    assert_eq!(session.state(), EngineState::Playing);
}

/// it should raise Looped for wrapping sources and ReachedEnd once for one-shots
#[test]
fn clock_events() {
    let mut engine = Engine::default();
    let mut session = engine.create_session(chain3());
    engine.attach(&mut session, ramp_root("loop", 1.0, true)).unwrap();
    assert!(engine.tick(&mut session, 0.6).unwrap().events.is_empty());
    let report = engine.tick(&mut session, 0.6).unwrap();
    assert!(matches!(
        report.events.as_slice(),
        [EngineEvent::Looped { cycles: 1, .. }]
    ));
    approx(report.source_time, 0.2, 1e-5);

    engine.detach(&mut session);
    engine.attach(&mut session, ramp_root("once", 1.0, false)).unwrap();
    let report = engine.tick(&mut session, 1.2).unwrap();
    assert!(matches!(
        report.events.as_slice(),
        [EngineEvent::ReachedEnd { time, .. }] if *time == 1.0
    ));
    assert!(engine.tick(&mut session, 0.1).unwrap().events.is_empty());
    approx(session.pose().locals()[0].translation.x, 1.0, 1e-6);
}

/// it should scale advance by the playback rate and allow playing backwards
#[test]
fn playback_rate_scales_advance() {
    let cfg = Config {
        default_playback_rate: 2.0,
        ..Config::default()
    };
    let mut engine = Engine::new(cfg);
    let mut session = engine.create_session(chain3());
    assert_eq!(session.playback_rate(), 2.0);
    engine.attach(&mut session, ramp_root("ramp", 1.0, false)).unwrap();

    let report = engine.tick(&mut session, 0.25).unwrap();
    approx(report.delta, 0.5, 1e-6);
    approx(session.pose().locals()[0].translation.x, 0.5, 1e-5);

    session.set_playback_rate(-1.0).unwrap();
    engine.tick(&mut session, 0.25).unwrap();
    approx(session.pose().locals()[0].translation.x, 0.25, 1e-5);
    assert!(session.set_playback_rate(f32::INFINITY).is_err());
}

/// it should hand out distinct session ids and share one skeleton across sessions
#[test]
fn sessions_share_skeleton() {
    let skeleton = chain3();
    let mut engine = Engine::default();
    let a = engine.create_session(skeleton.clone());
    let b = engine.create_session(skeleton.clone());
    assert_ne!(a.id(), b.id());
    assert!(Arc::ptr_eq(a.skeleton(), b.skeleton()));
    assert_eq!(a.pose().len(), 3);
}

/// it should fade a bone only the incoming source drives from its reference instead of snapping
#[test]
fn cross_fade_eases_bones_only_the_incoming_source_drives() {
    let skeleton = chain3();
    let mut engine = Engine::default();
    let mut session = engine.create_session(skeleton.clone());
    engine.attach(&mut session, constant_root("root-only", 0.0)).unwrap();
    engine.tick(&mut session, 0.1).unwrap();

    let head_only: SharedSource = Arc::new(
        ClipSource::new(
            "head-only",
            vec![BoneTrack::constant(2, Transform::from_translation(Vec3::new(10.0, 0.0, 0.0)))],
        )
        .unwrap()
        .with_duration(10.0)
        .with_looping(true),
    );
    engine.cross_fade_to(&mut session, head_only, 1.0).unwrap();

    let report = engine.tick(&mut session, 0.01).unwrap();
    approx(report.transition_weight.unwrap(), 0.01, 1e-6);
    let head = session.pose().locals()[2].translation;
    assert!(head.abs_diff_eq(Vec3::new(0.1, 0.495, 0.0), 1e-5), "{head}");

    engine.tick(&mut session, 0.24).unwrap();
    let head = session.pose().locals()[2].translation;
    assert!(head.abs_diff_eq(Vec3::new(2.5, 0.375, 0.0), 1e-5), "{head}");
    // the spine is driven by neither side
    assert!(!session.pose().is_contributed(1));
    assert_eq!(session.pose().locals()[1], skeleton.bones()[1].reference);

    engine.tick(&mut session, 1.0).unwrap();
    assert_eq!(session.state(), EngineState::Playing);
    assert_eq!(session.pose().locals()[2].translation, Vec3::new(10.0, 0.0, 0.0));
    assert!(!session.pose().is_contributed(0));
}

/// it should hold a one-shot clock at its end so reversing moves the pose right away
#[test]
fn one_shot_clock_clamps_at_the_end() {
    let mut engine = Engine::default();
    let mut session = engine.create_session(chain3());
    engine.attach(&mut session, ramp_root("ramp", 1.0, false)).unwrap();

    let report = engine.tick(&mut session, 5.0).unwrap();
    assert!(matches!(report.events.as_slice(), [EngineEvent::ReachedEnd { .. }]));
    assert_eq!(session.time(), Some(1.0));

    session.set_playback_rate(-1.0).unwrap();
    engine.tick(&mut session, 0.5).unwrap();
    approx(session.time().unwrap(), 0.5, 1e-6);
    approx(session.pose().locals()[0].translation.x, 0.5, 1e-6);

    engine.tick(&mut session, 3.0).unwrap();
    assert_eq!(session.time(), Some(0.0));
}

/// it should keep a looping clock wrapped so long play times keep frame precision
#[test]
fn looping_clock_stays_wrapped() {
    let mut engine = Engine::default();
    let mut session = engine.create_session(chain3());
    engine.attach(&mut session, constant_root("a", 0.0)).unwrap();
    engine
        .cross_fade_to_at(&mut session, ramp_root("loop", 1.0, true), 0.0, 86_400.0)
        .unwrap();
    assert_eq!(session.time(), Some(0.0));

    for frame in 1..=4 {
        engine.tick(&mut session, 1.0 / 60.0).unwrap();
        let expected = frame as f32 / 60.0;
        approx(session.time().unwrap(), expected, 1e-6);
        approx(session.pose().locals()[0].translation.x, expected, 1e-5);
    }

    let report = engine.tick(&mut session, 1.0).unwrap();
    assert!(matches!(report.events.as_slice(), [EngineEvent::Looped { cycles: 1, .. }]));
    approx(session.time().unwrap(), 4.0 / 60.0, 1e-5);
}
