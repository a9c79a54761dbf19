//! Engine: session lifecycle, per-tick sampling and cross-fades.
//!
//! Methods:
//! - new, create_session, attach, tick, cross_fade_to (+ _at / _matching), detach
//!
//! The engine owns only scratch memory and the last tick report. Sessions are
//! owned by the host and passed in by `&mut` for each call, so several sessions
//! can share one engine and parallel hosts use one engine per worker.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{AnimError, Result};
use crate::ids::{IdAllocator, SessionId};
use crate::outputs::{EngineEvent, TickReport};
use crate::pose_search::compare_poses;
use crate::scratch::Scratch;
use crate::session::{settle_clock, Activity, Session, Transition};
use crate::skeleton::Skeleton;
use crate::source::{AnimationSource, SharedSource};

/// What a successful sample pass will commit to the session.
enum Step {
    Play {
        previous: f32,
        time: f32,
    },
    Fade {
        from_time: f32,
        previous: f32,
        to_time: f32,
        elapsed: f32,
        weight: f32,
    },
}

#[derive(Debug)]
pub struct Engine {
    cfg: Config,
    ids: IdAllocator,
    scratch: Scratch,
    report: TickReport,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Engine {
    pub fn new(cfg: Config) -> Self {
        let scratch = Scratch::new(&cfg);
        Self {
            cfg,
            ids: IdAllocator::new(),
            scratch,
            report: TickReport::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Report of the most recent successful tick.
    #[inline]
    pub fn last_report(&self) -> &TickReport {
        &self.report
    }

    /// New idle session posed at the skeleton's reference.
    pub fn create_session(&mut self, skeleton: Arc<Skeleton>) -> Session {
        let id = self.ids.alloc_session();
        log::debug!(
            "session {id}: created for {} bones",
            skeleton.bone_count()
        );
        Session::new(id, skeleton, self.cfg.default_playback_rate)
    }

    /// Start playing `root` from time 0. The session must be idle.
    pub fn attach(&mut self, session: &mut Session, root: SharedSource) -> Result<()> {
        if !matches!(session.activity, Activity::Idle) {
            return Err(state_error(session, "attach"));
        }
        log::debug!("session {}: attach '{}'", session.id, root.name());
        session.activity = Activity::Playing { root, time: 0.0 };
        Ok(())
    }

    /// Drop every source reference and return to idle. The last pose stays readable.
    pub fn detach(&mut self, session: &mut Session) {
        if !matches!(session.activity, Activity::Idle) {
            log::debug!("session {}: detach", session.id);
        }
        session.activity = Activity::Idle;
    }

    /// Advance the session by `dt * playback_rate` seconds and evaluate its pose.
    ///
    /// On error the session is left exactly as it was.
    pub fn tick(&mut self, session: &mut Session, dt: f32) -> Result<&TickReport> {
        if matches!(session.activity, Activity::Idle) {
            return Err(state_error(session, "tick"));
        }
        if !dt.is_finite() {
            return Err(AnimError::InvalidParameter {
                name: "dt",
                value: dt,
            });
        }
        let advance = dt * session.playback_rate;
        self.scratch.begin_frame(&session.skeleton);

        let step = match &session.activity {
            Activity::Idle => return Err(state_error(session, "tick")),
            Activity::Playing { root, time } => {
                let next = time + advance;
                root.sample(next, &mut self.scratch.pose)?;
                Step::Play {
                    previous: *time,
                    time: next,
                }
            }
            Activity::Transitioning(tr) => {
                let from_time = tr.from_time + advance;
                let to_time = tr.to_time + advance;
                let elapsed = tr.elapsed + advance.abs();
                let weight = tr.weight_at(elapsed);

                // Both sides start from the reference pose, so a bone only one
                // of them drives still fades instead of snapping.
                self.scratch
                    .incoming
                    .reset_to_reference(&session.skeleton);
                if weight < 1.0 {
                    tr.outgoing.sample(from_time, &mut self.scratch.pose)?;
                }
                if weight > 0.0 {
                    tr.incoming.sample(to_time, &mut self.scratch.incoming)?;
                }
                self.scratch
                    .pose
                    .fade_towards(&self.scratch.incoming, weight)?;
                Step::Fade {
                    from_time,
                    previous: tr.to_time,
                    to_time,
                    elapsed,
                    weight,
                }
            }
        };

        self.scratch
            .pose
            .compose_world_into(&session.skeleton, &mut self.scratch.world)?;

        // Everything below is infallible.
        std::mem::swap(&mut session.pose, &mut self.scratch.pose);
        std::mem::swap(&mut session.world, &mut self.scratch.world);

        let report = &mut self.report;
        report.clear();
        report.session = Some(session.id);
        report.delta = advance;

        match step {
            Step::Play { previous, time } => {
                if let Activity::Playing { root, time: clock } = &mut session.activity {
                    report.source_time = root.local_time(time);
                    clock_events(report, session.id, root.as_ref(), previous, time);
                    *clock = settle_clock(root.as_ref(), time);
                }
            }
            Step::Fade {
                from_time,
                previous,
                to_time,
                elapsed,
                weight,
            } => {
                if let Activity::Transitioning(tr) = &mut session.activity {
                    report.source_time = tr.incoming.local_time(to_time);
                    clock_events(report, session.id, tr.incoming.as_ref(), previous, to_time);
                    tr.from_time = settle_clock(tr.outgoing.as_ref(), from_time);
                    tr.to_time = settle_clock(tr.incoming.as_ref(), to_time);
                    tr.elapsed = elapsed;
                }
                report.transition_weight = Some(weight);
                if weight >= 1.0 {
                    complete_transition(session, report);
                }
            }
        }
        report.state = session.state();

        log::trace!(
            "session {}: tick dt={dt} advance={advance} time={} state={:?}",
            session.id,
            report.source_time,
            report.state
        );
        Ok(&self.report)
    }

    /// Cross-fade from the current root to `next`, starting `next` at time 0.
    pub fn cross_fade_to(
        &mut self,
        session: &mut Session,
        next: SharedSource,
        blend_duration: f32,
    ) -> Result<()> {
        self.cross_fade_to_at(session, next, blend_duration, 0.0)
    }

    /// Cross-fade from the current root to `next`, starting `next` at `start_time`.
    ///
    /// Requires a playing session; fails with [`AnimError::TransitionInProgress`]
    /// while another fade runs, leaving that fade untouched.
    pub fn cross_fade_to_at(
        &mut self,
        session: &mut Session,
        next: SharedSource,
        blend_duration: f32,
        start_time: f32,
    ) -> Result<()> {
        let (root, time) = match &session.activity {
            Activity::Playing { root, time } => (root.clone(), *time),
            Activity::Transitioning(tr) => {
                return Err(AnimError::TransitionInProgress {
                    session: session.id.0,
                    elapsed: tr.elapsed,
                    duration: tr.duration,
                })
            }
            Activity::Idle => return Err(state_error(session, "cross_fade_to")),
        };
        if !blend_duration.is_finite() || blend_duration < 0.0 {
            return Err(AnimError::InvalidParameter {
                name: "blend duration",
                value: blend_duration,
            });
        }
        if !start_time.is_finite() {
            return Err(AnimError::InvalidParameter {
                name: "start time",
                value: start_time,
            });
        }

        let to_time = settle_clock(next.as_ref(), start_time);
        log::debug!(
            "session {}: cross-fade '{}' -> '{}' over {blend_duration}s from t={to_time}",
            session.id,
            root.name(),
            next.name()
        );
        session.activity = Activity::Transitioning(Transition {
            outgoing: root,
            incoming: next,
            from_time: time,
            to_time,
            elapsed: 0.0,
            duration: blend_duration,
        });
        Ok(())
    }

    /// Cross-fade to `next`, starting it where its `curve_name` distance curve
    /// matches the current root's distance at its current time.
    ///
    /// Returns the chosen start time (0 when either side lacks the curve or nothing matches).
    pub fn cross_fade_to_matching(
        &mut self,
        session: &mut Session,
        next: SharedSource,
        blend_duration: f32,
        curve_name: &str,
    ) -> Result<f32> {
        let start_time = match &session.activity {
            Activity::Playing { root, time } => {
                match (root.curve(curve_name), next.curve(curve_name)) {
                    (Some(previous), Some(future)) => {
                        compare_poses(root.local_time(*time), previous, future).unwrap_or(0.0)
                    }
                    _ => 0.0,
                }
            }
            _ => 0.0,
        };
        self.cross_fade_to_at(session, next, blend_duration, start_time)?;
        Ok(start_time)
    }
}

fn state_error(session: &Session, operation: &'static str) -> AnimError {
    AnimError::State {
        session: session.id.0,
        operation,
        state: session.state().as_str(),
    }
}

/// Raise loop/end events for a clock that moved from `previous` to `time`.
fn clock_events(
    report: &mut TickReport,
    session: SessionId,
    source: &dyn AnimationSource,
    previous: f32,
    time: f32,
) {
    let duration = source.duration();
    if duration.is_nan() || duration <= 0.0 || previous == time {
        return;
    }
    if source.looping() {
        let cycles = (time / duration).floor() - (previous / duration).floor();
        if cycles != 0.0 {
            report.push_event(EngineEvent::Looped {
                session,
                source: source.name().to_string(),
                cycles: cycles as i32,
            });
        }
    } else {
        let reached_end = previous < duration && time >= duration;
        let reached_start = previous > 0.0 && time <= 0.0;
        if reached_end || reached_start {
            report.push_event(EngineEvent::ReachedEnd {
                session,
                source: source.name().to_string(),
                time: time.clamp(0.0, duration),
            });
        }
    }
}

fn complete_transition(session: &mut Session, report: &mut TickReport) {
    let activity = std::mem::take(&mut session.activity);
    let Activity::Transitioning(tr) = activity else {
        session.activity = activity;
        return;
    };
    log::debug!(
        "session {}: cross-fade to '{}' complete",
        session.id,
        tr.incoming.name()
    );
    report.push_event(EngineEvent::TransitionCompleted {
        session: session.id,
        source: tr.incoming.name().to_string(),
    });
    session.activity = Activity::Playing {
        root: tr.incoming,
        time: tr.to_time,
    };
}
