//! # RepStateMachine: the frame-side referee.
//!
//! Owns the rep cycle of one device. Pose frames and range evidence from the bus
//! both land here, and the machine alone decides what counts.
//!
//! ## States
//! ```text
//!   ┌──────┐ user confirmed ┌──────────┐ extended held ≥ dwell ┌───────────┐
//!   │ Idle │───────────────►│ Readying │──────────────────────►│ GoingDown │◄─┐
//!   └──────┘                └──────────┘   (session starts)    └─────┬─────┘  │
//!      ▲                                                            │        │
//!      │ user lost / timer expired                   elbow ≤ bottom │        │ rep counted,
//!      │ (from any state, session ends once)          or bad posture▼        │ rejected, or
//!      └───────────────────────────────────────────────────────┌─────────┐   │ bad posture
//!                                                              │ GoingUp │───┘ before top
//!                                                              └─────────┘
//! ```
//!
//! ## Resolution
//! - top reached + untainted + elbow > extended → **rep**: reps += 1, attempts += 1
//! - top reached + tainted                      → **rejected**: attempts += 1
//! - top reached + elbow not yet extended       → waits for a later frame
//!
//! Every transition into `GoingDown` or `GoingUp` publishes the new direction so
//! the range loop can follow.
//!
//! ## Rules
//! - The machine is synchronous: callers pass the current [`Instant`] in.
//! - Missing angles are "no evidence" and never change state.
//! - An attempt is tainted at most once; only the first taint snapshots.
//! - A session ends exactly once, whatever races to end it.

use std::time::{Instant, SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actuators::Feedback;
use crate::config::{Config, FlipPolicy};
use crate::events::{Direction, Event, PostureSignal, StatusMessage};
use crate::sensors::{AngleSample, Frame};

use super::attempt::{Attempt, FormIssue};
use super::stats::{
    EndReason, FlaggedAttempt, SessionRecord, SessionReport, SessionStats, unix_ms,
};
use super::timer::{SessionTimer, TimerPoll};

/// Externally visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepState {
    Idle,
    Readying,
    GoingDown,
    GoingUp,
}

impl RepState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepState::Idle => "idle",
            RepState::Readying => "readying",
            RepState::GoingDown => "going_down",
            RepState::GoingUp => "going_up",
        }
    }
}

/// Side effects requested by the machine, in the order they must happen.
#[derive(Debug, Clone)]
pub enum Output {
    /// Publish on the bus.
    Publish(Event),
    /// Hand to the actuators.
    Feedback(Feedback),
    /// First taint of an attempt.
    Snapshot(FlaggedAttempt),
    /// The session is over; persist it.
    SessionEnded(SessionReport),
}

/// Debounced user presence.
#[derive(Debug, Clone, Default)]
struct Presence {
    reported: Option<bool>,
    present_streak: u32,
    absent_streak: u32,
}

impl Presence {
    /// Returns the new reported presence when it changes.
    fn observe(&mut self, present: bool, need_present: u32, need_absent: u32) -> Option<bool> {
        if present {
            self.present_streak += 1;
            self.absent_streak = 0;
        } else {
            self.absent_streak += 1;
            self.present_streak = 0;
        }
        let next = if self.present_streak >= need_present.max(1) {
            true
        } else if self.absent_streak >= need_absent.max(1) {
            false
        } else {
            return None;
        };
        if self.reported == Some(next) {
            return None;
        }
        self.reported = Some(next);
        Some(next)
    }

    fn confirmed(&self) -> bool {
        self.reported == Some(true)
    }
}

#[derive(Debug, Clone)]
struct ActiveSession {
    id: Uuid,
    direction: Direction,
    attempt: Attempt,
    reps: u32,
    attempts: u32,
    flagged: Vec<FlaggedAttempt>,
    last_tick: Option<u64>,
}

impl ActiveSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            direction: Direction::Down,
            attempt: Attempt::new(1),
            reps: 0,
            attempts: 0,
            flagged: Vec::new(),
            last_tick: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Readying { held_since: Option<Instant> },
    Active(ActiveSession),
}

/// Frame-side state machine. See the module docs for the transition rules.
#[derive(Debug, Clone)]
pub struct RepStateMachine {
    cfg: Config,
    phase: Phase,
    presence: Presence,
    last: AngleSample,
    timer: SessionTimer,
}

impl RepStateMachine {
    pub fn new(cfg: &Config) -> Self {
        Self {
            cfg: cfg.clone(),
            phase: Phase::Idle,
            presence: Presence::default(),
            last: AngleSample::default(),
            timer: SessionTimer::new(cfg.session_duration),
        }
    }

    pub fn state(&self) -> RepState {
        match &self.phase {
            Phase::Idle => RepState::Idle,
            Phase::Readying { .. } => RepState::Readying,
            Phase::Active(s) => match s.direction {
                Direction::Down => RepState::GoingDown,
                Direction::Up => RepState::GoingUp,
            },
        }
    }

    /// Counted reps of the running session (0 when idle).
    pub fn rep_count(&self) -> u32 {
        self.active().map(|s| s.reps).unwrap_or(0)
    }

    /// Resolved attempts of the running session (0 when idle).
    pub fn attempt_count(&self) -> u32 {
        self.active().map(|s| s.attempts).unwrap_or(0)
    }

    /// Attempt in progress, if a session runs.
    pub fn current_attempt(&self) -> Option<&Attempt> {
        self.active().map(|s| &s.attempt)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.active().map(|s| s.id)
    }

    /// Last known value of each angle.
    pub fn last_angles(&self) -> AngleSample {
        self.last
    }

    /// True while a session runs.
    pub fn in_session(&self) -> bool {
        self.active().is_some()
    }

    fn active(&self) -> Option<&ActiveSession> {
        match &self.phase {
            Phase::Active(s) => Some(s),
            _ => None,
        }
    }

    /// Feeds one pose frame.
    pub fn on_frame(&mut self, now: Instant, frame: &Frame) -> Vec<Output> {
        let mut out = Vec::new();
        match self.presence.observe(
            frame.user_present,
            self.cfg.presence_frames,
            self.cfg.absence_frames,
        ) {
            Some(true) => {
                info!("user detected");
                out.push(Output::Publish(Event::status(StatusMessage::UserDetected)));
                out.push(Output::Feedback(Feedback::UserDetected));
            }
            Some(false) => {
                info!("user lost");
                out.push(Output::Publish(Event::status(StatusMessage::NoUser)));
                out.push(Output::Feedback(Feedback::NoUser));
                self.end_session(EndReason::UserLost, &mut out);
                return out;
            }
            None => {}
        }

        self.poll_timer_into(now, &mut out);
        if !self.presence.confirmed() || !frame.user_present {
            return out;
        }
        self.last.merge(&frame.angles);

        if matches!(self.phase, Phase::Idle) {
            debug!("waiting for ready posture");
            self.phase = Phase::Readying { held_since: None };
        }
        if self.in_session() {
            self.step_active(&frame.angles, &mut out);
        } else {
            self.step_readying(now, &frame.angles, &mut out);
        }
        out
    }

    /// Feeds one range-side evidence signal from the bus.
    pub fn on_posture(&mut self, now: Instant, signal: PostureSignal) -> Vec<Output> {
        let mut out = Vec::new();
        self.poll_timer_into(now, &mut out);
        let Phase::Active(s) = &mut self.phase else {
            debug!(signal = signal.as_str(), "posture signal outside session");
            return out;
        };

        match (signal, s.direction) {
            (PostureSignal::BadPosture, Direction::Down) => {
                warn!("moved up while descending");
                self.flip(Direction::Up, &mut out);
                self.taint(FormIssue::classify(&self.last, &self.cfg), &mut out);
            }
            (PostureSignal::BadPosture, Direction::Up) => {
                if s.attempt.top_reached {
                    debug!("bad posture after top ignored");
                } else {
                    warn!("moved down while ascending");
                    self.flip(Direction::Down, &mut out);
                    self.taint(FormIssue::classify(&self.last, &self.cfg), &mut out);
                }
            }
            (PostureSignal::BottomReached, Direction::Down) => {
                s.attempt.bottom_reached = true;
                if self.elbow_bent(self.last.elbow) {
                    self.flip(Direction::Up, &mut out);
                }
            }
            (PostureSignal::TopReached, Direction::Up) => {
                s.attempt.top_reached = true;
                let elbow = self.last.elbow;
                self.try_resolve(elbow, &mut out);
            }
            (signal, direction) => {
                debug!(
                    signal = signal.as_str(),
                    direction = direction.as_str(),
                    "stale posture signal"
                );
            }
        }
        out
    }

    /// Polls the session timer without new evidence.
    pub fn poll_timer(&mut self, now: Instant) -> Vec<Output> {
        let mut out = Vec::new();
        self.poll_timer_into(now, &mut out);
        out
    }

    /// Ends the running session, if any.
    pub fn end(&mut self, reason: EndReason) -> Vec<Output> {
        let mut out = Vec::new();
        self.end_session(reason, &mut out);
        out
    }

    fn step_readying(&mut self, now: Instant, angles: &AngleSample, out: &mut Vec<Output>) {
        let extended = self.extended(angles);
        let dwell = self.cfg.ready_dwell;
        let Phase::Readying { held_since } = &mut self.phase else {
            return;
        };
        let ready = match extended {
            None => false,
            Some(false) => {
                *held_since = None;
                false
            }
            Some(true) => {
                let since = *held_since.get_or_insert(now);
                now.saturating_duration_since(since) >= dwell
            }
        };
        if ready {
            self.start_session(now, out);
        }
    }

    fn step_active(&mut self, angles: &AngleSample, out: &mut Vec<Output>) {
        if let Some(hip) = angles.hip
            && !self.cfg.hip_in_range(hip)
        {
            let issue = FormIssue::back_guard(&self.last, &self.cfg);
            if self.taint(issue, out) {
                out.push(Output::Feedback(Feedback::StraightenBack));
            }
        }

        let Phase::Active(s) = &self.phase else {
            return;
        };
        let direction = s.direction;
        match direction {
            Direction::Down => {
                let bottom_ok = match self.cfg.flip_policy {
                    FlipPolicy::FirstEvidence => true,
                    FlipPolicy::RequireBottom => s.attempt.bottom_reached,
                };
                if bottom_ok && self.elbow_bent(angles.elbow) {
                    self.flip(Direction::Up, out);
                }
            }
            Direction::Up => {
                if s.attempt.top_reached && angles.elbow.is_some() {
                    self.try_resolve(angles.elbow, out);
                }
            }
        }
    }

    /// `None` when any angle is missing.
    fn extended(&self, angles: &AngleSample) -> Option<bool> {
        let (elbow, shoulder, hip) = (angles.elbow?, angles.shoulder?, angles.hip?);
        Some(
            elbow > self.cfg.extended_elbow
                && shoulder > self.cfg.extended_shoulder
                && hip > self.cfg.extended_hip,
        )
    }

    fn elbow_bent(&self, elbow: Option<f64>) -> bool {
        elbow.is_some_and(|e| e <= self.cfg.bottom_elbow)
    }

    fn start_session(&mut self, now: Instant, out: &mut Vec<Output>) {
        let session = ActiveSession::new();
        info!(session = %session.id, "session started");
        self.timer.start(now);
        self.phase = Phase::Active(session);

        out.push(Output::Publish(Event::status(StatusMessage::UserInPosition)));
        out.push(Output::Feedback(Feedback::Ready));
        out.push(Output::Publish(Event::status(StatusMessage::Start)));
        out.push(Output::Publish(Event::direction(Direction::Down)));
        out.push(Output::Feedback(Feedback::Start));
    }

    fn flip(&mut self, dir: Direction, out: &mut Vec<Output>) {
        let Phase::Active(s) = &mut self.phase else {
            return;
        };
        s.direction = dir;
        match dir {
            Direction::Down => s.attempt.bottom_reached = false,
            Direction::Up => s.attempt.top_reached = false,
        }
        debug!(attempt = s.attempt.index, direction = dir.as_str(), "direction flipped");
        out.push(Output::Publish(Event::direction(dir)));
    }

    /// Returns `true` if this was the attempt's first taint.
    fn taint(&mut self, issue: FormIssue, out: &mut Vec<Output>) -> bool {
        let Phase::Active(s) = &mut self.phase else {
            return false;
        };
        if !s.attempt.taint(issue) {
            return false;
        }
        let flagged = FlaggedAttempt {
            attempt: s.attempt.index,
            issue,
            at_ms: unix_ms(SystemTime::now()),
        };
        warn!(attempt = flagged.attempt, issue = issue.as_str(), "attempt tainted");
        s.flagged.push(flagged.clone());
        out.push(Output::Snapshot(flagged));
        true
    }

    /// Resolves the current attempt once top has been reached.
    fn try_resolve(&mut self, elbow: Option<f64>, out: &mut Vec<Output>) {
        let extended_elbow = self.cfg.extended_elbow;
        let Phase::Active(s) = &mut self.phase else {
            return;
        };
        if s.attempt.tainted {
            s.attempts += 1;
            let issue = s.attempt.issue.unwrap_or(FormIssue::Unknown);
            warn!(
                attempt = s.attempt.index,
                issue = issue.as_str(),
                attempts = s.attempts,
                "attempt rejected"
            );
            if let Some(status) = issue.status() {
                out.push(Output::Publish(Event::status(status)));
            }
            out.push(Output::Feedback(Feedback::NoCount { issue }));
        } else if elbow.is_some_and(|e| e > extended_elbow) {
            s.reps += 1;
            s.attempts += 1;
            info!(reps = s.reps, attempts = s.attempts, "rep counted");
            out.push(Output::Publish(Event::status(StatusMessage::RepCounted)));
            out.push(Output::Feedback(Feedback::RepCounted { count: s.reps }));
        } else {
            debug!(attempt = s.attempt.index, "top reached, waiting for extension");
            return;
        }
        s.attempt = Attempt::new(s.attempt.index + 1);
        self.flip(Direction::Down, out);
    }

    fn poll_timer_into(&mut self, now: Instant, out: &mut Vec<Output>) {
        if !self.in_session() {
            return;
        }
        match self.timer.poll(now) {
            TimerPoll::Expired => {
                info!("session time is up");
                out.push(Output::Feedback(Feedback::TimesUp));
                self.end_session(EndReason::TimerExpired, out);
            }
            TimerPoll::Running { remaining } => {
                let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                if let Phase::Active(s) = &mut self.phase
                    && s.last_tick != Some(secs)
                {
                    s.last_tick = Some(secs);
                    out.push(Output::Feedback(Feedback::Tick {
                        remaining_secs: secs,
                    }));
                }
            }
            TimerPoll::Idle | TimerPoll::Spent => {}
        }
    }

    fn end_session(&mut self, reason: EndReason, out: &mut Vec<Output>) {
        let previous = std::mem::replace(&mut self.phase, Phase::Idle);
        self.timer.stop();
        self.last = AngleSample::default();
        let Phase::Active(s) = previous else {
            return;
        };

        let stats = SessionStats::compute(s.reps, s.attempts, self.cfg.session_duration);
        let record = SessionRecord {
            session_id: s.id,
            timestamp: unix_ms(SystemTime::now()),
            stats,
            flagged_attempt_count: s.flagged.len() as u32,
        };
        info!(
            session = %s.id,
            reason = reason.as_str(),
            reps = stats.rep_count,
            attempts = stats.attempt_count,
            success_rate = stats.success_rate,
            "session ended"
        );
        out.push(Output::Publish(Event::status(StatusMessage::End)));
        out.push(Output::Feedback(Feedback::End { reps: s.reps }));
        out.push(Output::SessionEnded(SessionReport {
            reason,
            record,
            flagged: s.flagged,
        }));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::Payload;

    const STEP: Duration = Duration::from_millis(100);

    struct Harness {
        m: RepStateMachine,
        now: Instant,
        out: Vec<Output>,
    }

    impl Harness {
        fn new(cfg: Config) -> Self {
            Self {
                m: RepStateMachine::new(&cfg),
                now: Instant::now(),
                out: Vec::new(),
            }
        }

        fn frame(&mut self, frame: Frame) {
            self.now += STEP;
            let out = self.m.on_frame(self.now, &frame);
            self.check_counts();
            self.out.extend(out);
        }

        fn elbows(&mut self, elbows: &[f64], hip: f64) {
            for e in elbows {
                self.frame(Frame::with_user(*e, 60.0, hip));
            }
        }

        fn signal(&mut self, signal: PostureSignal) {
            let out = self.m.on_posture(self.now, signal);
            self.check_counts();
            self.out.extend(out);
        }

        /// Present, extended frames until the session starts.
        fn start(&mut self) {
            for _ in 0..40 {
                self.frame(Frame::with_user(170.0, 60.0, 150.0));
                if self.m.in_session() {
                    return;
                }
            }
            panic!("session did not start");
        }

        fn check_counts(&self) {
            assert!(self.m.rep_count() <= self.m.attempt_count());
        }

        fn take(&mut self) -> Vec<Output> {
            std::mem::take(&mut self.out)
        }

        fn statuses(out: &[Output]) -> Vec<StatusMessage> {
            out.iter()
                .filter_map(|o| match o {
                    Output::Publish(ev) => match ev.payload {
                        Payload::Status(s) => Some(s),
                        _ => None,
                    },
                    _ => None,
                })
                .collect()
        }

        fn directions(out: &[Output]) -> Vec<Direction> {
            out.iter()
                .filter_map(|o| match o {
                    Output::Publish(ev) => match ev.payload {
                        Payload::Direction(d) => Some(d),
                        _ => None,
                    },
                    _ => None,
                })
                .collect()
        }

        fn feedback(out: &[Output]) -> Vec<Feedback> {
            out.iter()
                .filter_map(|o| match o {
                    Output::Feedback(f) => Some(*f),
                    _ => None,
                })
                .collect()
        }

        fn reports(out: &[Output]) -> Vec<&SessionReport> {
            out.iter()
                .filter_map(|o| match o {
                    Output::SessionEnded(r) => Some(r),
                    _ => None,
                })
                .collect()
        }

        fn snapshots(out: &[Output]) -> Vec<&FlaggedAttempt> {
            out.iter()
                .filter_map(|o| match o {
                    Output::Snapshot(f) => Some(f),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_presence_is_debounced() {
        let mut h = Harness::new(Config::default());
        h.frame(Frame::with_user(170.0, 60.0, 150.0));
        h.frame(Frame::with_user(170.0, 60.0, 150.0));
        assert_eq!(h.m.state(), RepState::Idle);
        assert!(h.take().is_empty());

        h.frame(Frame::with_user(170.0, 60.0, 150.0));
        let out = h.take();
        assert_eq!(Harness::statuses(&out), vec![StatusMessage::UserDetected]);
        assert!(Harness::feedback(&out).contains(&Feedback::UserDetected));
        assert_eq!(h.m.state(), RepState::Readying);

        // a single dropout is not a loss
        h.frame(Frame::empty());
        h.frame(Frame::with_user(170.0, 60.0, 150.0));
        assert!(Harness::statuses(&h.take()).is_empty());
    }

    #[test]
    fn test_session_starts_after_dwell() {
        let mut h = Harness::new(Config::default());
        h.start();
        let out = h.take();
        assert_eq!(
            Harness::statuses(&out),
            vec![
                StatusMessage::UserDetected,
                StatusMessage::UserInPosition,
                StatusMessage::Start
            ]
        );
        assert_eq!(Harness::directions(&out), vec![Direction::Down]);
        assert!(Harness::feedback(&out).contains(&Feedback::Ready));
        assert_eq!(h.m.state(), RepState::GoingDown);
        assert_eq!(h.m.current_attempt().map(|a| a.index), Some(1));
        assert!(h.m.session_id().is_some());
    }

    #[test]
    fn test_broken_posture_restarts_dwell() {
        let mut h = Harness::new(Config::default());
        // 3 frames to confirm presence, dwell starts on the third
        h.elbows(&[170.0; 12], 150.0);
        h.frame(Frame::with_user(120.0, 60.0, 150.0));
        h.elbows(&[170.0; 14], 150.0);
        assert_eq!(h.m.state(), RepState::Readying);
        h.elbows(&[170.0; 2], 150.0);
        assert_eq!(h.m.state(), RepState::GoingDown);
    }

    #[test]
    fn test_missing_angles_do_not_reset_dwell() {
        let mut h = Harness::new(Config::default());
        h.elbows(&[170.0; 10], 150.0);
        for _ in 0..5 {
            h.frame(Frame {
                user_present: true,
                angles: AngleSample::default(),
            });
        }
        h.elbows(&[170.0; 3], 150.0);
        assert_eq!(h.m.state(), RepState::GoingDown);
    }

    #[test]
    fn test_clean_rep_is_counted() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.take();

        h.elbows(&[170.0, 150.0, 120.0, 85.0], 150.0);
        assert_eq!(h.m.state(), RepState::GoingUp);
        h.elbows(&[80.0, 95.0, 130.0, 150.0, 160.0], 150.0);
        assert_eq!(h.m.state(), RepState::GoingUp);
        h.signal(PostureSignal::TopReached);

        assert_eq!(h.m.rep_count(), 1);
        assert_eq!(h.m.attempt_count(), 1);
        assert_eq!(h.m.state(), RepState::GoingDown);
        assert_eq!(h.m.current_attempt().map(|a| a.index), Some(2));

        let out = h.take();
        assert_eq!(Harness::statuses(&out), vec![StatusMessage::RepCounted]);
        assert_eq!(
            Harness::directions(&out),
            vec![Direction::Up, Direction::Down]
        );
        assert!(Harness::feedback(&out).contains(&Feedback::RepCounted { count: 1 }));

        let out = h.m.end(EndReason::SourceClosed);
        let reports = Harness::reports(&out);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].record.stats.success_rate, 100.0);
        assert_eq!(reports[0].record.flagged_attempt_count, 0);
    }

    #[test]
    fn test_sagging_hip_rejects_attempt() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.take();

        h.elbows(&[170.0, 150.0, 120.0, 85.0, 80.0, 95.0, 130.0, 150.0, 160.0], 140.0);
        h.signal(PostureSignal::TopReached);

        let out = h.take();
        let snaps = Harness::snapshots(&out);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].issue, FormIssue::HipAngle);
        assert_eq!(snaps[0].attempt, 1);
        assert!(Harness::feedback(&out).contains(&Feedback::StraightenBack));
        assert_eq!(Harness::statuses(&out), vec![StatusMessage::StraightenBack]);
        assert!(Harness::feedback(&out).contains(&Feedback::NoCount {
            issue: FormIssue::HipAngle
        }));

        assert_eq!(h.m.rep_count(), 0);
        assert_eq!(h.m.attempt_count(), 1);

        let out = h.m.end(EndReason::UserLost);
        let report = Harness::reports(&out)[0].clone();
        assert_eq!(report.record.stats.success_rate, 0.0);
        assert_eq!(report.record.flagged_attempt_count, 1);
        assert_eq!(report.flagged.len(), 1);
    }

    #[test]
    fn test_back_guard_without_explanation_is_back_error() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.take();
        h.elbows(&[170.0, 170.0, 170.0], 190.0);
        let out = h.take();
        let snaps = Harness::snapshots(&out);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].issue, FormIssue::BackError);
        assert_eq!(
            Harness::feedback(&out)
                .iter()
                .filter(|f| **f == Feedback::StraightenBack)
                .count(),
            1
        );
    }

    #[test]
    fn test_piked_hip_mid_descent_is_a_back_fault() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.take();
        h.frame(Frame::with_user(120.0, 60.0, 190.0));
        h.frame(Frame::with_user(85.0, 60.0, 160.0));
        h.frame(Frame::with_user(160.0, 60.0, 160.0));
        h.signal(PostureSignal::TopReached);

        let out = h.take();
        let snaps = Harness::snapshots(&out);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].issue, FormIssue::HipAndElbow);
        assert_eq!(Harness::statuses(&out), vec![StatusMessage::StraightenBack]);
        let feedback = Harness::feedback(&out);
        assert!(feedback.contains(&Feedback::StraightenBack));
        assert!(feedback.contains(&Feedback::NoCount {
            issue: FormIssue::HipAndElbow
        }));
        assert_eq!(h.m.rep_count(), 0);
        assert_eq!(h.m.attempt_count(), 1);
    }

    #[test]
    fn test_bent_elbow_flips_without_bottom_signal() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.take();
        h.elbows(&[120.0, 88.0], 160.0);
        assert_eq!(h.m.state(), RepState::GoingUp);
        // late bottom evidence is stale
        h.signal(PostureSignal::BottomReached);
        assert_eq!(Harness::directions(&h.take()), vec![Direction::Up]);
    }

    #[test]
    fn test_bottom_signal_latches_until_elbow_bends() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.take();
        h.elbows(&[120.0], 160.0);
        h.signal(PostureSignal::BottomReached);
        assert_eq!(h.m.state(), RepState::GoingDown);
        assert_eq!(h.m.current_attempt().map(|a| a.bottom_reached), Some(true));
        h.elbows(&[90.0], 160.0);
        assert_eq!(h.m.state(), RepState::GoingUp);
    }

    #[test]
    fn test_require_bottom_accepts_either_order() {
        let cfg = Config {
            flip_policy: FlipPolicy::RequireBottom,
            ..Config::default()
        };

        // elbow first
        let mut h = Harness::new(cfg.clone());
        h.start();
        h.elbows(&[120.0, 85.0, 80.0], 160.0);
        assert_eq!(h.m.state(), RepState::GoingDown);
        h.signal(PostureSignal::BottomReached);
        assert_eq!(h.m.state(), RepState::GoingUp);

        // bottom first
        let mut h = Harness::new(cfg);
        h.start();
        h.elbows(&[120.0], 160.0);
        h.signal(PostureSignal::BottomReached);
        assert_eq!(h.m.state(), RepState::GoingDown);
        h.elbows(&[85.0], 160.0);
        assert_eq!(h.m.state(), RepState::GoingUp);
    }

    #[test]
    fn test_duplicate_top_is_ignored() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.elbows(&[85.0, 160.0], 160.0);
        h.signal(PostureSignal::TopReached);
        h.signal(PostureSignal::TopReached);
        assert_eq!(h.m.rep_count(), 1);
        assert_eq!(h.m.attempt_count(), 1);
        assert_eq!(h.m.state(), RepState::GoingDown);
    }

    #[test]
    fn test_top_waits_for_extended_elbow() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.elbows(&[85.0, 120.0, 130.0], 160.0);
        h.signal(PostureSignal::TopReached);
        assert_eq!(h.m.attempt_count(), 0);
        assert_eq!(h.m.state(), RepState::GoingUp);

        h.elbows(&[140.0], 160.0);
        assert_eq!(h.m.attempt_count(), 0);
        h.elbows(&[150.0], 160.0);
        assert_eq!(h.m.rep_count(), 1);
        assert_eq!(h.m.attempt_count(), 1);
    }

    #[test]
    fn test_bad_posture_while_descending_forces_up_and_rejects() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.take();
        h.elbows(&[130.0], 160.0);
        h.signal(PostureSignal::BadPosture);
        assert_eq!(h.m.state(), RepState::GoingUp);
        assert_eq!(h.m.attempt_count(), 0);

        h.elbows(&[160.0], 160.0);
        h.signal(PostureSignal::TopReached);
        assert_eq!(h.m.rep_count(), 0);
        assert_eq!(h.m.attempt_count(), 1);

        let out = h.take();
        let snaps = Harness::snapshots(&out);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].issue, FormIssue::ElbowAngle);
        assert!(Harness::statuses(&out).contains(&StatusMessage::StraightenArms));
    }

    #[test]
    fn test_bad_posture_while_ascending_keeps_attempt_tainted() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.elbows(&[85.0, 120.0], 160.0);
        assert_eq!(h.m.state(), RepState::GoingUp);

        h.signal(PostureSignal::BadPosture);
        assert_eq!(h.m.state(), RepState::GoingDown);
        assert_eq!(h.m.attempt_count(), 0);
        assert_eq!(h.m.current_attempt().map(|a| a.index), Some(1));
        assert_eq!(h.m.current_attempt().map(|a| a.tainted), Some(true));

        h.elbows(&[85.0, 160.0], 160.0);
        h.signal(PostureSignal::TopReached);
        assert_eq!(h.m.rep_count(), 0);
        assert_eq!(h.m.attempt_count(), 1);
        assert_eq!(h.m.current_attempt().map(|a| a.index), Some(2));
    }

    #[test]
    fn test_bad_posture_after_top_is_ignored() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.elbows(&[85.0, 130.0], 160.0);
        h.signal(PostureSignal::TopReached);
        h.signal(PostureSignal::BadPosture);
        assert_eq!(h.m.state(), RepState::GoingUp);
        h.elbows(&[155.0], 160.0);
        assert_eq!(h.m.rep_count(), 1);
    }

    #[test]
    fn test_undefined_angles_change_nothing() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.take();
        for _ in 0..5 {
            h.frame(Frame {
                user_present: true,
                angles: AngleSample {
                    elbow: None,
                    shoulder: Some(60.0),
                    hip: None,
                },
            });
        }
        assert_eq!(h.m.state(), RepState::GoingDown);
        assert!(Harness::snapshots(&h.take()).is_empty());
    }

    #[test]
    fn test_posture_outside_session_is_ignored() {
        let mut h = Harness::new(Config::default());
        h.signal(PostureSignal::BottomReached);
        h.signal(PostureSignal::TopReached);
        assert_eq!(h.m.state(), RepState::Idle);
        assert!(h.take().is_empty());
    }

    #[test]
    fn test_timer_expiry_ends_session_once() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.elbows(&[85.0, 160.0], 160.0);
        h.signal(PostureSignal::TopReached);
        h.take();

        let late = h.now + Duration::from_secs(61);
        let mut reports = 0;
        for i in 0..10 {
            let out = h.m.poll_timer(late + STEP * i);
            reports += Harness::reports(&out).len();
            if i == 0 {
                assert!(Harness::feedback(&out).contains(&Feedback::TimesUp));
                assert_eq!(Harness::statuses(&out), vec![StatusMessage::End]);
            }
        }
        assert_eq!(reports, 1);
        assert_eq!(h.m.state(), RepState::Idle);

        // presence loss racing behind the timer finds nothing to end
        for _ in 0..3 {
            h.frame(Frame::empty());
        }
        assert!(Harness::reports(&h.take()).is_empty());
    }

    #[test]
    fn test_presence_loss_ends_session_once() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.take();
        for _ in 0..5 {
            h.frame(Frame::empty());
        }
        let out = h.take();
        assert_eq!(
            Harness::statuses(&out),
            vec![StatusMessage::NoUser, StatusMessage::End]
        );
        let reports = Harness::reports(&out);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].reason, EndReason::UserLost);
        assert_eq!(reports[0].record.stats.duration, Duration::from_secs(60));

        let out = h.m.poll_timer(h.now + Duration::from_secs(120));
        assert!(out.is_empty());
        assert!(h.m.end(EndReason::TimerExpired).is_empty());
    }

    #[test]
    fn test_loss_before_start_produces_no_record() {
        let mut h = Harness::new(Config::default());
        h.elbows(&[170.0; 5], 150.0);
        assert_eq!(h.m.state(), RepState::Readying);
        for _ in 0..3 {
            h.frame(Frame::empty());
        }
        let out = h.take();
        assert!(Harness::reports(&out).is_empty());
        assert_eq!(h.m.state(), RepState::Idle);
    }

    #[test]
    fn test_tick_feedback_once_per_second() {
        let mut h = Harness::new(Config::default());
        h.start();
        h.take();
        let t0 = h.now;
        let ticks: Vec<_> = (1..=25)
            .flat_map(|i| h.m.poll_timer(t0 + STEP * i))
            .filter_map(|o| match o {
                Output::Feedback(Feedback::Tick { remaining_secs }) => Some(remaining_secs),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![60, 59, 58]);
    }

    #[test]
    fn test_many_reps_keep_counts_ordered() {
        let mut h = Harness::new(Config::default());
        h.start();
        for i in 0..6 {
            let hip = if i % 3 == 0 { 140.0 } else { 160.0 };
            h.elbows(&[120.0, 85.0, 120.0, 160.0], hip);
            h.signal(PostureSignal::TopReached);
        }
        assert_eq!(h.m.attempt_count(), 6);
        assert_eq!(h.m.rep_count(), 4);
    }
}
