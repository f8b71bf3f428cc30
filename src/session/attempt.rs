//! # Attempts and form issues.
//!
//! Every descent/ascent cycle of a session is an [`Attempt`]. An attempt may be
//! tainted at most once; the first cause wins and is kept as its [`FormIssue`].

use std::fmt;

use serde::Serialize;

use crate::config::Config;
use crate::events::StatusMessage;
use crate::sensors::AngleSample;

/// Why an attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormIssue {
    /// Hip left the straight range with no better explanation.
    BackError,
    /// Elbow stuck between bent and extended.
    ElbowAngle,
    /// Hip sagging or piking.
    HipAngle,
    /// Both elbow and hip out of shape.
    HipAndElbow,
    /// No angle explains the violation.
    Unknown,
}

impl FormIssue {
    /// Human readable cause.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormIssue::BackError => "Back error",
            FormIssue::ElbowAngle => "Elbow angle incorrect",
            FormIssue::HipAngle => "Hip angle incorrect",
            FormIssue::HipAndElbow => "Hip and elbow error",
            FormIssue::Unknown => "Unknown",
        }
    }

    /// Explains a violation from the last known angles.
    ///
    /// Elbow is at fault when it sits strictly between the bent and extended
    /// thresholds; hip is at fault when it is below the extended threshold.
    /// Missing angles never blame a joint.
    pub fn classify(angles: &AngleSample, cfg: &Config) -> FormIssue {
        let elbow_bad = angles
            .elbow
            .is_some_and(|e| e > cfg.bottom_elbow && e < cfg.extended_elbow);
        let hip_bad = angles.hip.is_some_and(|h| h < cfg.extended_hip);
        match (elbow_bad, hip_bad) {
            (true, true) => FormIssue::HipAndElbow,
            (true, false) => FormIssue::ElbowAngle,
            (false, true) => FormIssue::HipAngle,
            (false, false) => FormIssue::Unknown,
        }
    }

    /// Issue recorded when the hip leaves the straight-back range mid-attempt.
    ///
    /// A sagging hip keeps its hip classification. Any other hip fault is a back
    /// error, reported together with the elbow when that is bent too.
    pub fn back_guard(angles: &AngleSample, cfg: &Config) -> FormIssue {
        match Self::classify(angles, cfg) {
            FormIssue::HipAngle => FormIssue::HipAngle,
            FormIssue::HipAndElbow | FormIssue::ElbowAngle => FormIssue::HipAndElbow,
            FormIssue::BackError | FormIssue::Unknown => FormIssue::BackError,
        }
    }

    /// Status message published when an attempt with this issue is rejected.
    pub fn status(&self) -> Option<StatusMessage> {
        match self {
            FormIssue::ElbowAngle => Some(StatusMessage::StraightenArms),
            FormIssue::HipAngle | FormIssue::HipAndElbow | FormIssue::BackError => {
                Some(StatusMessage::StraightenBack)
            }
            FormIssue::Unknown => None,
        }
    }
}

impl fmt::Display for FormIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One descent/ascent cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// 1-based index within the session.
    pub index: u32,
    /// Set by the first violation; never cleared.
    pub tainted: bool,
    /// Cause latched with the taint.
    pub issue: Option<FormIssue>,
    /// Top evidence arrived while ascending.
    pub top_reached: bool,
    /// Bottom evidence arrived while descending.
    pub bottom_reached: bool,
}

impl Attempt {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            tainted: false,
            issue: None,
            top_reached: false,
            bottom_reached: false,
        }
    }

    /// Taints the attempt. Returns `false` if it was already tainted.
    pub fn taint(&mut self, issue: FormIssue) -> bool {
        if self.tainted {
            return false;
        }
        self.tainted = true;
        self.issue = Some(issue);
        true
    }
}
