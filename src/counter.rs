//! Repetition counting from per-frame joint angles.
//!
//! A rep is one full up-to-down transition of the elbow while the body stays
//! straight. The counter only ever increments on `Up -> Down`; starting a
//! session mid-pushup without an observed `Up` does not count.

/// Phase of the repetition cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Up,
    Down,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Up => "up",
            Stage::Down => "down",
        }
    }
}

/// Angle thresholds in degrees. All comparisons are strict, so the threshold
/// values themselves never trigger a transition.
#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    /// Elbow angle above which the arms count as extended.
    pub elbow_up: f32,
    /// Elbow angle below which the arms count as bent.
    pub elbow_down: f32,
    /// Hip angle above which the body counts as straight.
    pub hip_straight: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            elbow_up: 160.0,
            elbow_down: 90.0,
            hip_straight: 160.0,
        }
    }
}

/// Per-session counter state. One instance per video/camera session,
/// stepped exactly once per frame that produced a pose sample.
#[derive(Clone, Copy, Debug)]
pub struct RepCounter {
    thresholds: Thresholds,
    stage: Option<Stage>,
    count: u32,
}

impl RepCounter {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            stage: None,
            count: 0,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Consumes one angle reading. Returns `true` when this reading completed
    /// a rep (the only way `count` ever changes).
    pub fn step(&mut self, elbow_angle: f32, hip_angle: f32) -> bool {
        // No transition while the body is not extended.
        if hip_angle <= self.thresholds.hip_straight {
            return false;
        }

        if elbow_angle > self.thresholds.elbow_up {
            self.stage = Some(Stage::Up);
        } else if elbow_angle < self.thresholds.elbow_down && self.stage == Some(Stage::Up) {
            self.stage = Some(Stage::Down);
            self.count += 1;
            return true;
        }

        false
    }

    /// Discards stage and count for a fresh session.
    pub fn reset(&mut self) {
        self.stage = None;
        self.count = 0;
    }
}

impl Default for RepCounter {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}
