//! Movement reporting with change detection and a send-rate throttle

use std::time::{Duration, Instant};

use shared::{Event, MOVEMENT_THROTTLE_MS};

/// Turns per-tick avatar positions into `movement` events.
///
/// A report goes out only when the position actually changed since the last
/// report AND the throttle window has elapsed. A stationary avatar is
/// silent no matter how much time passes; a fast-moving one reports at most
/// once per window.
pub struct MovementReporter {
    user_id: String,
    throttle: Duration,
    last_position: (f32, f32),
    last_report: Instant,
}

impl MovementReporter {
    pub fn new(user_id: impl Into<String>, start: (f32, f32)) -> Self {
        Self::with_throttle(user_id, start, Duration::from_millis(MOVEMENT_THROTTLE_MS))
    }

    pub fn with_throttle(user_id: impl Into<String>, start: (f32, f32), throttle: Duration) -> Self {
        Self {
            user_id: user_id.into(),
            throttle,
            last_position: start,
            // Backdated so the first actual move reports immediately
            last_report: Instant::now().checked_sub(throttle).unwrap_or_else(Instant::now),
        }
    }

    /// Offers the current position; returns the event to send, if any.
    pub fn report(&mut self, position: (f32, f32)) -> Option<Event> {
        let moved = position != self.last_position;
        let due = self.last_report.elapsed() >= self.throttle;
        if !moved || !due {
            return None;
        }

        self.last_position = position;
        self.last_report = Instant::now();
        Some(Event::movement(self.user_id.as_str(), position.0, position.1))
    }
}
