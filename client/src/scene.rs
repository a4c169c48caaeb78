//! Capability seams for the rendering collaborator
//!
//! The sync layer never draws anything. It reads the local avatar through
//! [`Avatar`] and reports remote entity lifecycle through [`EntityObserver`];
//! what those mean on screen is the host's business. The concrete types in
//! this module are the headless stand-ins the binary runs with.

use log::debug;
use rand::Rng;

pub const AVATAR_RADIUS: f32 = 16.0;

/// The local player's avatar as the sync layer sees it.
pub trait Avatar: Send {
    fn position(&self) -> (f32, f32);
    /// Applies one movement input as a (dx, dy) displacement.
    fn apply_input(&mut self, dx: f32, dy: f32);
    /// Resolves an overlap with another body at `other`.
    fn collide_with(&mut self, other: (f32, f32));
}

/// Remote entity lifecycle notifications, driven by snapshot reconciliation.
pub trait EntityObserver: Send {
    fn entity_spawned(&mut self, user_id: &str, x: f32, y: f32);
    fn entity_moved(&mut self, user_id: &str, x: f32, y: f32);
    fn entity_despawned(&mut self, user_id: &str);
}

/// Headless avatar clamped to a square world.
pub struct LocalAvatar {
    x: f32,
    y: f32,
    bounds: f32,
}

impl LocalAvatar {
    pub fn new(x: f32, y: f32, bounds: f32) -> Self {
        Self {
            x: x.clamp(0.0, bounds),
            y: y.clamp(0.0, bounds),
            bounds,
        }
    }
}

impl Avatar for LocalAvatar {
    fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    fn apply_input(&mut self, dx: f32, dy: f32) {
        self.x = (self.x + dx).clamp(0.0, self.bounds);
        self.y = (self.y + dy).clamp(0.0, self.bounds);
    }

    fn collide_with(&mut self, other: (f32, f32)) {
        let dx = self.x - other.0;
        let dy = self.y - other.1;
        let distance = (dx * dx + dy * dy).sqrt();
        let overlap = 2.0 * AVATAR_RADIUS - distance;

        if overlap <= 0.0 {
            return;
        }
        if distance < 0.001 {
            // Same spot: the push direction is arbitrary
            self.apply_input(overlap, 0.0);
            return;
        }
        self.apply_input(dx / distance * overlap, dy / distance * overlap);
    }
}

/// Random-walk steering for the headless binary, so a lone client still
/// produces movement traffic.
pub struct Wanderer {
    heading: (f32, f32),
    speed: f32,
    bounds: f32,
}

impl Wanderer {
    pub fn new(speed: f32, bounds: f32) -> Self {
        Self {
            heading: random_heading(),
            speed,
            bounds,
        }
    }

    /// Returns the displacement for a tick of `dt` seconds, bouncing off the
    /// world edge and occasionally picking a fresh heading.
    pub fn steer(&mut self, dt: f32, position: (f32, f32)) -> (f32, f32) {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(0.02) {
            self.heading = random_heading();
        }

        if (position.0 <= 0.0 && self.heading.0 < 0.0)
            || (position.0 >= self.bounds && self.heading.0 > 0.0)
        {
            self.heading.0 = -self.heading.0;
        }
        if (position.1 <= 0.0 && self.heading.1 < 0.0)
            || (position.1 >= self.bounds && self.heading.1 > 0.0)
        {
            self.heading.1 = -self.heading.1;
        }

        (
            self.heading.0 * self.speed * dt,
            self.heading.1 * self.speed * dt,
        )
    }
}

fn random_heading() -> (f32, f32) {
    let angle = rand::thread_rng().gen_range(0.0..std::f32::consts::TAU);
    (angle.cos(), angle.sin())
}

/// Observer that just logs lifecycle events.
pub struct LoggingObserver;

impl EntityObserver for LoggingObserver {
    fn entity_spawned(&mut self, user_id: &str, x: f32, y: f32) {
        debug!("{} entered view at ({:.1}, {:.1})", user_id, x, y);
    }

    fn entity_moved(&mut self, _user_id: &str, _x: f32, _y: f32) {}

    fn entity_despawned(&mut self, user_id: &str) {
        debug!("{} left view", user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_avatar_clamps_to_world() {
        let mut avatar = LocalAvatar::new(10.0, 10.0, 100.0);

        avatar.apply_input(-500.0, 2000.0);
        assert_eq!(avatar.position(), (0.0, 100.0));

        avatar.apply_input(50.0, -30.0);
        assert_eq!(avatar.position(), (50.0, 70.0));
    }

    #[test]
    fn test_collision_pushes_apart() {
        let mut avatar = LocalAvatar::new(100.0, 100.0, 1000.0);

        avatar.collide_with((110.0, 100.0));

        let (x, y) = avatar.position();
        let distance = ((x - 110.0).powi(2) + (y - 100.0).powi(2)).sqrt();
        assert_approx_eq!(distance, 2.0 * AVATAR_RADIUS, 0.01);
    }

    #[test]
    fn test_collision_on_same_spot_still_separates() {
        let mut avatar = LocalAvatar::new(100.0, 100.0, 1000.0);

        avatar.collide_with((100.0, 100.0));

        assert_ne!(avatar.position(), (100.0, 100.0));
    }

    #[test]
    fn test_collision_far_apart_is_a_noop() {
        let mut avatar = LocalAvatar::new(100.0, 100.0, 1000.0);

        avatar.collide_with((200.0, 200.0));

        assert_eq!(avatar.position(), (100.0, 100.0));
    }

    #[test]
    fn test_wanderer_keeps_avatar_in_bounds() {
        let bounds = 200.0;
        let mut avatar = LocalAvatar::new(100.0, 100.0, bounds);
        let mut wanderer = Wanderer::new(300.0, bounds);

        for _ in 0..1000 {
            let (dx, dy) = wanderer.steer(0.05, avatar.position());
            avatar.apply_input(dx, dy);
            let (x, y) = avatar.position();
            assert!((0.0..=bounds).contains(&x));
            assert!((0.0..=bounds).contains(&y));
        }
    }

    #[test]
    fn test_wanderer_produces_movement() {
        let mut avatar = LocalAvatar::new(100.0, 100.0, 200.0);
        let mut wanderer = Wanderer::new(120.0, 200.0);

        let (dx, dy) = wanderer.steer(0.05, avatar.position());
        avatar.apply_input(dx, dy);

        assert_ne!(avatar.position(), (100.0, 100.0));
    }
}
