//! Proximity-triggered call negotiation
//!
//! Server alerts and prompts are treated as hints, not commands: every alert
//! is re-validated against the entity directory before anyone is bothered,
//! and prompts are dropped whenever either party is already on a call.
//! Accepting is two-staged: the pair is reserved on the spot, while media
//! readiness and signaling finish on a separate task.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex};

use shared::{distance_squared, within_proximity, CallPrompt, LOCAL_MEDIA_TIMEOUT_MS};

use crate::directory::EntityDirectory;
use crate::peer::{CallEndReason, CallEnded, CallTransport, MediaGate};

/// Ids currently engaged in a call. "At most one call per player" is the
/// invariant this set enforces on the local side.
#[derive(Default)]
pub struct ActiveCallSet {
    engaged: HashSet<String>,
}

impl ActiveCallSet {
    pub fn is_engaged(&self, user_id: &str) -> bool {
        self.engaged.contains(user_id)
    }

    /// Marks both parties engaged in one step.
    pub fn engage_pair(&mut self, a: &str, b: &str) {
        self.engaged.insert(a.to_string());
        self.engaged.insert(b.to_string());
    }

    /// Clears both parties. Releasing ids that are not engaged is a no-op.
    pub fn release_pair(&mut self, a: &str, b: &str) {
        self.engaged.remove(a);
        self.engaged.remove(b);
    }

    pub fn is_empty(&self) -> bool {
        self.engaged.is_empty()
    }
}

/// The human (or policy) that says yes or no to a call.
pub trait CallConfirmer: Send {
    /// A validated proximity alert: `user_id` really is nearby.
    fn notify_proximity(&mut self, user_id: &str);
    /// Asked once per incoming prompt that passed every filter.
    fn confirm_call(&mut self, peer_id: &str) -> bool;
}

/// Fixed-policy confirmer for headless runs.
pub struct AutoConfirmer {
    accept: bool,
}

impl AutoConfirmer {
    pub fn new(accept: bool) -> Self {
        Self { accept }
    }
}

impl CallConfirmer for AutoConfirmer {
    fn notify_proximity(&mut self, user_id: &str) {
        info!("{} is nearby", user_id);
    }

    fn confirm_call(&mut self, peer_id: &str) -> bool {
        if self.accept {
            info!("Accepting call with {}", peer_id);
        } else {
            info!("Declining call with {}", peer_id);
        }
        self.accept
    }
}

pub struct ProximityCallCoordinator {
    local_id: String,
    active: ActiveCallSet,
    current_peer: Option<String>,
    // Shared with the signaling task an accepted prompt spawns
    transport: Arc<Mutex<Box<dyn CallTransport>>>,
    confirmer: Box<dyn CallConfirmer>,
    media: Arc<MediaGate>,
    media_timeout: Duration,
    events: mpsc::UnboundedSender<CallEnded>,
}

impl ProximityCallCoordinator {
    pub fn new(
        local_id: impl Into<String>,
        transport: Box<dyn CallTransport>,
        confirmer: Box<dyn CallConfirmer>,
        media: Arc<MediaGate>,
        events: mpsc::UnboundedSender<CallEnded>,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            active: ActiveCallSet::default(),
            current_peer: None,
            transport: Arc::new(Mutex::new(transport)),
            confirmer,
            media,
            media_timeout: Duration::from_millis(LOCAL_MEDIA_TIMEOUT_MS),
            events,
        }
    }

    pub fn with_media_timeout(mut self, media_timeout: Duration) -> Self {
        self.media_timeout = media_timeout;
        self
    }

    pub fn current_peer(&self) -> Option<&str> {
        self.current_peer.as_deref()
    }

    pub fn is_engaged(&self, user_id: &str) -> bool {
        self.active.is_engaged(user_id)
    }

    /// Re-validates each alerted id against the directory before surfacing
    /// it. Alerts age in flight; by the time one arrives the player may be
    /// gone or out of range again, and a stale alert must not nag anyone.
    pub fn handle_alerts(
        &mut self,
        alerts: &[String],
        local_position: (f32, f32),
        directory: &EntityDirectory,
    ) {
        for user_id in alerts {
            let Some(position) = directory.position_of(user_id) else {
                warn!("Proximity alert for unknown player {}, discarding", user_id);
                continue;
            };
            if !within_proximity(local_position, position) {
                warn!(
                    "Stale proximity alert for {} (squared distance {:.0}), discarding",
                    user_id,
                    distance_squared(local_position, position)
                );
                continue;
            }
            self.confirmer.notify_proximity(user_id);
        }
    }

    /// Runs an incoming `video_call_prompt` through the quick filters:
    /// relevance, active-call dedup, confirmation. An accepted prompt
    /// reserves both ids right away and leaves media readiness and signaling
    /// to a spawned task, so a slow media gate never holds up whoever is
    /// dispatching events. If that task fails it reports a [`CallEnded`]
    /// over the teardown channel, which releases the reservation.
    pub fn handle_prompt(&mut self, prompt: &CallPrompt) {
        let Some(peer) = prompt.counterpart(&self.local_id) else {
            debug!(
                "Call prompt {} -> {} does not involve us, ignoring",
                prompt.from, prompt.to
            );
            return;
        };
        let peer = peer.to_string();

        if self.active.is_engaged(&self.local_id) || self.active.is_engaged(&peer) {
            debug!("Call prompt for {} while a call is active, dropping", peer);
            return;
        }
        if !self.confirmer.confirm_call(&peer) {
            return;
        }

        // Reserved before the task starts: prompts racing the media wait
        // must already see the pair as engaged
        self.active.engage_pair(&self.local_id, &peer);
        self.current_peer = Some(peer.clone());

        let transport = Arc::clone(&self.transport);
        let media = Arc::clone(&self.media);
        let limit = self.media_timeout;
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(err) = media.wait_ready(limit).await {
                error!("Cannot start a call with {}: {}", peer, err);
                let _ = events.send(CallEnded {
                    peer,
                    reason: CallEndReason::Failed,
                });
                return;
            }
            if let Err(err) = transport.lock().await.place_call(&peer).await {
                error!("Starting a call with {} failed: {}", peer, err);
                let _ = events.send(CallEnded {
                    peer,
                    reason: CallEndReason::Failed,
                });
                return;
            }
            info!("Call started with {}", peer);
        });
    }

    /// One teardown notification ends the call, however it ended. Duplicate
    /// notifications find nothing to clear and are ignored.
    pub fn handle_call_ended(&mut self, ended: &CallEnded) {
        match self.current_peer.take() {
            Some(peer) => {
                self.active.release_pair(&self.local_id, &peer);
                info!("Call with {} ended ({:?})", peer, ended.reason);
            }
            None => debug!("Call-end for {} with no active call, ignoring", ended.peer),
        }
    }

    /// Local teardown, used on shutdown.
    pub async fn hang_up(&mut self) {
        let Some(peer) = self.current_peer.take() else {
            return;
        };
        self.transport.lock().await.hang_up().await;
        self.active.release_pair(&self.local_id, &peer);
        info!("Hung up the call with {}", peer);
    }
}
