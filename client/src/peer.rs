//! Peer call transport contract and local media readiness
//!
//! The coordinator does not speak WebRTC itself; it drives a [`CallTransport`]
//! and hears about teardown through [`CallEnded`] messages on a channel. That
//! single notification path covers remote hang-ups, transport errors and
//! local teardown alike, so clearing call state happens in exactly one place.

use std::time::Duration;

use async_trait::async_trait;
use log::info;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("local media stream not ready after {0:?}")]
    MediaTimeout(Duration),
    #[error("signaling failed: {0}")]
    Signaling(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEndReason {
    RemoteClosed,
    LocalHangup,
    Failed,
}

/// Out-of-band teardown notification from the call transport.
#[derive(Debug, Clone)]
pub struct CallEnded {
    pub peer: String,
    pub reason: CallEndReason,
}

#[async_trait]
pub trait CallTransport: Send {
    async fn place_call(&mut self, peer_id: &str) -> Result<(), CallError>;
    async fn hang_up(&mut self);
}

/// Readiness latch for the opaque local media stream.
///
/// Whatever owns the capture capability flips the latch once; callers about
/// to place a call wait on it with a deadline instead of racing stream
/// initialization.
pub struct MediaGate {
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

impl MediaGate {
    pub fn new() -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self { ready_tx, ready_rx }
    }

    pub fn mark_ready(&self) {
        let _ = self.ready_tx.send(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// Waits until the local stream is ready or `limit` passes.
    pub async fn wait_ready(&self, limit: Duration) -> Result<(), CallError> {
        let mut ready = self.ready_rx.clone();
        let latch = async move {
            while !*ready.borrow() {
                if ready.changed().await.is_err() {
                    // Provider gone without flipping the latch: never ready
                    std::future::pending::<()>().await;
                }
            }
        };
        timeout(limit, latch)
            .await
            .map_err(|_| CallError::MediaTimeout(limit))
    }
}

impl Default for MediaGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport for headless runs: placing a call only logs it and immediately
/// reports teardown, which exercises the whole accept/clear cycle without a
/// media backend.
pub struct NullCallTransport {
    events: mpsc::UnboundedSender<CallEnded>,
}

impl NullCallTransport {
    pub fn new(events: mpsc::UnboundedSender<CallEnded>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl CallTransport for NullCallTransport {
    async fn place_call(&mut self, peer_id: &str) -> Result<(), CallError> {
        info!("No media backend, simulating a call with {} and hanging up", peer_id);
        let _ = self.events.send(CallEnded {
            peer: peer_id.to_string(),
            reason: CallEndReason::LocalHangup,
        });
        Ok(())
    }

    async fn hang_up(&mut self) {}
}
