//! # Proximity World Client Library
//!
//! This library implements the connection and state-synchronization layer of
//! the proximity world client. Players move avatars on a shared plane, the
//! server broadcasts authoritative position snapshots, and players who get
//! close enough to each other are offered a peer-to-peer video call.
//!
//! ## Architecture Overview
//!
//! Everything runs on a single event-driven loop. Inbound frames become
//! typed events that are routed to the component owning that slice of
//! state, so no state is ever shared between threads or guarded by locks.
//!
//! ### Resilient Connection
//! The connection manager owns the WebSocket link in a dedicated session
//! task. While the link is down, outbound events accumulate in a bounded
//! queue that evicts its oldest entries; reconnects are scheduled on a
//! fixed delay and repeat until the server comes back.
//!
//! ### Snapshot Reconciliation
//! Position snapshots from the server are authoritative. The entity
//! directory creates, updates and destroys remote entities to match each
//! snapshot exactly, and exposes a read-only position view for proximity
//! math.
//!
//! ### Call Negotiation
//! Proximity alerts are re-validated against the directory before anyone is
//! notified, and call prompts pass relevance, dedup, confirmation and media
//! readiness checks before signaling starts. One teardown path clears call
//! state no matter how a call ends.
//!
//! ## Module Organization
//!
//! - `transport`: duplex text-frame seam and its WebSocket implementation
//! - `connection`: phase machine, outbound queue, reconnect, listeners
//! - `directory`: remote entity bookkeeping from authoritative snapshots
//! - `movement`: change-gated, throttled movement reporting
//! - `calls`: proximity call coordination and the active-call set
//! - `peer`: call transport contract and local media readiness
//! - `scene`: capability traits the rendering collaborator implements
//! - `auth`: player identity from the session token
//! - `app`: composition and the dispatch loop
//!
//! ## Usage Sketch
//!
//! ```text
//! let manager = ConnectionManager::spawn(WsConnector, ConnectionConfig::default());
//! manager.set_registration(register);  // sent first on every (re)connect
//! manager.on_message(...);             // feed the dispatch loop
//!
//! App::new(manager, events, call_events, directory, reporter, coordinator, avatar)
//!     .with_wanderer(Wanderer::new(speed, bounds))
//!     .run(address)
//!     .await;
//! ```
//!
//! ## Design Notes
//!
//! The server is trusted for world state but not for timeliness: snapshots
//! overwrite local knowledge wholesale, while anything time-sensitive (a
//! proximity alert, a call prompt) is re-checked against current state
//! before it has user-visible effects. Media capture and rendering stay
//! behind trait seams; the library never touches pixels or camera hardware.

pub mod app;
pub mod auth;
pub mod calls;
pub mod connection;
pub mod directory;
pub mod movement;
pub mod peer;
pub mod scene;
pub mod transport;
