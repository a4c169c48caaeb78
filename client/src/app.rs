//! Wires the sync components together and runs the event loop
//!
//! One task owns everything: inbound events are matched on their type and
//! routed to the component that owns that slice of state, the tick interval
//! drives movement reporting, and call teardown notifications come in over
//! their own channel. Dispatch never awaits; slow call-accept work runs on
//! the coordinator's signaling task, so snapshots, alerts and ticks keep
//! flowing while a call is being set up.

use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;

use shared::{distance_squared, Event};

use crate::calls::ProximityCallCoordinator;
use crate::connection::ConnectionManager;
use crate::directory::EntityDirectory;
use crate::movement::MovementReporter;
use crate::peer::CallEnded;
use crate::scene::{Avatar, Wanderer, AVATAR_RADIUS};

const DEFAULT_TICK_MS: u64 = 50;

pub struct App {
    connection: ConnectionManager,
    events: mpsc::UnboundedReceiver<Event>,
    call_events: mpsc::UnboundedReceiver<CallEnded>,
    directory: EntityDirectory,
    reporter: MovementReporter,
    coordinator: ProximityCallCoordinator,
    avatar: Box<dyn Avatar>,
    wanderer: Option<Wanderer>,
    tick: Duration,
}

impl App {
    pub fn new(
        connection: ConnectionManager,
        events: mpsc::UnboundedReceiver<Event>,
        call_events: mpsc::UnboundedReceiver<CallEnded>,
        directory: EntityDirectory,
        reporter: MovementReporter,
        coordinator: ProximityCallCoordinator,
        avatar: Box<dyn Avatar>,
    ) -> Self {
        Self {
            connection,
            events,
            call_events,
            directory,
            reporter,
            coordinator,
            avatar,
            wanderer: None,
            tick: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }

    /// Adds random-walk steering, for running without an input source.
    pub fn with_wanderer(mut self, wanderer: Wanderer) -> Self {
        self.wanderer = Some(wanderer);
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub async fn run(mut self, address: String) {
        self.connection.connect(address);
        let mut ticker = tokio::time::interval(self.tick);

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => {
                        info!("Event stream ended");
                        break;
                    }
                },
                Some(ended) = self.call_events.recv() => {
                    self.coordinator.handle_call_ended(&ended);
                }
                _ = ticker.tick() => self.on_tick(),
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        self.coordinator.hang_up().await;
        self.connection.shutdown().await;
    }

    /// Routes one inbound event to the component that owns its state.
    /// Stays await-free: no single event may hold up the ones behind it.
    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Positions { positions } => self.directory.reconcile(&positions),
            Event::ProximityAlert { alerts } => {
                let here = self.avatar.position();
                self.coordinator.handle_alerts(&alerts, here, &self.directory);
            }
            Event::Disconnect { data } => self.directory.remove(&data.user_id),
            Event::VideoCallPrompt { data } => self.coordinator.handle_prompt(&data),
            // Client-to-server events have no business arriving here
            Event::Register { .. } | Event::Movement { .. } => {
                debug!("Ignoring server echo of `{}`", event.tag());
            }
        }
    }

    fn on_tick(&mut self) {
        if let Some(wanderer) = self.wanderer.as_mut() {
            let position = self.avatar.position();
            let (dx, dy) = wanderer.steer(self.tick.as_secs_f32(), position);
            self.avatar.apply_input(dx, dy);
        }

        // Resolve overlaps with remote bodies before reporting
        let here = self.avatar.position();
        let touching: Vec<(f32, f32)> = self
            .directory
            .positions()
            .values()
            .map(|entity| (entity.x, entity.y))
            .filter(|other| distance_squared(here, *other) < (2.0 * AVATAR_RADIUS).powi(2))
            .collect();
        for other in touching {
            self.avatar.collide_with(other);
        }

        if let Some(event) = self.reporter.report(self.avatar.position()) {
            self.connection.send(event);
        }
    }
}
