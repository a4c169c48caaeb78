//! Remote entity directory driven by authoritative position snapshots

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use shared::PositionEntry;

use crate::scene::EntityObserver;

/// Last known state of one remote player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteEntity {
    pub x: f32,
    pub y: f32,
}

/// Tracks every remote player the server currently reports.
///
/// The server's `positions` snapshot is authoritative: entities appear when
/// a snapshot first mentions them, follow the snapshot's coordinates, and
/// disappear when a snapshot stops mentioning them. The local player is
/// never tracked here.
pub struct EntityDirectory {
    local_id: String,
    remote: HashMap<String, RemoteEntity>,
    observer: Option<Box<dyn EntityObserver>>,
}

impl EntityDirectory {
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            remote: HashMap::new(),
            observer: None,
        }
    }

    /// Attaches the rendering collaborator. Reconciliation works the same
    /// with or without one.
    pub fn set_observer(&mut self, observer: Box<dyn EntityObserver>) {
        self.observer = Some(observer);
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Applies one full snapshot: creates entities the snapshot introduces,
    /// updates the ones it repeats, destroys the ones it omits. Rows without
    /// an id are skipped and never abort the rest of the snapshot.
    pub fn reconcile(&mut self, entries: &[PositionEntry]) {
        let mut seen: HashSet<&str> = HashSet::with_capacity(entries.len());

        for entry in entries {
            let Some(user_id) = entry.user_id.as_deref() else {
                warn!("Position row without user_id, skipping");
                continue;
            };
            if user_id == self.local_id {
                debug!("Snapshot unexpectedly lists the local player, skipping");
                continue;
            }
            seen.insert(user_id);

            match self.remote.get_mut(user_id) {
                Some(entity) => {
                    entity.x = entry.x;
                    entity.y = entry.y;
                    if let Some(observer) = self.observer.as_deref_mut() {
                        observer.entity_moved(user_id, entry.x, entry.y);
                    }
                }
                None => {
                    self.remote.insert(
                        user_id.to_string(),
                        RemoteEntity {
                            x: entry.x,
                            y: entry.y,
                        },
                    );
                    if let Some(observer) = self.observer.as_deref_mut() {
                        observer.entity_spawned(user_id, entry.x, entry.y);
                    }
                }
            }
        }

        let departed: Vec<String> = self
            .remote
            .keys()
            .filter(|id| !seen.contains(id.as_str()))
            .cloned()
            .collect();
        for user_id in departed {
            self.remote.remove(&user_id);
            debug!("{} no longer in snapshot, destroying", user_id);
            if let Some(observer) = self.observer.as_deref_mut() {
                observer.entity_despawned(&user_id);
            }
        }
    }

    /// Destroys one entity by id, as delivered by a targeted `disconnect`
    /// event. Unknown ids are a no-op, so duplicate notifications are safe.
    pub fn remove(&mut self, user_id: &str) {
        if self.remote.remove(user_id).is_some() {
            debug!("{} disconnected, destroying", user_id);
            if let Some(observer) = self.observer.as_deref_mut() {
                observer.entity_despawned(user_id);
            }
        } else {
            debug!("Disconnect for untracked player {}", user_id);
        }
    }

    /// Read-only view over every remote entity's last known position.
    pub fn positions(&self) -> &HashMap<String, RemoteEntity> {
        &self.remote
    }

    pub fn position_of(&self, user_id: &str) -> Option<(f32, f32)> {
        self.remote.get(user_id).map(|entity| (entity.x, entity.y))
    }
}
