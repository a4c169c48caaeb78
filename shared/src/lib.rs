use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PROXIMITY_THRESHOLD: f32 = 50.0;
pub const MOVEMENT_THROTTLE_MS: u64 = 100;
pub const RECONNECT_DELAY_MS: u64 = 3000;
pub const OUTBOUND_QUEUE_LIMIT: usize = 256;
pub const LOCAL_MEDIA_TIMEOUT_MS: u64 = 10_000;

/// One text frame on the wire is one JSON object tagged by its `event` field.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Register { data: PlayerRef },
    Movement { data: PlayerPosition },
    Positions { positions: Vec<PositionEntry> },
    ProximityAlert { alerts: Vec<String> },
    Disconnect { data: PlayerRef },
    VideoCallPrompt { data: CallPrompt },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerRef {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerPosition {
    pub user_id: String,
    pub x: f32,
    pub y: f32,
}

/// Entry of a `positions` snapshot. The server occasionally emits partial
/// rows, so `user_id` may be absent and coordinates default to the origin;
/// consumers decide whether a row without an id is usable.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PositionEntry {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CallPrompt {
    pub from: String,
    pub to: String,
}

impl Event {
    pub fn register(user_id: impl Into<String>) -> Self {
        Event::Register {
            data: PlayerRef {
                user_id: user_id.into(),
            },
        }
    }

    pub fn movement(user_id: impl Into<String>, x: f32, y: f32) -> Self {
        Event::Movement {
            data: PlayerPosition {
                user_id: user_id.into(),
                x,
                y,
            },
        }
    }

    /// Tag the event carries on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            Event::Register { .. } => "register",
            Event::Movement { .. } => "movement",
            Event::Positions { .. } => "positions",
            Event::ProximityAlert { .. } => "proximity_alert",
            Event::Disconnect { .. } => "disconnect",
            Event::VideoCallPrompt { .. } => "video_call_prompt",
        }
    }
}

impl CallPrompt {
    /// Returns the other party when `local_id` is one of the two endpoints,
    /// `None` when the prompt does not involve `local_id` at all.
    pub fn counterpart(&self, local_id: &str) -> Option<&str> {
        if self.from == local_id {
            Some(&self.to)
        } else if self.to == local_id {
            Some(&self.from)
        } else {
            None
        }
    }
}

pub fn distance_squared(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    dx * dx + dy * dy
}

/// Whether two points are close enough to count as "in proximity".
/// Compared against the squared threshold to avoid the square root.
pub fn within_proximity(a: (f32, f32), b: (f32, f32)) -> bool {
    distance_squared(a, b) <= PROXIMITY_THRESHOLD * PROXIMITY_THRESHOLD
}

const KNOWN_TAGS: [&str; 6] = [
    "register",
    "movement",
    "positions",
    "proximity_alert",
    "disconnect",
    "video_call_prompt",
];

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown event tag `{0}`")]
    UnknownTag(String),
    #[error("malformed frame: {0}")]
    BadFrame(#[from] serde_json::Error),
}

pub fn encode_event(event: &Event) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(event)?)
}

/// Decodes one text frame. A syntactically valid frame whose tag is not in
/// the protocol is reported as `UnknownTag` so the receiver can log the tag
/// and move on; everything else decode-related is `BadFrame`.
pub fn decode_event(frame: &str) -> Result<Event, ProtocolError> {
    match serde_json::from_str(frame) {
        Ok(event) => Ok(event),
        Err(err) => match frame_tag(frame) {
            Some(tag) if !KNOWN_TAGS.contains(&tag.as_str()) => Err(ProtocolError::UnknownTag(tag)),
            _ => Err(ProtocolError::BadFrame(err)),
        },
    }
}

fn frame_tag(frame: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(frame).ok()?;
    Some(value.get("event")?.as_str()?.to_owned())
}
