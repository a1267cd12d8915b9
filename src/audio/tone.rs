// Tone request types passed to the playback engine

use serde::{Deserialize, Serialize};

use crate::gain::DEFAULT_DURATION_MS;

/// Output channel a tone is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Hard left, right side silent
    Left,
    /// Hard right, left side silent
    Right,
    /// Duplicated to both sides
    Both,
}

impl Channel {
    /// Per-side routing gains (left, right)
    #[inline]
    pub fn gains(self) -> (f32, f32) {
        match self {
            Channel::Left => (1.0, 0.0),
            Channel::Right => (0.0, 1.0),
            Channel::Both => (1.0, 1.0),
        }
    }

    /// Get human-readable name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            Channel::Left => "LEFT",
            Channel::Right => "RIGHT",
            Channel::Both => "BOTH",
        }
    }
}

/// One probe tone
///
/// `level` must already lie within the staircase bounds; the engine converts
/// it to gain without re-deriving limits. `duration_ms` should exceed
/// attack + release (60 ms with the defaults), which is not validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneRequest {
    /// Frequency in Hz (> 0)
    pub frequency: f32,
    pub channel: Channel,
    /// Level in dB relative to the reference gain
    pub level: f32,
    /// Total duration including attack and release
    pub duration_ms: u32,
}

impl ToneRequest {
    /// Request with the default 1000 ms duration
    pub fn new(frequency: f32, channel: Channel, level: f32) -> Self {
        Self {
            frequency,
            channel,
            level,
            duration_ms: DEFAULT_DURATION_MS,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u32) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_routing_gains() {
        assert_eq!(Channel::Left.gains(), (1.0, 0.0));
        assert_eq!(Channel::Right.gains(), (0.0, 1.0));
        assert_eq!(Channel::Both.gains(), (1.0, 1.0));
    }

    #[test]
    fn test_request_default_duration() {
        let request = ToneRequest::new(1000.0, Channel::Left, -20.0);
        assert_eq!(request.duration_ms, 1000);

        let short = request.with_duration_ms(250);
        assert_eq!(short.duration_ms, 250);
        assert_eq!(short.frequency, 1000.0);
    }

    #[test]
    fn test_channel_json_names() {
        let json = serde_json::to_string(&Channel::Both).unwrap();
        assert_eq!(json, "\"both\"");
        let parsed: Channel = serde_json::from_str("\"right\"").unwrap();
        assert_eq!(parsed, Channel::Right);
    }
}
