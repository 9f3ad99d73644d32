//! Controller configuration.
//!
//! ```json
//! { "chunk_size": 256, "initial_capacity": 64, "flush": "end_of_tick" }
//! ```
//!
//! Every field is optional; missing fields take their [`Default`].

use serde::{Deserialize, Serialize};

use crate::error::EcsResult;

/// When commands recorded by systems are applied during a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// After each system returns, so the next system sees the changes.
    #[default]
    AfterEachSystem,
    /// Once, after the last system of the tick.
    EndOfTick,
}

/// Tuning knobs for a [`Controller`](crate::controller::Controller).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Maximum rows per range handed to a system. `0` means one range per
    /// archetype.
    pub chunk_size: usize,
    /// Rows reserved in every archetype when it is created.
    pub initial_capacity: usize,
    pub flush: FlushPolicy,
}

impl ControllerConfig {
    pub fn from_json_str(json: &str) -> EcsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> EcsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Split `len` rows into `(start, count)` chunks.
    pub(crate) fn chunks(&self, len: usize) -> impl Iterator<Item = (usize, usize)> + use<> {
        let step = if self.chunk_size == 0 {
            len.max(1)
        } else {
            self.chunk_size
        };
        (0..len)
            .step_by(step)
            .map(move |start| (start, step.min(len - start)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EcsError;

    #[test]
    fn defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.chunk_size, 0);
        assert_eq!(config.initial_capacity, 0);
        assert_eq!(config.flush, FlushPolicy::AfterEachSystem);
    }

    #[test]
    fn parse_partial_json() {
        let config = ControllerConfig::from_json_str(r#"{ "flush": "end_of_tick" }"#).unwrap();
        assert_eq!(config.flush, FlushPolicy::EndOfTick);
        assert_eq!(config.chunk_size, 0);
    }

    #[test]
    fn round_trip_through_json() {
        let config = ControllerConfig {
            chunk_size: 128,
            initial_capacity: 32,
            flush: FlushPolicy::EndOfTick,
        };
        let json = config.to_json().unwrap();
        assert_eq!(ControllerConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn unknown_field_is_an_error() {
        let err = ControllerConfig::from_json_str(r#"{ "chunk": 4 }"#).unwrap_err();
        assert!(matches!(err, EcsError::Config(_)));
        assert!(err.to_string().starts_with("invalid controller config"));
    }

    #[test]
    fn chunks_cover_every_row() {
        let config = ControllerConfig {
            chunk_size: 4,
            ..Default::default()
        };
        assert_eq!(
            config.chunks(10).collect::<Vec<_>>(),
            vec![(0, 4), (4, 4), (8, 2)]
        );
        assert_eq!(config.chunks(0).count(), 0);
    }

    #[test]
    fn zero_chunk_size_is_one_chunk() {
        let config = ControllerConfig::default();
        assert_eq!(config.chunks(7).collect::<Vec<_>>(), vec![(0, 7)]);
    }
}
