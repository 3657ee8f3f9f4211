//! Bridge configuration.
//!
//! [`BridgeConfig`] collects the bridge-wide switches: whether marshalled
//! complex values carry `javaClass` hints, how revisited values are
//! reported (nested output with fixups, or flat output), and how many live
//! references the bridge retains. Configuration can come from code through
//! the `with_*` builders or from the environment through
//! [`BridgeConfig::from_env`].

use crate::state::{FixupPolicy, OutputMode};

/// Bridge-wide options, fixed at bridge construction.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Emit `javaClass` hints on marshalled complex values.
    pub marshal_class_hints: bool,
    /// Output shape and revisit policy.
    pub output_mode: OutputMode,
    /// Capacity of the live reference store; the oldest entry is evicted
    /// when a new reference would exceed it.
    pub reference_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            marshal_class_hints: true,
            output_mode: OutputMode::default(),
            reference_capacity: Self::DEFAULT_REFERENCE_CAPACITY,
        }
    }
}

impl BridgeConfig {
    pub const DEFAULT_REFERENCE_CAPACITY: usize = 4096;

    /// Configuration from the environment, falling back to defaults.
    ///
    /// Reads `WIREBRIDGE_CLASS_HINTS` (`true`/`false`),
    /// `WIREBRIDGE_FIXUP_POLICY` (`none`, `duplicates`, `circular`,
    /// `flat`) and `WIREBRIDGE_REFERENCE_CAPACITY` (integer). A `.env`
    /// file is honored when present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Ok(hints) = std::env::var("WIREBRIDGE_CLASS_HINTS") {
            config.marshal_class_hints = matches!(hints.as_str(), "true" | "1" | "yes");
        }
        if let Ok(policy) = std::env::var("WIREBRIDGE_FIXUP_POLICY") {
            config.output_mode = match policy.as_str() {
                "none" => OutputMode::Nested(FixupPolicy::Forbid),
                "duplicates" => OutputMode::Nested(FixupPolicy::DuplicatesOnly),
                "flat" => OutputMode::Flat,
                _ => OutputMode::Nested(FixupPolicy::CircularAndDuplicates),
            };
        }
        if let Ok(capacity) = std::env::var("WIREBRIDGE_REFERENCE_CAPACITY")
            && let Ok(capacity) = capacity.parse::<usize>()
            && capacity > 0
        {
            config.reference_capacity = capacity;
        }
        config
    }

    /// Toggle `javaClass` hints on marshalled complex values.
    #[must_use]
    pub fn with_class_hints(mut self, on: bool) -> Self {
        self.marshal_class_hints = on;
        self
    }

    /// Select nested output with the given revisit policy.
    #[must_use]
    pub fn with_fixup_policy(mut self, policy: FixupPolicy) -> Self {
        self.output_mode = OutputMode::Nested(policy);
        self
    }

    /// Select flat output.
    #[must_use]
    pub fn with_flat_output(mut self) -> Self {
        self.output_mode = OutputMode::Flat;
        self
    }

    /// Cap the live reference store.
    #[must_use]
    pub fn with_reference_capacity(mut self, capacity: usize) -> Self {
        self.reference_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_bridge() {
        let config = BridgeConfig::default();
        assert!(config.marshal_class_hints);
        assert_eq!(
            config.output_mode,
            OutputMode::Nested(FixupPolicy::CircularAndDuplicates)
        );
    }

    #[test]
    fn builders_compose() {
        let config = BridgeConfig::default()
            .with_class_hints(false)
            .with_flat_output()
            .with_reference_capacity(16);
        assert!(!config.marshal_class_hints);
        assert_eq!(config.output_mode, OutputMode::Flat);
        assert_eq!(config.reference_capacity, 16);
    }
}
