//! Workload profiles: per-route baseline expectations for task duration,
//! heartbeat cadence, and scar weighting.

use serde::{Deserialize, Serialize};

/// Heartbeat requirement for profiles that demand liveness proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatSpec {
    pub interval_ms: u64,
}

/// Resolved profile parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileSpec {
    pub baseline_latency_ms: f64,
    pub max_duration_ms: u64,
    pub heartbeat: Option<HeartbeatSpec>,
    pub scar_multiplier: f64,
    /// HEAVY and EXTREME refuse to start without a cancellation signal.
    pub requires_cancellation: bool,
}

/// Named workload profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WorkloadProfile {
    #[serde(rename = "LIGHT")]
    Light,
    #[serde(rename = "STANDARD")]
    Standard,
    #[serde(rename = "HEAVY")]
    Heavy,
    #[serde(rename = "EXTREME")]
    Extreme,
    #[serde(rename = "CUSTOM")]
    Custom(ProfileSpec),
}

impl Default for WorkloadProfile {
    fn default() -> Self {
        WorkloadProfile::Standard
    }
}

const LIGHT: ProfileSpec = ProfileSpec {
    baseline_latency_ms: 10.0,
    max_duration_ms: 1_000,
    heartbeat: None,
    scar_multiplier: 2.0,
    requires_cancellation: false,
};

const STANDARD: ProfileSpec = ProfileSpec {
    baseline_latency_ms: 100.0,
    max_duration_ms: 30_000,
    heartbeat: None,
    scar_multiplier: 1.0,
    requires_cancellation: false,
};

const HEAVY: ProfileSpec = ProfileSpec {
    baseline_latency_ms: 5_000.0,
    max_duration_ms: 300_000,
    heartbeat: Some(HeartbeatSpec { interval_ms: 5_000 }),
    scar_multiplier: 0.5,
    requires_cancellation: true,
};

const EXTREME: ProfileSpec = ProfileSpec {
    baseline_latency_ms: 60_000.0,
    max_duration_ms: 3_600_000,
    heartbeat: Some(HeartbeatSpec { interval_ms: 10_000 }),
    scar_multiplier: 0.2,
    requires_cancellation: true,
};

impl WorkloadProfile {
    /// Resolve to concrete parameters. Custom profiles are taken as given.
    pub fn spec(&self) -> ProfileSpec {
        match self {
            WorkloadProfile::Light => LIGHT,
            WorkloadProfile::Standard => STANDARD,
            WorkloadProfile::Heavy => HEAVY,
            WorkloadProfile::Extreme => EXTREME,
            WorkloadProfile::Custom(spec) => *spec,
        }
    }

    /// Parse a profile name; anything unrecognized falls back to STANDARD.
    pub fn from_name(name: &str) -> WorkloadProfile {
        match name.to_ascii_uppercase().as_str() {
            "LIGHT" => WorkloadProfile::Light,
            "STANDARD" => WorkloadProfile::Standard,
            "HEAVY" => WorkloadProfile::Heavy,
            "EXTREME" => WorkloadProfile::Extreme,
            _ => WorkloadProfile::Standard,
        }
    }

    /// A CUSTOM profile seeded from STANDARD values.
    pub fn custom() -> WorkloadProfile {
        WorkloadProfile::Custom(STANDARD)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkloadProfile::Light => "LIGHT",
            WorkloadProfile::Standard => "STANDARD",
            WorkloadProfile::Heavy => "HEAVY",
            WorkloadProfile::Extreme => "EXTREME",
            WorkloadProfile::Custom(_) => "CUSTOM",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_table_constants() {
        let light = WorkloadProfile::Light.spec();
        assert_eq!(light.baseline_latency_ms, 10.0);
        assert_eq!(light.max_duration_ms, 1_000);
        assert_eq!(light.heartbeat, None);
        assert_eq!(light.scar_multiplier, 2.0);
        assert!(!light.requires_cancellation);

        let heavy = WorkloadProfile::Heavy.spec();
        assert_eq!(heavy.baseline_latency_ms, 5_000.0);
        assert_eq!(heavy.max_duration_ms, 300_000);
        assert_eq!(heavy.heartbeat, Some(HeartbeatSpec { interval_ms: 5_000 }));
        assert_eq!(heavy.scar_multiplier, 0.5);
        assert!(heavy.requires_cancellation);

        let extreme = WorkloadProfile::Extreme.spec();
        assert_eq!(extreme.max_duration_ms, 3_600_000);
        assert_eq!(extreme.heartbeat, Some(HeartbeatSpec { interval_ms: 10_000 }));
        assert_eq!(extreme.scar_multiplier, 0.2);
        assert!(extreme.requires_cancellation);
    }

    #[test]
    fn test_unknown_name_falls_back_to_standard() {
        assert_eq!(WorkloadProfile::from_name("TURBO"), WorkloadProfile::Standard);
        assert_eq!(WorkloadProfile::from_name("heavy"), WorkloadProfile::Heavy);
    }

    #[test]
    fn test_custom_defaults_to_standard_values() {
        let custom = WorkloadProfile::custom();
        assert_eq!(custom.spec(), WorkloadProfile::Standard.spec());
        assert_eq!(custom.name(), "CUSTOM");
    }
}
