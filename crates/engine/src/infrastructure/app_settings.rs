//! Teleport settings
//!
//! Settings are plain serde data so a host can keep them in its own config
//! file. Every field has a default; `from_env` layers `WARPGATE_*` environment
//! overrides on top. Out-of-range or unparsable overrides are logged and ignored.

use serde::{Deserialize, Serialize};
use warpgate_domain::Position;

// ============================================================================
// Failure and fallback policies
// ============================================================================

/// What the permission gate answers when the policy backend fails or times out.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyFailureMode {
    #[default]
    Deny,
    Allow,
}

impl std::fmt::Display for PolicyFailureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyFailureMode::Deny => write!(f, "deny"),
            PolicyFailureMode::Allow => write!(f, "allow"),
        }
    }
}

impl std::str::FromStr for PolicyFailureMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deny" | "closed" => Ok(PolicyFailureMode::Deny),
            "allow" | "open" => Ok(PolicyFailureMode::Allow),
            _ => Err(()),
        }
    }
}

/// Result of a search that found nothing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedSearchFallback {
    /// Hand back the origin unchanged
    #[default]
    Origin,
    /// Use the destination world's spawn point
    WorldSpawn,
    /// Give up; the coordinator answers `Unsafe(NoSafeLocation)`
    Reject,
}

impl std::fmt::Display for ExhaustedSearchFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExhaustedSearchFallback::Origin => write!(f, "origin"),
            ExhaustedSearchFallback::WorldSpawn => write!(f, "world_spawn"),
            ExhaustedSearchFallback::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for ExhaustedSearchFallback {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "origin" => Ok(ExhaustedSearchFallback::Origin),
            "world_spawn" | "worldspawn" | "spawn" => Ok(ExhaustedSearchFallback::WorldSpawn),
            "reject" | "none" => Ok(ExhaustedSearchFallback::Reject),
            _ => Err(()),
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_search_radius() -> u32 {
    8
}

fn default_search_vertical_range() -> u32 {
    48
}

fn default_actor_height() -> u8 {
    2
}

fn default_support_tolerance() -> u8 {
    3
}

fn default_policy_timeout_ms() -> u64 {
    2_000
}

fn default_policy_max_retries() -> u32 {
    1
}

fn default_cooldown_secs() -> u64 {
    3
}

fn default_circuit_failure_threshold() -> u32 {
    5
}

fn default_circuit_open_secs() -> u64 {
    30
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeleportSettings {
    /// Chebyshev radius of the horizontal search around a destination
    #[serde(default = "default_search_radius")]
    pub search_radius: u32,

    /// Blocks scanned below and above the destination in every column
    #[serde(default = "default_search_vertical_range")]
    pub search_vertical_range: u32,

    #[serde(default = "default_actor_height")]
    pub actor_height: u8,

    /// How far an actor may drop onto a floor without the spot counting as unsafe
    #[serde(default = "default_support_tolerance")]
    pub support_tolerance: u8,

    #[serde(default)]
    pub exhausted_search_fallback: ExhaustedSearchFallback,

    #[serde(default = "default_policy_timeout_ms")]
    pub policy_timeout_ms: u64,

    #[serde(default = "default_policy_max_retries")]
    pub policy_max_retries: u32,

    #[serde(default)]
    pub policy_failure_mode: PolicyFailureMode,

    /// Minimum time between two committed teleports of one actor, 0 disables
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,

    #[serde(default = "default_circuit_open_secs")]
    pub circuit_open_secs: u64,

    /// Last entry of the spawn fallback chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_spawn: Option<Position>,
}

impl Default for TeleportSettings {
    fn default() -> Self {
        Self {
            search_radius: default_search_radius(),
            search_vertical_range: default_search_vertical_range(),
            actor_height: default_actor_height(),
            support_tolerance: default_support_tolerance(),
            exhausted_search_fallback: ExhaustedSearchFallback::default(),
            policy_timeout_ms: default_policy_timeout_ms(),
            policy_max_retries: default_policy_max_retries(),
            policy_failure_mode: PolicyFailureMode::default(),
            cooldown_secs: default_cooldown_secs(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_open_secs: default_circuit_open_secs(),
            default_spawn: None,
        }
    }
}

/// Errors raised when settings are structurally unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid setting {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl SettingsError {
    fn invalid(field: &'static str, message: impl ToString) -> Self {
        Self::Invalid {
            field,
            message: message.to_string(),
        }
    }
}

impl TeleportSettings {
    /// Defaults with `WARPGATE_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings
    }

    /// Apply overrides read through `lookup`.
    ///
    /// Supported variables:
    /// - WARPGATE_SEARCH_RADIUS (range: 0-64)
    /// - WARPGATE_SEARCH_VERTICAL_RANGE (range: 0-384)
    /// - WARPGATE_ACTOR_HEIGHT (range: 1-4)
    /// - WARPGATE_SUPPORT_TOLERANCE (range: 1-16)
    /// - WARPGATE_EXHAUSTED_SEARCH_FALLBACK (origin | world_spawn | reject)
    /// - WARPGATE_POLICY_TIMEOUT_MS (range: 10-60000)
    /// - WARPGATE_POLICY_MAX_RETRIES (range: 0-5)
    /// - WARPGATE_POLICY_FAILURE_MODE (deny | allow)
    /// - WARPGATE_COOLDOWN_SECS (range: 0-3600)
    /// - WARPGATE_CIRCUIT_FAILURE_THRESHOLD (range: 1-100)
    /// - WARPGATE_CIRCUIT_OPEN_SECS (range: 1-3600)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = ranged(&lookup, "WARPGATE_SEARCH_RADIUS", 0, 64) {
            self.search_radius = v;
        }
        if let Some(v) = ranged(&lookup, "WARPGATE_SEARCH_VERTICAL_RANGE", 0, 384) {
            self.search_vertical_range = v;
        }
        if let Some(v) = ranged(&lookup, "WARPGATE_ACTOR_HEIGHT", 1, 4) {
            self.actor_height = v;
        }
        if let Some(v) = ranged(&lookup, "WARPGATE_SUPPORT_TOLERANCE", 1, 16) {
            self.support_tolerance = v;
        }
        if let Some(v) = named(&lookup, "WARPGATE_EXHAUSTED_SEARCH_FALLBACK") {
            self.exhausted_search_fallback = v;
        }
        if let Some(v) = ranged(&lookup, "WARPGATE_POLICY_TIMEOUT_MS", 10, 60_000) {
            self.policy_timeout_ms = v;
        }
        if let Some(v) = ranged(&lookup, "WARPGATE_POLICY_MAX_RETRIES", 0, 5) {
            self.policy_max_retries = v;
        }
        if let Some(v) = named(&lookup, "WARPGATE_POLICY_FAILURE_MODE") {
            self.policy_failure_mode = v;
        }
        if let Some(v) = ranged(&lookup, "WARPGATE_COOLDOWN_SECS", 0, 3_600) {
            self.cooldown_secs = v;
        }
        if let Some(v) = ranged(&lookup, "WARPGATE_CIRCUIT_FAILURE_THRESHOLD", 1, 100) {
            self.circuit_failure_threshold = v;
        }
        if let Some(v) = ranged(&lookup, "WARPGATE_CIRCUIT_OPEN_SECS", 1, 3_600) {
            self.circuit_open_secs = v;
        }
    }

    /// Reject combinations the pipeline cannot work with. Settings built
    /// through serde bypass the env range checks, so hosts loading a file
    /// should call this once at startup.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.actor_height == 0 {
            return Err(SettingsError::invalid("actor_height", "must be at least 1"));
        }
        if self.support_tolerance == 0 {
            return Err(SettingsError::invalid(
                "support_tolerance",
                "must be at least 1",
            ));
        }
        if self.policy_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "policy_timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.circuit_failure_threshold == 0 {
            return Err(SettingsError::invalid(
                "circuit_failure_threshold",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn ranged<F, T>(lookup: &F, key: &str, min: T, max: T) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Copy + std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value >= min && value <= max => {
            tracing::info!(key, value = %value, "Applied environment override");
            Some(value)
        }
        Ok(value) => {
            tracing::warn!(key, value = %value, min = %min, max = %max, "Environment override out of range, ignoring");
            None
        }
        Err(_) => {
            tracing::warn!(key, val = %raw, "Environment override is not a valid number, ignoring");
            None
        }
    }
}

fn named<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.parse::<T>() {
        Ok(value) => {
            tracing::info!(key, value = %value, "Applied environment override");
            Some(value)
        }
        Err(_) => {
            tracing::warn!(key, val = %raw, "Environment override has an unknown value, ignoring");
            None
        }
    }
}
