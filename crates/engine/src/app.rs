//! Application state and composition.

use std::sync::Arc;

use warpgate_domain::PortalLinkTable;

use crate::infrastructure::{
    app_settings::TeleportSettings,
    circuit_breaker::CircuitBreakerConfig,
    ports::{ClockPort, PolicyPort, SnapshotPort},
    resilient_policy::{PolicyRetryConfig, ResilientPolicyClient},
    world_context::WorldContext,
};
use crate::use_cases::teleport::{
    PermissionConfig, PermissionGate, PortalLinker, PositionSafetyEvaluator, SafeLocationSearch,
    SafetyRules, SearchConfig, SpawnResolver, TeleportationCoordinator,
};
use crate::use_cases::TeleportUseCases;

/// Main application state.
///
/// Holds the world context handle and the use cases built on top of it.
pub struct App {
    pub world: WorldContext,
    pub settings: TeleportSettings,
    pub use_cases: UseCases,
}

/// Container for all use cases.
pub struct UseCases {
    pub teleport: TeleportUseCases,
}

impl App {
    /// Create a new App with all dependencies wired up.
    ///
    /// The policy backend is wrapped in a [`ResilientPolicyClient`]; the
    /// permission gate's timeout still bounds the whole evaluation.
    pub fn new(
        world: WorldContext,
        policy: Arc<dyn PolicyPort>,
        snapshots: Arc<dyn SnapshotPort>,
        clock: Arc<dyn ClockPort>,
        links: PortalLinkTable,
        settings: TeleportSettings,
    ) -> Self {
        // Attempts plus backoff must fit inside the gate's policy timeout.
        let defaults = PolicyRetryConfig::default();
        let attempts = u64::from(settings.policy_max_retries) + 1;
        let backoff_ms = defaults
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(settings.policy_max_retries).saturating_sub(1));
        let retry_config = PolicyRetryConfig {
            max_retries: settings.policy_max_retries,
            call_timeout_ms: (settings.policy_timeout_ms.saturating_sub(backoff_ms) / attempts)
                .max(10),
            ..defaults
        };
        let breaker_config = CircuitBreakerConfig::from_settings(
            settings.circuit_failure_threshold,
            settings.circuit_open_secs,
        );
        tracing::info!(
            max_retries = retry_config.max_retries,
            call_timeout_ms = retry_config.call_timeout_ms,
            failure_threshold = breaker_config.failure_threshold,
            "Policy client configured"
        );
        let policy: Arc<dyn PolicyPort> = Arc::new(ResilientPolicyClient::new(
            policy,
            retry_config,
            breaker_config,
        ));

        let rules = SafetyRules::from_settings(&settings);
        let safety = PositionSafetyEvaluator::new(rules);

        let gate = Arc::new(PermissionGate::new(
            world.clone(),
            policy,
            clock,
            safety,
            PermissionConfig::from_settings(&settings),
        ));
        let search = Arc::new(SafeLocationSearch::new(
            world.clone(),
            rules,
            SearchConfig::from_settings(&settings),
        ));
        let linker = Arc::new(PortalLinker::new(links));
        let coordinator = Arc::new(TeleportationCoordinator::new(
            world.clone(),
            gate.clone(),
            search.clone(),
            linker.clone(),
            snapshots,
            safety,
            SpawnResolver::new(settings.default_spawn),
        ));

        let use_cases = UseCases {
            teleport: TeleportUseCases::new(coordinator, gate, search, linker),
        };

        Self {
            world,
            settings,
            use_cases,
        }
    }
}
