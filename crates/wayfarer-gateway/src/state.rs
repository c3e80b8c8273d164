//! Gateway shared state.

use std::sync::Arc;

use tracing::info;

use wayfarer_agent::PlanAgent;
use wayfarer_core::config::Config;
use wayfarer_providers::build_provider;
use wayfarer_tools::{register_builtin_tools, ToolRegistry};

/// Read-only state shared by every handler.
pub struct AppState {
    pub config: Arc<Config>,
    pub agent: PlanAgent,
    #[cfg(feature = "metrics")]
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Arc<Config>, agent: PlanAgent) -> Self {
        Self {
            config,
            agent,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Build the provider and tool registry described by `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let provider_config = config.active_provider();
        let (provider, credentials) = build_provider(&provider_config)?;

        let mut tools = ToolRegistry::new();
        register_builtin_tools(&mut tools);
        info!(
            provider = %provider.id(),
            model = %config.default_model(),
            tools = ?tools.list(),
            "Planner ready"
        );

        let agent = PlanAgent::new(config.clone(), Arc::new(tools), provider, credentials);
        Ok(Self::new(config, agent))
    }
}
