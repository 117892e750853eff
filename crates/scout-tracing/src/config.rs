// SPDX-License-Identifier: MIT OR Apache-2.0
//! The slice of [`scout_config::ScoutConfig`] the tracing engine needs.

use scout_config::{ScoutConfig, UriReporting};

/// Trace-control fields the engine reads on every call — a narrower view
/// than the full `ScoutConfig` so `TracingEngine` doesn't need a dependency
/// on `scout-lifecycle`/`scout-which` just to read three fields.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Ordered path prefixes to ignore, per spec §4.A/§4.G.
    pub ignore: Vec<String>,
    /// How request URIs are reported on the wire.
    pub uri_reporting: UriReporting,
    /// Named instruments this build has disabled.
    pub disabled_instruments: Vec<String>,
    /// Master on/off switch (spec §7 `MonitoringDisabled`): when `false`,
    /// every wire send the engine would otherwise make is swallowed and
    /// logged instead, while request/span bookkeeping and caller callbacks
    /// still run exactly as if monitoring were on.
    pub monitor: bool,
}

impl From<&ScoutConfig> for TracingConfig {
    fn from(config: &ScoutConfig) -> Self {
        Self {
            ignore: config.ignore.clone(),
            uri_reporting: config.uri_reporting,
            disabled_instruments: config.disabled_instruments.clone(),
            monitor: config.monitor,
        }
    }
}
