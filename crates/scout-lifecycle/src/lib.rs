// SPDX-License-Identifier: MIT OR Apache-2.0
//! scout-lifecycle
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Orchestrates the core agent's lifecycle: spawn-or-attach, connect,
//! register, and the idempotent `setup()`/`shutdown()` contract. See spec
//! §4.E.

pub mod downloader;
pub mod spawn;
pub mod state;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use scout_config::{ConfigKey, Resolver, ScoutConfig};
use scout_error::{ErrorCode, ScoutError};
use scout_protocol::builder::AgentRequestBuilder;
use scout_transport::{probe_agent_exists, select_target, AgentConnection, SocketTarget};
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub use downloader::{binary_path, DownloadOptions, Downloader};
pub use state::LifecycleState;

use state::StateCell;

/// Result of a completed [`Lifecycle::setup`]: the live connection plus the
/// config snapshot it was built from.
#[derive(Clone)]
pub struct Handle {
    /// The connected socket to the core agent.
    pub connection: Arc<AgentConnection>,
    /// The configuration snapshot `setup` resolved against.
    pub config: ScoutConfig,
}

/// Orchestrates the path to [`LifecycleState::Ready`] and back, per spec
/// §4.E.
pub struct Lifecycle {
    resolver: Resolver,
    downloader: Option<Arc<dyn Downloader>>,
    app_meta: Option<serde_json::Value>,
    state: StateCell,
    init: OnceCell<Result<Handle, Arc<ScoutError>>>,
    shutting_down: AtomicBool,
}

impl Lifecycle {
    /// Build a lifecycle manager over `resolver`, with an optional
    /// [`Downloader`] (required only when `coreAgentLaunch` is `true`).
    #[must_use]
    pub fn new(resolver: Resolver, downloader: Option<Arc<dyn Downloader>>) -> Self {
        Self {
            resolver,
            downloader,
            app_meta: None,
            state: StateCell::new(LifecycleState::Uninitialized),
            init: OnceCell::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Merge extra top-level keys (e.g. `framework`/`framework_version`)
    /// into the `ApplicationEvent(ScoutMetadata, ...)` step 4 sends — the
    /// `appMeta` Engine constructor option (spec §6 public API surface).
    #[must_use]
    pub fn with_app_meta(mut self, app_meta: serde_json::Value) -> Self {
        self.app_meta = Some(app_meta);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    /// Run `setup()`'s orchestration steps 1–4 (spawn-or-attach, connect,
    /// warn, register), then invoke `post_connect` exactly once with the
    /// resulting connection — the caller's hook point for steps 5–7
    /// (exception handler installation, active-instance registration, stats
    /// ticker startup), which live outside this crate's dependency scope.
    ///
    /// Idempotent: concurrent callers observe a single run of both the setup
    /// steps and `post_connect`, and share its result. Once failed, this
    /// [`Lifecycle`] stays [`LifecycleState::Failed`]; construct a new one to
    /// retry (spec's "terminal unless reset").
    ///
    /// # Errors
    ///
    /// Returns the same error to every concurrent caller if setup fails.
    pub async fn setup<F, Fut>(&self, post_connect: F) -> Result<Handle, Arc<ScoutError>>
    where
        F: FnOnce(Arc<AgentConnection>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let result = self
            .init
            .get_or_init(move || async move {
                self.state.store(LifecycleState::Connecting);
                match self.do_setup(post_connect).await {
                    Ok(handle) => {
                        self.state.store(LifecycleState::Ready);
                        Ok(handle)
                    }
                    Err(e) => {
                        self.state.store(LifecycleState::Failed);
                        Err(Arc::new(e))
                    }
                }
            })
            .await;
        result.clone()
    }

    /// Non-blocking readiness check. Returns `Ok(())` once `setup()` has
    /// completed successfully; fails fast with [`ErrorCode::InstanceNotReady`]
    /// otherwise, without awaiting an in-flight `setup()`.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::InstanceNotReady`] if setup hasn't finished (including
    /// while it is still in progress).
    pub fn require_ready(&self) -> Result<(), ScoutError> {
        match self.state.load() {
            LifecycleState::Ready => Ok(()),
            other => Err(ScoutError::new(
                ErrorCode::InstanceNotReady,
                format!("lifecycle is not ready (state: {other})"),
            )),
        }
    }

    async fn do_setup<F, Fut>(&self, post_connect: F) -> Result<Handle, ScoutError>
    where
        F: FnOnce(Arc<AgentConnection>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let config = self.resolver.snapshot();

        // Step 1: spawn-or-attach.
        let explicit_path = self
            .resolver
            .get_explicit(ConfigKey::SocketPath)
            .and_then(|v| v.as_str().map(str::to_string));
        let derived_path = config.socket_path.clone();
        let target = select_target(
            explicit_path.as_deref(),
            derived_path.as_deref(),
            &config.core_agent_version,
        )
        .map_err(ScoutError::from)?;

        if config.core_agent_launch {
            self.launch_core_agent(&config, &target).await?;
        } else if !probe_agent_exists(&target).await {
            // The socket isn't listening. A `core-agent` binary reachable on
            // PATH is not sufficient on its own (attach mode never spawns
            // it), but it's a useful diagnostic for "did you mean to set
            // coreAgentLaunch=true?".
            return Err(ScoutError::new(
                ErrorCode::InvalidConfiguration,
                "coreAgentLaunch is false and no core agent is listening at the configured socket",
            )
            .with_context("core_agent_on_path", scout_which::command_exists("core-agent")));
        }

        // Step 2: connect.
        let connection = AgentConnection::connect(target, config.allow_shutdown)
            .await
            .map_err(ScoutError::from)?;
        let connection = Arc::new(connection);

        // Step 3: warn on empty identity.
        if config.name.is_empty() {
            warn!("scout_apm: application name is empty");
        }
        if config.key.is_empty() {
            warn!("scout_apm: application key is empty");
        }

        // Step 4: Register, then ApplicationEvent(ScoutMetadata).
        connection
            .send(AgentRequestBuilder::register(
                config.name.clone(),
                config.key.clone(),
                config.api_version.clone(),
            ))
            .await
            .map_err(ScoutError::from)?;

        connection
            .send(AgentRequestBuilder::application_event(
                application_metadata(&config, self.app_meta.as_ref()),
                "ScoutMetadata",
                "scout-lifecycle",
                Utc::now(),
            ))
            .await
            .map_err(ScoutError::from)?;

        info!(name = %config.name, "scout_apm: core agent registered");

        // Steps 5–7: delegated to the caller.
        post_connect(Arc::clone(&connection)).await;

        Ok(Handle {
            connection,
            config,
        })
    }

    async fn launch_core_agent(
        &self,
        config: &ScoutConfig,
        target: &SocketTarget,
    ) -> Result<(), ScoutError> {
        let downloader = self.downloader.as_ref().ok_or_else(|| {
            ScoutError::new(
                ErrorCode::InvalidConfiguration,
                "coreAgentLaunch is true but no Downloader was supplied",
            )
        })?;

        let options = DownloadOptions {
            cache_dir: std::path::PathBuf::from(&config.core_agent_dir),
            download_url: config.download_url.clone(),
            disallow_download: !config.core_agent_download,
        };
        let binary = downloader
            .download(&config.core_agent_version, &options)
            .await?;

        let socket_arg = target_socket_arg(target);
        spawn::spawn_core_agent(
            &binary,
            &socket_arg,
            config.core_agent_log_level,
            config.core_agent_permissions,
        )?;
        Ok(())
    }

    /// `shutdown()`: disconnect, optionally `stopProcess` the agent (iff
    /// `allowShutdown`), mark [`LifecycleState::Closed`].
    ///
    /// Idempotent: a second call from any caller observes
    /// [`LifecycleState::Closed`] and returns immediately (spec §5
    /// reentrancy).
    pub async fn shutdown(&self) -> Result<(), ScoutError> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if matches!(
            self.state.load(),
            LifecycleState::Closed | LifecycleState::Uninitialized | LifecycleState::Failed
        ) {
            self.state.store(LifecycleState::Closed);
            return Ok(());
        }

        self.state.store(LifecycleState::ShuttingDown);
        if let Some(Ok(handle)) = self.init.get() {
            handle.connection.disconnect().await.ok();
            if handle.config.allow_shutdown {
                let _ = handle.connection.stop_process().await;
            }
        }
        self.state.store(LifecycleState::Closed);
        Ok(())
    }

    /// `true` once [`Self::shutdown`] has completed (idempotently).
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.state.load() == LifecycleState::Closed
    }
}

fn target_socket_arg(target: &SocketTarget) -> String {
    match target {
        SocketTarget::Unix(path) => path.display().to_string(),
        SocketTarget::Tcp(addr) => format!("tcp://{addr}"),
    }
}

/// Builds the frozen `ApplicationMetadata` record sent once at registration
/// (spec §3): language/runtime identity, the hosting framework and
/// environment, machine/database identity, and the application's own
/// name/libraries/SHA. Fields with no backing `ScoutConfig` source (
/// `framework`, `environment`, `app_server`, `database_engine`,
/// `database_adapter`, `libraries`, `paas`) default empty/absent and are
/// filled in by `app_meta` — the embedder's own knowledge of its stack.
fn application_metadata(config: &ScoutConfig, app_meta: Option<&serde_json::Value>) -> serde_json::Value {
    let mut metadata = serde_json::json!({
        "language": "rust",
        "language_version": env!("CARGO_PKG_RUST_VERSION"),
        "server": Utc::now().to_rfc3339(),
        "framework": "",
        "framework_version": "",
        "environment": "",
        "app_server": "",
        "hostname": config.hostname,
        "database_engine": "",
        "database_adapter": "",
        "application_name": config.name,
        "libraries": Vec::<String>::new(),
        "paas": "",
        "revision_sha": config.revision_sha,
    });
    if let Some(serde_json::Value::Object(extra)) = app_meta {
        if let serde_json::Value::Object(base) = &mut metadata {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_socket_arg_formats_unix_and_tcp() {
        assert_eq!(
            target_socket_arg(&SocketTarget::Unix("/tmp/a.sock".into())),
            "/tmp/a.sock"
        );
        assert_eq!(
            target_socket_arg(&SocketTarget::Tcp("127.0.0.1:6590".parse().unwrap())),
            "tcp://127.0.0.1:6590"
        );
    }

    #[test]
    fn application_metadata_carries_hostname_and_revision() {
        let resolver = Resolver::new();
        resolver
            .set(
                ConfigKey::Hostname,
                scout_config::ConfigValue::Str("host-1".into()),
            )
            .unwrap();
        let config = resolver.snapshot();
        let meta = application_metadata(&config, None);
        assert_eq!(meta["hostname"], "host-1");
        assert_eq!(meta["language"], "rust");
    }

    #[test]
    fn application_metadata_carries_application_name_and_language_version() {
        let resolver = Resolver::new();
        resolver
            .set(ConfigKey::Name, scout_config::ConfigValue::Str("my-app".into()))
            .unwrap();
        let config = resolver.snapshot();
        let meta = application_metadata(&config, None);
        assert_eq!(meta["application_name"], "my-app");
        assert!(meta["language_version"].as_str().is_some_and(|v| !v.is_empty()));
        assert!(meta["server"].as_str().is_some());
    }

    #[test]
    fn application_metadata_merges_app_meta_over_defaults() {
        let resolver = Resolver::new();
        let config = resolver.snapshot();
        let app_meta = serde_json::json!({
            "framework": "axum",
            "framework_version": "0.7.0",
        });
        let meta = application_metadata(&config, Some(&app_meta));
        assert_eq!(meta["framework"], "axum");
        assert_eq!(meta["framework_version"], "0.7.0");
        assert_eq!(meta["language"], "rust");
    }
}
