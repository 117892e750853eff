// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deep integration tests for `scout-config`'s layered resolver.

use scout_config::{ConfigKey, ConfigValue, LogLevel, Resolver, UriReporting};
use std::sync::Mutex;

/// Environment mutation is process-global; every test that touches
/// `SCOUT_*`/`HEROKU_SLUG_COMMIT` must hold this for its duration.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_scout_env() {
    for key in ConfigKey::ALL {
        unsafe {
            std::env::remove_var(key.env_var_name());
        }
    }
    unsafe {
        std::env::remove_var("HEROKU_SLUG_COMMIT");
    }
}

// ---------------------------------------------------------------------------
// 1. Four-source precedence, end to end
// ---------------------------------------------------------------------------

#[test]
fn precedence_env_beats_node_beats_derived_beats_default() {
    let _g = ENV_LOCK.lock().unwrap();
    clear_scout_env();

    let resolver = Resolver::new();

    // Nothing set anywhere: Default answers.
    assert_eq!(
        resolver.get(ConfigKey::CoreAgentVersion).unwrap().as_str(),
        Some("v1.2.7")
    );

    // Node overrides Default.
    resolver
        .set(ConfigKey::CoreAgentVersion, ConfigValue::Str("v3.0.0".into()))
        .unwrap();
    assert_eq!(
        resolver.get(ConfigKey::CoreAgentVersion).unwrap().as_str(),
        Some("v3.0.0")
    );

    // Env overrides Node.
    unsafe {
        std::env::set_var("SCOUT_CORE_AGENT_VERSION", "v4.0.0");
    }
    assert_eq!(
        resolver.get(ConfigKey::CoreAgentVersion).unwrap().as_str(),
        Some("v4.0.0")
    );

    unsafe {
        std::env::remove_var("SCOUT_CORE_AGENT_VERSION");
    }
    assert_eq!(
        resolver.get(ConfigKey::CoreAgentVersion).unwrap().as_str(),
        Some("v3.0.0")
    );
}

#[test]
fn derived_socket_path_sits_between_node_and_default() {
    let _g = ENV_LOCK.lock().unwrap();
    clear_scout_env();

    let resolver = Resolver::new();
    resolver
        .set(ConfigKey::CoreAgentDir, ConfigValue::Str("/var/scout".into()))
        .unwrap();

    // No explicit socketPath: Derived computes one from coreAgentDir.
    let derived = resolver
        .get(ConfigKey::SocketPath)
        .unwrap()
        .as_str()
        .unwrap()
        .to_string();
    assert!(derived.starts_with("/var/scout/scout_apm_core-"));

    // Explicit Node value takes priority over the Derived fallback.
    resolver
        .set(ConfigKey::SocketPath, ConfigValue::Str("/run/scout.sock".into()))
        .unwrap();
    assert_eq!(
        resolver.get(ConfigKey::SocketPath).unwrap().as_str(),
        Some("/run/scout.sock")
    );
}

// ---------------------------------------------------------------------------
// 2. Env parsing table, one case per ValueKind
// ---------------------------------------------------------------------------

#[test]
fn env_parsing_covers_every_value_kind() {
    let _g = ENV_LOCK.lock().unwrap();
    clear_scout_env();
    let resolver = Resolver::new();

    unsafe {
        std::env::set_var("SCOUT_NAME", "checkout-service");
        std::env::set_var("SCOUT_MONITOR", "true");
        std::env::set_var("SCOUT_CORE_AGENT_PERMISSIONS", "448");
        std::env::set_var("SCOUT_DISABLED_INSTRUMENTS", "Net::HTTP,Redis");
        std::env::set_var("SCOUT_LOG_LEVEL", "warn");
        std::env::set_var("SCOUT_URI_REPORTING", "path");
    }

    assert_eq!(
        resolver.get(ConfigKey::Name).unwrap().as_str(),
        Some("checkout-service")
    );
    assert_eq!(resolver.get(ConfigKey::Monitor).unwrap().as_bool(), Some(true));
    assert_eq!(
        resolver.get(ConfigKey::CoreAgentPermissions).unwrap().as_int(),
        Some(448)
    );
    assert_eq!(
        resolver.get(ConfigKey::DisabledInstruments).unwrap().as_string_list(),
        Some(["Net::HTTP".to_string(), "Redis".to_string()].as_slice())
    );
    assert_eq!(
        resolver.get(ConfigKey::LogLevel).unwrap().as_log_level(),
        Some(LogLevel::Warn)
    );
    assert_eq!(
        resolver.get(ConfigKey::UriReporting).unwrap().as_uri_reporting(),
        Some(UriReporting::Path)
    );

    clear_scout_env();
}

#[test]
fn malformed_env_int_is_treated_as_absent_and_falls_through() {
    let _g = ENV_LOCK.lock().unwrap();
    clear_scout_env();
    let resolver = Resolver::new();
    unsafe {
        std::env::set_var("SCOUT_CORE_AGENT_PERMISSIONS", "not-a-number");
    }
    // Falls through past Env (which can't parse it) all the way to Default.
    assert_eq!(
        resolver.get(ConfigKey::CoreAgentPermissions).unwrap().as_int(),
        Some(0o700)
    );
    unsafe {
        std::env::remove_var("SCOUT_CORE_AGENT_PERMISSIONS");
    }
}

// ---------------------------------------------------------------------------
// 3. TOML overlay interaction
// ---------------------------------------------------------------------------

#[test]
fn overlay_config_scenario_matches_layered_precedence() {
    let _g = ENV_LOCK.lock().unwrap();
    clear_scout_env();

    let resolver = Resolver::with_toml_overlay(
        r#"
        name = "overlay-app"
        coreAgentVersion = "v5.5.5"
        monitor = true
        ignore = ["/health", "/ping"]
        "#,
    )
    .unwrap();

    // Overlay fills in for Default.
    assert_eq!(resolver.get(ConfigKey::Name).unwrap().as_str(), Some("overlay-app"));
    assert_eq!(
        resolver.get(ConfigKey::CoreAgentVersion).unwrap().as_str(),
        Some("v5.5.5")
    );
    assert_eq!(
        resolver.get(ConfigKey::Ignore).unwrap().as_string_list(),
        Some(["/health".to_string(), "/ping".to_string()].as_slice())
    );

    // Node still outranks the overlay.
    resolver
        .set(ConfigKey::Name, ConfigValue::Str("node-app".into()))
        .unwrap();
    assert_eq!(resolver.get(ConfigKey::Name).unwrap().as_str(), Some("node-app"));

    // Env still outranks everything.
    unsafe {
        std::env::set_var("SCOUT_NAME", "env-app");
    }
    assert_eq!(resolver.get(ConfigKey::Name).unwrap().as_str(), Some("env-app"));
    unsafe {
        std::env::remove_var("SCOUT_NAME");
    }
}

#[test]
fn overlay_with_wrong_shaped_value_is_ignored_not_fatal() {
    let resolver = Resolver::with_toml_overlay(r#"monitor = "not-a-bool""#).unwrap();
    // Type mismatch between overlay and ValueKind falls through to static Default.
    assert_eq!(resolver.get(ConfigKey::Monitor).unwrap().as_bool(), Some(false));
}

// ---------------------------------------------------------------------------
// 4. Snapshot materialization end to end
// ---------------------------------------------------------------------------

#[test]
fn snapshot_end_to_end_scenario() {
    let _g = ENV_LOCK.lock().unwrap();
    clear_scout_env();

    let resolver = Resolver::new();
    resolver.set(ConfigKey::Name, ConfigValue::Str("demo".into())).unwrap();
    resolver.set(ConfigKey::Key, ConfigValue::Str("abcd1234".into())).unwrap();
    unsafe {
        std::env::set_var("SCOUT_MONITOR", "true");
    }

    let cfg = resolver.snapshot();
    assert_eq!(cfg.name, "demo");
    assert_eq!(cfg.key, "abcd1234");
    assert!(cfg.monitor);
    assert_eq!(cfg.api_version, "1.0");
    assert!(!cfg.core_agent_triple.is_empty());
    assert!(cfg.core_agent_full_name.starts_with("scout_apm_core-"));

    unsafe {
        std::env::remove_var("SCOUT_MONITOR");
    }
}

// ---------------------------------------------------------------------------
// 5. Derive-only keys reject set()
// ---------------------------------------------------------------------------

#[test]
fn derive_only_keys_cannot_be_overridden() {
    let resolver = Resolver::new();
    for key in [ConfigKey::CoreAgentTriple, ConfigKey::CoreAgentFullName] {
        let err = resolver
            .set(key, ConfigValue::Str("whatever".into()))
            .unwrap_err();
        assert_eq!(err.code, scout_error::ErrorCode::NotSupported);
    }
}

#[test]
fn every_key_has_a_property_name_distinct_from_every_other() {
    let names: std::collections::BTreeSet<_> =
        ConfigKey::ALL.iter().map(|k| k.property_name()).collect();
    assert_eq!(names.len(), ConfigKey::ALL.len());
}
