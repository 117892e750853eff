//! Unified error taxonomy with stable error codes for the Scout APM
//! instrumentation core.
//!
//! Every core error carries an [`ErrorCode`] (a machine-readable, stable
//! string tag), a human-readable message, an optional cause chain, and
//! arbitrary key-value context.  Use the builder returned by
//! [`ScoutError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Config Resolver errors (layered resolution, validation).
    Config,
    /// Agent Lifecycle errors (setup / attach / shutdown).
    Lifecycle,
    /// Agent Connection errors (socket transport).
    Connection,
    /// Tracing Engine errors (request/span operations while disabled).
    Tracing,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Lifecycle => "lifecycle",
            Self::Connection => "connection",
            Self::Tracing => "tracing",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Config --
    /// Write attempted against a field that can only be set at construction.
    NotSupported,
    /// A resolved configuration value failed validation.
    InvalidConfiguration,

    // -- Lifecycle --
    /// An operation that requires a connected core agent was attempted
    /// before `setup` completed, or after it failed.
    NoAgentPresent,
    /// `setup` was polled while another in-flight `setup` has not resolved.
    InstanceNotReady,

    // -- Connection --
    /// The connection was closed, and the operation requires an open one.
    Disconnected,
    /// Opening the socket to the core agent failed.
    ConnectionFailed,
    /// The configured socket path is neither a filesystem path nor a
    /// `tcp://host:port` URL.
    UnknownSocketType,

    // -- Tracing --
    /// A tracing operation was attempted while `monitor` is disabled.
    MonitoringDisabled,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotSupported | Self::InvalidConfiguration => ErrorCategory::Config,

            Self::NoAgentPresent | Self::InstanceNotReady => ErrorCategory::Lifecycle,

            Self::Disconnected | Self::ConnectionFailed | Self::UnknownSocketType => {
                ErrorCategory::Connection
            }

            Self::MonitoringDisabled => ErrorCategory::Tracing,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"NOT_SUPPORTED"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSupported => "NOT_SUPPORTED",
            Self::InvalidConfiguration => "INVALID_CONFIGURATION",
            Self::NoAgentPresent => "NO_AGENT_PRESENT",
            Self::InstanceNotReady => "INSTANCE_NOT_READY",
            Self::Disconnected => "DISCONNECTED",
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::UnknownSocketType => "UNKNOWN_SOCKET_TYPE",
            Self::MonitoringDisabled => "MONITORING_DISABLED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ScoutError
// ---------------------------------------------------------------------------

/// Unified Scout APM error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use scout_error::{ScoutError, ErrorCode};
///
/// let err = ScoutError::new(ErrorCode::ConnectionFailed, "could not reach core agent")
///     .with_context("socket_path", "/tmp/core-agent.sock")
///     .with_context("attempt", 3);
/// ```
pub struct ScoutError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ScoutError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Shorthand for a [`ErrorCode::NotSupported`] error against a named
    /// read-only property.
    pub fn not_supported(property: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::NotSupported,
            format!("'{property}' cannot be set after construction"),
        )
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for ScoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ScoutError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ScoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ScoutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`ScoutError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoutErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&ScoutError> for ScoutErrorDto {
    fn from(err: &ScoutError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<ScoutErrorDto> for ScoutError {
    fn from(dto: ScoutErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    /// All error codes for exhaustive iteration in tests.
    const ALL_CODES: &[ErrorCode] = &[
        ErrorCode::NotSupported,
        ErrorCode::InvalidConfiguration,
        ErrorCode::NoAgentPresent,
        ErrorCode::InstanceNotReady,
        ErrorCode::Disconnected,
        ErrorCode::ConnectionFailed,
        ErrorCode::UnknownSocketType,
        ErrorCode::MonitoringDisabled,
    ];

    // -- Construction & Display -----------------------------------------

    #[test]
    fn basic_construction() {
        let err = ScoutError::new(ErrorCode::Disconnected, "socket closed");
        assert_eq!(err.code, ErrorCode::Disconnected);
        assert_eq!(err.message, "socket closed");
        assert!(err.source.is_none());
        assert!(err.context.is_empty());
    }

    #[test]
    fn display_without_context() {
        let err = ScoutError::new(ErrorCode::NoAgentPresent, "setup has not completed");
        assert_eq!(
            err.to_string(),
            "[NO_AGENT_PRESENT] setup has not completed"
        );
    }

    #[test]
    fn display_with_context() {
        let err = ScoutError::new(ErrorCode::ConnectionFailed, "timed out")
            .with_context("timeout_ms", 5000);
        let s = err.to_string();
        assert!(s.starts_with("[CONNECTION_FAILED] timed out"));
        assert!(s.contains("timeout_ms"));
        assert!(s.contains("5000"));
    }

    #[test]
    fn debug_impl() {
        let err = ScoutError::new(ErrorCode::InvalidConfiguration, "nope");
        let dbg = format!("{err:?}");
        assert!(dbg.contains("InvalidConfiguration"));
        assert!(dbg.contains("nope"));
    }

    #[test]
    fn debug_with_source() {
        let src = io::Error::new(io::ErrorKind::NotFound, "socket file missing");
        let err =
            ScoutError::new(ErrorCode::ConnectionFailed, "connect failed").with_source(src);
        let dbg = format!("{err:?}");
        assert!(dbg.contains("source"));
        assert!(dbg.contains("socket file missing"));
    }

    #[test]
    fn not_supported_helper_names_property() {
        let err = ScoutError::not_supported("coreAgentVersion");
        assert_eq!(err.code, ErrorCode::NotSupported);
        assert!(err.message.contains("coreAgentVersion"));
    }

    // -- Error code categorization --------------------------------------

    #[test]
    fn config_codes_categorised() {
        assert_eq!(ErrorCode::NotSupported.category(), ErrorCategory::Config);
        assert_eq!(
            ErrorCode::InvalidConfiguration.category(),
            ErrorCategory::Config
        );
    }

    #[test]
    fn lifecycle_codes_categorised() {
        assert_eq!(
            ErrorCode::NoAgentPresent.category(),
            ErrorCategory::Lifecycle
        );
        assert_eq!(
            ErrorCode::InstanceNotReady.category(),
            ErrorCategory::Lifecycle
        );
    }

    #[test]
    fn connection_codes_categorised() {
        assert_eq!(ErrorCode::Disconnected.category(), ErrorCategory::Connection);
        assert_eq!(
            ErrorCode::ConnectionFailed.category(),
            ErrorCategory::Connection
        );
        assert_eq!(
            ErrorCode::UnknownSocketType.category(),
            ErrorCategory::Connection
        );
    }

    #[test]
    fn tracing_code_categorised() {
        assert_eq!(
            ErrorCode::MonitoringDisabled.category(),
            ErrorCategory::Tracing
        );
    }

    // -- Builder pattern ------------------------------------------------

    #[test]
    fn builder_with_context_multiple_keys() {
        let err = ScoutError::new(ErrorCode::ConnectionFailed, "timeout")
            .with_context("socket_path", "/tmp/core-agent.sock")
            .with_context("timeout_ms", 30_000)
            .with_context("attempt", 3);
        assert_eq!(err.context.len(), 3);
        assert_eq!(
            err.context["socket_path"],
            serde_json::json!("/tmp/core-agent.sock")
        );
        assert_eq!(err.context["timeout_ms"], serde_json::json!(30_000));
        assert_eq!(err.context["attempt"], serde_json::json!(3));
    }

    #[test]
    fn builder_with_source() {
        let src = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = ScoutError::new(ErrorCode::ConnectionFailed, "denied").with_source(src);
        assert!(err.source.is_some());
        let displayed = err.source.as_ref().unwrap().to_string();
        assert_eq!(displayed, "access denied");
    }

    #[test]
    fn builder_chaining_all() {
        let src = io::Error::other("underlying");
        let err = ScoutError::new(ErrorCode::InvalidConfiguration, "bad config")
            .with_context("file", "scout_apm.toml")
            .with_source(src);
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
        assert_eq!(err.context["file"], serde_json::json!("scout_apm.toml"));
        assert!(err.source.is_some());
    }

    #[test]
    fn category_shorthand() {
        let err = ScoutError::new(ErrorCode::UnknownSocketType, "bad socket path");
        assert_eq!(err.category(), ErrorCategory::Connection);
    }

    // -- Serialization / Deserialization --------------------------------

    #[test]
    fn error_code_serde_roundtrip() {
        let code = ErrorCode::MonitoringDisabled;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, r#""MONITORING_DISABLED""#);
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }

    #[test]
    fn error_category_serde_roundtrip() {
        let cat = ErrorCategory::Lifecycle;
        let json = serde_json::to_string(&cat).unwrap();
        assert_eq!(json, r#""lifecycle""#);
        let back: ErrorCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cat);
    }

    #[test]
    fn dto_roundtrip_without_source() {
        let err = ScoutError::new(ErrorCode::InstanceNotReady, "setup in progress")
            .with_context("state", "connecting");
        let dto: ScoutErrorDto = (&err).into();
        let json = serde_json::to_string(&dto).unwrap();
        let back: ScoutErrorDto = serde_json::from_str(&json).unwrap();
        assert_eq!(dto, back);
        assert!(back.source_message.is_none());
    }

    #[test]
    fn dto_roundtrip_with_source() {
        let src = io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke");
        let err = ScoutError::new(ErrorCode::Disconnected, "pipe gone").with_source(src);
        let dto: ScoutErrorDto = (&err).into();
        assert_eq!(dto.source_message.as_deref(), Some("pipe broke"));
        let json = serde_json::to_string(&dto).unwrap();
        assert!(json.contains("pipe broke"));
    }

    #[test]
    fn dto_to_scout_error() {
        let dto = ScoutErrorDto {
            code: ErrorCode::InvalidConfiguration,
            message: "bad".into(),
            context: BTreeMap::new(),
            source_message: Some("inner".into()),
        };
        let err: ScoutError = dto.into();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
        // Source is lost in DTO → ScoutError conversion (opaque type).
        assert!(err.source.is_none());
    }

    // -- Error chain (source) preservation ------------------------------

    #[test]
    fn std_error_source_chain() {
        let inner = io::Error::new(io::ErrorKind::NotFound, "not found");
        let err = ScoutError::new(ErrorCode::ConnectionFailed, "open").with_source(inner);
        let src = std::error::Error::source(&err).unwrap();
        assert_eq!(src.to_string(), "not found");
    }

    #[test]
    fn std_error_source_none_by_default() {
        let err = ScoutError::new(ErrorCode::MonitoringDisabled, "disabled");
        assert!(std::error::Error::source(&err).is_none());
    }

    // -- Unique string representations ----------------------------------

    #[test]
    fn all_codes_have_unique_as_str() {
        let mut seen = HashSet::new();
        for code in ALL_CODES {
            let s = code.as_str();
            assert!(seen.insert(s), "duplicate as_str value: {s}");
        }
        assert_eq!(seen.len(), ALL_CODES.len());
    }

    #[test]
    fn all_codes_display_matches_as_str() {
        for code in ALL_CODES {
            assert_eq!(code.to_string(), code.as_str());
        }
    }

    #[test]
    fn error_code_count() {
        // Ensure we don't silently drop a variant from ALL_CODES.
        assert_eq!(ALL_CODES.len(), 8);
    }

    #[test]
    fn all_codes_serialize_to_as_str() {
        for code in ALL_CODES {
            let json = serde_json::to_string(code).unwrap();
            let expected = format!(r#""{}""#, code.as_str());
            assert_eq!(json, expected, "mismatch for {code:?}");
        }
    }

    #[test]
    fn error_category_display() {
        assert_eq!(ErrorCategory::Config.to_string(), "config");
        assert_eq!(ErrorCategory::Lifecycle.to_string(), "lifecycle");
        assert_eq!(ErrorCategory::Connection.to_string(), "connection");
        assert_eq!(ErrorCategory::Tracing.to_string(), "tracing");
    }

    #[test]
    fn context_with_nested_json() {
        let err = ScoutError::new(ErrorCode::InvalidConfiguration, "nested")
            .with_context("details", serde_json::json!({"a": 1, "b": [2, 3]}));
        assert_eq!(
            err.context["details"],
            serde_json::json!({"a": 1, "b": [2, 3]})
        );
    }
}
