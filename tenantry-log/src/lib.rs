//! Tenantry Logging
//!
//! Installs the process-wide `tracing` subscriber used by every tenantry
//! crate and defines the audit trail target.
//!
//! # Features
//!
//! - **Environment-controlled**: `TENANTRY_DEBUG=1` enables debug logging
//! - **Structured output**: pretty, compact or JSON formatting
//! - **Audit trail**: fatal bootstrap errors, schema rollbacks and tenant
//!   deletions are emitted on the dedicated [`AUDIT_TARGET`]
//!
//! # Usage
//!
//! ```rust,ignore
//! use tenantry_log::audit;
//!
//! tenantry_log::init();
//!
//! tracing::info!(tenant = "acme", "tenant started");
//! audit!(tenant = "acme", "schema rolled back");
//! audit!(level: WARN, tenant = "acme", "bootstrap aborted");
//! ```
//!
//! # Environment Variables
//!
//! - `TENANTRY_DEBUG=1` - Enable debug logging
//! - `TENANTRY_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `TENANTRY_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `TENANTRY_LOG_COLOR=1|0` - Enable/disable colors
//! - `TENANTRY_LOG_TARGET=1|0` - Include the event target
//!
//! `RUST_LOG`, when set, takes precedence over `TENANTRY_LOG_LEVEL`.

use once_cell::sync::{Lazy, OnceCell};
use std::env;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

#[doc(hidden)]
pub use tracing;

/// Target used for audit-trail events.
pub const AUDIT_TARGET: &str = "tenantry::audit";

// ============================================================================
// Log Levels
// ============================================================================

/// Log level for tenantry logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Parse a level name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Directive understood by `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_directive().to_uppercase())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON lines for log shippers
    Json,
}

impl Format {
    /// Parse a format name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);
static INSTALLED: OnceCell<()> = OnceCell::new();

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether ANSI colors are enabled
    pub color: bool,
    /// Whether to include the event target
    pub target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
            target: true,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let debug = flag("TENANTRY_DEBUG").unwrap_or(false);

        let level = lookup("TENANTRY_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("TENANTRY_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        let color = flag("TENANTRY_LOG_COLOR")
            .unwrap_or_else(|| lookup("NO_COLOR").is_none() && lookup("TERM").is_some());

        let target = flag("TENANTRY_LOG_TARGET").unwrap_or(true);

        Self {
            debug,
            level,
            format,
            color: color && format != Format::Json,
            target,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_directive()))
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Get the configuration resolved from the environment.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

/// Install the global subscriber using the environment configuration.
///
/// Safe to call more than once; only the first call installs anything.
/// A subscriber installed by someone else is left in place.
pub fn init() {
    INSTALLED.get_or_init(|| {
        let _ = try_init_with(config());
    });
}

/// Install the global subscriber with an explicit configuration.
pub fn try_init_with(config: &LogConfig) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(config.filter());

    match config.format {
        Format::Json => registry
            .with(fmt::layer().json().with_target(config.target))
            .try_init(),
        Format::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(config.color)
                    .with_target(config.target),
            )
            .try_init(),
        Format::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_ansi(config.color)
                    .with_target(config.target),
            )
            .try_init(),
    }
}

// ============================================================================
// Macros
// ============================================================================

/// Emit an audit-trail event.
///
/// Defaults to `INFO`; pass `level: WARN` (or any `tracing::Level` constant)
/// to change severity.
///
/// # Example
///
/// ```rust,ignore
/// use tenantry_log::audit;
///
/// audit!(tenant = "acme", module = "blog", "schema dropped");
/// audit!(level: ERROR, tenant = "acme", error = %err, "bootstrap aborted");
/// ```
#[macro_export]
macro_rules! audit {
    (level: $lvl:ident, $($arg:tt)+) => {
        $crate::tracing::event!(
            target: $crate::AUDIT_TARGET,
            $crate::tracing::Level::$lvl,
            $($arg)+
        )
    };
    ($($arg:tt)+) => {
        $crate::tracing::event!(
            target: $crate::AUDIT_TARGET,
            $crate::tracing::Level::INFO,
            $($arg)+
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Off);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("debug"), Some(Level::Debug));
        assert_eq!(Level::parse("WARNING"), Some(Level::Warn));
        assert_eq!(Level::parse("none"), Some(Level::Off));
        assert_eq!(Level::parse("loud"), None);
        assert_eq!(Level::Warn.to_string(), "WARN");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(Format::parse("pretty"), Some(Format::Pretty));
        assert_eq!(Format::parse(" Compact "), Some(Format::Compact));
        assert_eq!(Format::parse("json"), Some(Format::Json));
        assert_eq!(Format::parse("xml"), None);
    }

    #[test]
    fn test_config_defaults() {
        let config = LogConfig::from_lookup(lookup(&[]));
        assert!(!config.debug);
        assert_eq!(config.level, Level::Info);
        assert_eq!(config.format, Format::Json);
        assert!(!config.color);
        assert!(config.target);
    }

    #[test]
    fn test_debug_flag_lowers_default_level() {
        let config = LogConfig::from_lookup(lookup(&[("TENANTRY_DEBUG", "true")]));
        assert!(config.debug);
        assert_eq!(config.level, Level::Debug);

        let explicit = LogConfig::from_lookup(lookup(&[
            ("TENANTRY_DEBUG", "1"),
            ("TENANTRY_LOG_LEVEL", "error"),
        ]));
        assert_eq!(explicit.level, Level::Error);
    }

    #[test]
    fn test_json_never_colored() {
        let config = LogConfig::from_lookup(lookup(&[
            ("TENANTRY_LOG_FORMAT", "json"),
            ("TENANTRY_LOG_COLOR", "1"),
        ]));
        assert!(!config.color);

        let pretty = LogConfig::from_lookup(lookup(&[
            ("TENANTRY_LOG_FORMAT", "pretty"),
            ("TENANTRY_LOG_COLOR", "1"),
        ]));
        assert!(pretty.color);
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        audit!(tenant = "acme", "audit event");
        audit!(level: WARN, tenant = "acme", "audit warning");
    }
}
