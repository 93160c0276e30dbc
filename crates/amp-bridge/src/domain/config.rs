//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is assembled in `main.rs` from three layers, highest priority first:
//!
//! 1. CLI arguments and their environment-variable fallbacks.
//! 2. An optional TOML file ([`FileConfig`]).
//! 3. [`BridgeConfig::default`].
//!
//! Keeping configuration as a plain struct (no global state, no file reads in
//! the domain) lets tests build as many independent bridges as they like.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// All runtime configuration for the amplifier bridge.
///
/// # Example
///
/// ```rust
/// use amp_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.extension_name, "akai_amp");
/// assert_eq!(cfg.ws_bind_addr.port(), 8090);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address the WebSocket gateway binds to.
    pub ws_bind_addr: SocketAddr,

    /// Bus topic owned by this extension.  Requests arrive on it and all
    /// responses are broadcast on it.
    pub extension_name: String,

    /// Path or name of the relay helper program.
    pub helper_program: PathBuf,

    /// Helper arguments that print the relay status.  Used to seed the cache.
    pub status_command: String,

    /// Upper bound on one helper invocation.  `None` waits forever.
    pub command_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    /// | Field           | Default          |
    /// |-----------------|------------------|
    /// | ws_bind_addr    | `0.0.0.0:8090`   |
    /// | extension_name  | `akai_amp`       |
    /// | helper_program  | `akai_amp.py`    |
    /// | status_command  | `status short`   |
    /// | command_timeout | 30 seconds       |
    fn default() -> Self {
        Self {
            ws_bind_addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
            extension_name: "akai_amp".to_string(),
            helper_program: PathBuf::from("akai_amp.py"),
            status_command: "status short".to_string(),
            command_timeout: Some(Duration::from_secs(30)),
        }
    }
}

// ── TOML file schema ──────────────────────────────────────────────────────────

/// Contents of the optional TOML configuration file.
///
/// Every field is optional; anything left out falls through to the built-in
/// default.
///
/// ```toml
/// [server]
/// bind = "127.0.0.1"
/// port = 8090
///
/// [amplifier]
/// extension = "akai_amp"
/// helper_program = "/opt/akai_amp/akai_amp.py"
/// status_command = "status short"
/// command_timeout_secs = 30   # 0 disables the timeout
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub amplifier: AmplifierSection,
}

/// `[server]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// `[amplifier]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmplifierSection {
    pub extension: Option<String>,
    pub helper_program: Option<PathBuf>,
    pub status_command: Option<String>,
    pub command_timeout_secs: Option<u64>,
}

/// Converts a timeout in seconds into the `Option` form used by
/// [`BridgeConfig::command_timeout`]; zero means no timeout.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ws_port_is_8090() {
        // Arrange / Act
        let cfg = BridgeConfig::default();
        // Assert
        assert_eq!(cfg.ws_bind_addr.port(), 8090);
    }

    #[test]
    fn test_default_extension_name() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.extension_name, "akai_amp");
    }

    #[test]
    fn test_default_helper_and_status_command() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.helper_program, PathBuf::from("akai_amp.py"));
        assert_eq!(cfg.status_command, "status short");
    }

    #[test]
    fn test_default_timeout_is_30s() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.command_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_timeout_disables() {
        assert_eq!(timeout_from_secs(0), None);
        assert_eq!(timeout_from_secs(5), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_file_config_parses_full_document() {
        let text = r#"
            [server]
            bind = "127.0.0.1"
            port = 9000

            [amplifier]
            extension = "amp2"
            helper_program = "/usr/local/bin/akai_amp.py"
            status_command = "status long"
            command_timeout_secs = 0
        "#;

        let cfg: FileConfig = toml::from_str(text).unwrap();

        assert_eq!(cfg.server.bind.as_deref(), Some("127.0.0.1"));
        assert_eq!(cfg.server.port, Some(9000));
        assert_eq!(cfg.amplifier.extension.as_deref(), Some("amp2"));
        assert_eq!(
            cfg.amplifier.helper_program,
            Some(PathBuf::from("/usr/local/bin/akai_amp.py"))
        );
        assert_eq!(cfg.amplifier.status_command.as_deref(), Some("status long"));
        assert_eq!(cfg.amplifier.command_timeout_secs, Some(0));
    }

    #[test]
    fn test_file_config_missing_tables_default_to_none() {
        // An empty file is valid: everything falls through to defaults.
        let cfg: FileConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn test_file_config_partial_table() {
        let cfg: FileConfig = toml::from_str("[server]\nport = 7000\n").unwrap();
        assert_eq!(cfg.server.port, Some(7000));
        assert!(cfg.server.bind.is_none());
        assert!(cfg.amplifier.extension.is_none());
    }
}
