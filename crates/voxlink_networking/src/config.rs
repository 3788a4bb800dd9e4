//! # Configuration
//!
//! Server and client settings, loaded once at startup from TOML. Missing
//! keys take their defaults.
//!
//! ```toml
//! tick_rate = 20
//! bind_address = "0.0.0.0:25600"
//! view_radius = 2
//! max_players = 64
//! compress_chunks = true
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{NetError, NetResult};
use crate::protocol::PROTOCOL_VERSION;

/// Default server tick rate (Hz).
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Default port for dedicated servers.
pub const DEFAULT_PORT: u16 = 25600;

/// Server settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Address the TCP listener binds.
    pub bind_address: String,
    /// Chunks sent around spawn, per axis.
    pub view_radius: u32,
    /// Connected player limit.
    pub max_players: usize,
    /// Version clients must match.
    pub protocol_version: u32,
    /// LZ4-compress chunk payloads.
    pub compress_chunks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            bind_address: format!("0.0.0.0:{DEFAULT_PORT}"),
            view_radius: 2,
            max_players: 64,
            protocol_version: PROTOCOL_VERSION,
            compress_chunks: true,
        }
    }
}

impl ServerConfig {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConfig`] on syntax errors, unknown keys, a zero
    /// tick rate or a zero player limit.
    pub fn from_toml_str(text: &str) -> NetResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| NetError::InvalidConfig(format!("server config: {e}")))?;
        if config.tick_rate == 0 {
            return Err(NetError::InvalidConfig("tick_rate must be positive".into()));
        }
        if config.max_players == 0 {
            return Err(NetError::InvalidConfig("max_players must be positive".into()));
        }
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> NetResult<Self> {
        Self::from_toml_str(&read_config(path.as_ref())?)
    }
}

/// Client settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Server to connect to.
    pub server_address: String,
    /// Name sent in the hello.
    pub player_name: String,
    /// Version announced to the server.
    pub protocol_version: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: format!("127.0.0.1:{DEFAULT_PORT}"),
            player_name: "player".into(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

impl ClientConfig {
    /// Config with a player name and every other field defaulted.
    #[must_use]
    pub fn named(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            ..Self::default()
        }
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConfig`] on syntax errors, unknown keys or an
    /// empty player name.
    pub fn from_toml_str(text: &str) -> NetResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| NetError::InvalidConfig(format!("client config: {e}")))?;
        if config.player_name.is_empty() {
            return Err(NetError::InvalidConfig("player_name must not be empty".into()));
        }
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> NetResult<Self> {
        Self::from_toml_str(&read_config(path.as_ref())?)
    }
}

fn read_config(path: &Path) -> NetResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| NetError::InvalidConfig(format!("failed to read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_default() {
        let config = ServerConfig::from_toml_str("view_radius = 4").unwrap();
        assert_eq!(config.view_radius, 4);
        assert_eq!(config.tick_rate, DEFAULT_TICK_RATE);
        assert!(config.compress_chunks);
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ServerConfig::from_toml_str("tick_rate = 0"),
            Err(NetError::InvalidConfig(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml_str("tick_rat = 5"),
            Err(NetError::InvalidConfig(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("player_name = \"\""),
            Err(NetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_client_config() {
        let config = ClientConfig::from_toml_str(
            "player_name = \"ada\"\nserver_address = \"10.0.0.1:25600\"",
        )
        .unwrap();
        assert_eq!(config, ClientConfig {
            server_address: "10.0.0.1:25600".into(),
            ..ClientConfig::named("ada")
        });
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ServerConfig::load("/nonexistent/voxlink.toml"),
            Err(NetError::InvalidConfig(_))
        ));
    }
}
