use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::auth::jwt::DEFAULT_TOKEN_TTL_SECS;

/// Campus social network backend
///
/// Only flags given on the command line are serialized, so an absent flag
/// never shadows the TOML file or the environment.
#[derive(Parser, Serialize, Clone, Debug)]
#[command(name = "campus-server", version, about = "Campus social network backend")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./campus.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Shared JWT secret. When unset, a random key is kept in data_dir/jwt_secret.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,

    /// Lifetime of issued access tokens in seconds
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_ttl_secs: Option<i64>,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    pub data_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    /// Lifetime of access tokens minted by login and register
    pub token_ttl_secs: i64,
    /// Chat relay keepalive settings (loaded from [relay] section in TOML)
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Keepalive tuning for WebSocket chat connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Seconds between server pings (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval(),
            pong_timeout_secs: default_pong_timeout(),
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            data_dir: "./data".to_string(),
            jwt_secret: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            relay: RelayConfig::default(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (CAMPUS_*) < CLI args
    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        Self::figment(&cli.config, cli).extract()
    }

    fn figment(config_path: &str, cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CAMPUS_"))
            .merge(Serialized::defaults(cli))
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Campus Server Configuration
# Place this file at ./campus.toml or specify with --config <path>
# All settings can be overridden via environment variables (CAMPUS_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and generated JWT key
# data_dir = "./data"

# Shared HS256 secret used to sign and verify access tokens.
# Leave unset to generate a random key on first boot.
# jwt_secret = ""

# Access token lifetime in seconds (default: 86400 = 24 hours)
# token_ttl_secs = 86400

# ---- Chat Relay ----
# [relay]
# ping_interval_secs = 30
# pong_timeout_secs = 10
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("campus-server").chain(args.iter().copied()))
    }

    #[test]
    fn toml_applies_when_no_flags_given() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "campus.toml",
                r#"
                port = 9000
                jwt_secret = "fromtoml"

                [relay]
                ping_interval_secs = 5
                "#,
            )?;

            let config: Config = Config::figment("campus.toml", &cli(&[])).extract()?;

            assert_eq!(config.port, 9000);
            assert_eq!(config.jwt_secret.as_deref(), Some("fromtoml"));
            assert_eq!(config.bind_address, "0.0.0.0");
            assert_eq!(config.relay.ping_interval_secs, 5);
            assert_eq!(config.relay.pong_timeout_secs, 10);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("campus.toml", "data_dir = \"/from/toml\"\nport = 9000")?;
            jail.set_env("CAMPUS_DATA_DIR", "/from/env");

            let config: Config = Config::figment("campus.toml", &cli(&[])).extract()?;

            assert_eq!(config.data_dir, "/from/env");
            assert_eq!(config.port, 9000);
            Ok(())
        });
    }

    #[test]
    fn cli_flags_override_env_and_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("campus.toml", "port = 9000\ntoken_ttl_secs = 60")?;
            jail.set_env("CAMPUS_PORT", "9100");

            let config: Config = Config::figment(
                "campus.toml",
                &cli(&["--port", "9200", "--json-logs"]),
            )
            .extract()?;

            assert_eq!(config.port, 9200);
            assert!(config.json_logs);
            assert_eq!(config.token_ttl_secs, 60);
            Ok(())
        });
    }

    #[test]
    fn config_path_and_generate_flag_stay_out_of_the_layers() {
        let parsed = cli(&["--config", "/etc/campus.toml", "--generate-config"]);
        assert_eq!(parsed.config, "/etc/campus.toml");
        assert!(parsed.generate_config);

        let value = serde_json::to_value(&parsed).unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn template_mentions_relay_section() {
        let template = generate_config_template();
        assert!(template.contains("[relay]"));
        assert!(template.contains("jwt_secret"));
    }
}
