//! Runtime configuration: an optional TOML file overlaid by command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use kubernetes::{KubeConfig, TokenSource};
use serde::Deserialize;
use subscriptions::{AnnotationKeySelector, Namespace, DEFAULT_MAX_CONFLICT_RETRIES};

/// Notifications bot - manage Argo CD notification subscriptions over HTTP
#[derive(Parser, Debug)]
#[command(name = "notifications-bot")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on (overrides `server.port`)
    #[arg(long)]
    pub port: Option<u16>,

    /// Namespace holding applications and projects (overrides `kubernetes.namespace`)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Log filter (trace, debug, info, warn, error, or an `EnvFilter` directive)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format (overrides `telemetry.log_format`)
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// OTLP gRPC endpoint for trace export (overrides `telemetry.otlp_endpoint`)
    #[arg(long)]
    pub otlp_endpoint: Option<String>,
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// API server connection settings.
    pub kubernetes: KubernetesConfig,
    /// Subscription behaviour.
    pub subscriptions: SubscriptionsConfig,
    /// Logging and tracing.
    pub telemetry: TelemetryConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Port bound on all interfaces.
    pub port: u16,
    /// Path the JSON adapter is registered on.
    pub adapter_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            adapter_path: "/commands".to_string(),
        }
    }
}

/// API server connection settings.
///
/// With no `api_server` the in-cluster service account is used and the other
/// fields override its defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KubernetesConfig {
    /// Namespace holding applications and projects.
    pub namespace: Option<String>,
    /// API server base URL, e.g. `http://127.0.0.1:8001` behind `kubectl proxy`.
    pub api_server: Option<String>,
    /// Bearer token file.
    pub token_file: Option<PathBuf>,
    /// Extra CA bundle to trust.
    pub ca_file: Option<PathBuf>,
}

/// Subscription behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubscriptionsConfig {
    /// Which keys an unsubscribe without a trigger touches.
    pub key_selector: AnnotationKeySelector,
    /// Re-read/re-apply attempts after a write conflict.
    pub max_conflict_retries: u32,
}

impl Default for SubscriptionsConfig {
    fn default() -> Self {
        Self {
            key_selector: AnnotationKeySelector::default(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

/// Logging and tracing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Log output format.
    pub log_format: LogFormat,
    /// OTLP endpoint; trace export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl BotConfig {
    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                Self::from_toml(&content).with_context(|| format!("invalid config file {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Parses a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Applies command-line overrides.
    #[must_use]
    pub fn with_overrides(mut self, args: &Args) -> Self {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(namespace) = &args.namespace {
            self.kubernetes.namespace = Some(namespace.clone());
        }
        if let Some(format) = args.log_format {
            self.telemetry.log_format = format;
        }
        if let Some(endpoint) = &args.otlp_endpoint {
            self.telemetry.otlp_endpoint = Some(endpoint.clone());
        }
        self
    }

    /// Resolves the API server connection.
    pub fn kube_config(&self) -> Result<KubeConfig> {
        let k = &self.kubernetes;
        let namespace = k.namespace.as_deref().and_then(Namespace::new);
        let mut config = match &k.api_server {
            Some(api_server) => {
                let Some(namespace) = namespace else {
                    bail!("kubernetes.namespace is required when kubernetes.api_server is set");
                };
                KubeConfig {
                    api_server: api_server.clone(),
                    namespace,
                    token: TokenSource::None,
                    ca_file: None,
                }
            }
            None => KubeConfig::in_cluster(namespace).context("failed to load in-cluster configuration")?,
        };
        if let Some(token_file) = &k.token_file {
            config.token = TokenSource::File(token_file.clone());
        }
        if let Some(ca_file) = &k.ca_file {
            config.ca_file = Some(ca_file.clone());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BotConfig::from_toml("").unwrap();
        assert_eq!(config, BotConfig::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.adapter_path, "/commands");
        assert_eq!(config.subscriptions.key_selector, AnnotationKeySelector::AllScopes);
        assert_eq!(config.subscriptions.max_conflict_retries, 5);
    }

    #[test]
    fn test_full_file() {
        let config = BotConfig::from_toml(
            r#"
            [server]
            port = 9090
            adapter_path = "/api/commands"

            [kubernetes]
            namespace = "argocd"
            api_server = "http://127.0.0.1:8001"

            [subscriptions]
            key_selector = "exact_scope"
            max_conflict_retries = 2

            [telemetry]
            log_format = "json"
            otlp_endpoint = "http://collector:4317"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.subscriptions.key_selector, AnnotationKeySelector::ExactScope);
        assert_eq!(config.telemetry.log_format, LogFormat::Json);

        let kube = config.kube_config().unwrap();
        assert_eq!(kube.api_server, "http://127.0.0.1:8001");
        assert_eq!(kube.namespace.as_str(), "argocd");
        assert_eq!(kube.token, TokenSource::None);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(BotConfig::from_toml("[server]\nprot = 1\n").is_err());
    }

    #[test]
    fn test_explicit_api_server_requires_namespace() {
        let config = BotConfig::from_toml("[kubernetes]\napi_server = \"http://localhost:8001\"\n").unwrap();
        assert!(config.kube_config().is_err());
    }

    #[test]
    fn test_token_file_override() {
        let config = BotConfig::from_toml(
            "[kubernetes]\nnamespace = \"argocd\"\napi_server = \"https://k8s\"\ntoken_file = \"/tmp/token\"\n",
        )
        .unwrap();
        assert_eq!(
            config.kube_config().unwrap().token,
            TokenSource::File(PathBuf::from("/tmp/token"))
        );
    }

    #[test]
    fn test_flags_override_file() {
        let args = Args::parse_from([
            "notifications-bot",
            "--port",
            "7000",
            "--namespace",
            "argo",
            "--log-format",
            "json",
        ]);
        let config = BotConfig::default().with_overrides(&args);
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.kubernetes.namespace.as_deref(), Some("argo"));
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert_eq!(config.telemetry.otlp_endpoint, None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        std::fs::write(&path, "[server]\nport = 1234\n").unwrap();
        assert_eq!(BotConfig::load(Some(&path)).unwrap().server.port, 1234);
        assert!(BotConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
