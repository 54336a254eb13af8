use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer. Empty means any origin.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    pub backend: String, // "http" or "duckdb"
    /// Base URL of the hosted store's RPC endpoints (http backend).
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Database file opened read-only (duckdb backend).
    pub database_path: String,
    pub pool_size: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub row_cap: usize,
    pub history_turns: usize,
    pub answer_sample_rows: usize,
    pub schema_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Optional TOML file replacing the built-in knowledge base.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryLogConfig {
    pub sink: String, // "tracing" or "file"
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String, // "text" or "json"
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub gateway: GatewayConfig,
    pub pipeline: PipelineConfig,
    pub knowledge: KnowledgeConfig,
    pub query_log: QueryLogConfig,
    pub logging: LoggingConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log output format (text or json)
    #[arg(long)]
    pub log_format: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder();

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nl-report/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // NL_REPORT__LLM__API_KEY, NL_REPORT__GATEWAY__BASE_URL, ...
        config_builder = config_builder.add_source(
            Environment::with_prefix("NL_REPORT")
                .prefix_separator("__")
                .separator("__"),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(format) = &args.log_format {
            config.logging.format = format.clone();
        }

        Ok(config)
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: "remote".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            api_url: Some("https://api.openai.com/v1/chat/completions".to_string()),
            temperature: 0.1,
            max_tokens: 2000,
            timeout_secs: 60,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend: "http".to_string(),
            base_url: None,
            api_key: None,
            database_path: "reports.duckdb".to_string(),
            pool_size: 4,
            timeout_secs: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            row_cap: 1000,
            history_turns: 6,
            answer_sample_rows: 20,
            schema_timeout_secs: 15,
        }
    }
}

impl Default for QueryLogConfig {
    fn default() -> Self {
        Self {
            sink: "tracing".to_string(),
            path: PathBuf::from("query-log.jsonl"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(path: &Path) -> CliArgs {
        CliArgs {
            config: Some(path.to_path_buf()),
            host: None,
            port: Some(8088),
            log_format: None,
        }
    }

    #[test]
    fn file_values_merge_with_defaults_and_cli_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nbackend = \"ollama\"\nmodel = \"qwen2.5-coder\"\n\n[pipeline]\nrow_cap = 250\n"
        )
        .unwrap();

        let config = AppConfig::new(&args_for(file.path())).unwrap();

        assert_eq!(config.llm.backend, "ollama");
        assert_eq!(config.llm.model, "qwen2.5-coder");
        assert_eq!(config.pipeline.row_cap, 250);
        assert_eq!(config.pipeline.history_turns, 6);
        assert_eq!(config.gateway.backend, "http");
        assert_eq!(config.web.port, 8088);
        assert!(config.llm.api_key.is_none());
    }
}
