use std::path::Path;

use anyhow::Context;
use clap::Parser;
use mgate_common::{GatewayConfig, GatewayConfigPatch};

#[derive(Debug, Clone, Parser)]
#[command(name = "mgate", version, about = "Multi-provider LLM gateway")]
pub struct CliArgs {
    /// Path to the JSON provider/plugin/tool-source config file.
    #[arg(long, env = "MGATE_CONFIG")]
    pub config: Option<String>,

    /// Bind host.
    #[arg(long, env = "MGATE_HOST")]
    pub host: Option<String>,

    /// Bind port.
    #[arg(long, env = "MGATE_PORT")]
    pub port: Option<u16>,

    /// Default per-request tool round budget.
    #[arg(long, env = "MGATE_TOOL_ROUND_BUDGET")]
    pub tool_round_budget: Option<u32>,

    /// Concurrency cap for parallel tool-call execution.
    #[arg(long, env = "MGATE_TOOL_CONCURRENCY_CAP")]
    pub tool_concurrency_cap: Option<usize>,
}

/// Parses `CliArgs` from the process's actual argv/env and loads config.
pub async fn bootstrap_from_env() -> anyhow::Result<GatewayConfig> {
    let args = CliArgs::parse();
    bootstrap(args).await
}

/// CLI/ENV > config file precedence, mirroring the teacher's bootstrap
/// layering (clap already resolves CLI-over-ENV per field; the config file
/// supplies everything that isn't a CLI/ENV-overridable scalar).
pub async fn bootstrap(args: CliArgs) -> anyhow::Result<GatewayConfig> {
    let config_path = args.config.clone().unwrap_or_else(|| "mgate.json".to_string());

    let base = if Path::new(&config_path).exists() {
        load_config_file(&config_path)
            .await
            .with_context(|| format!("load config file {config_path}"))?
    } else {
        GatewayConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            providers: Vec::new(),
            tool_sources: Vec::new(),
            plugins: Vec::new(),
            tool_round_budget: 4,
            tool_concurrency_cap: 8,
        }
    };

    let patch = GatewayConfigPatch {
        host: sanitize_optional(args.host),
        port: args.port,
        tool_round_budget: args.tool_round_budget,
        tool_concurrency_cap: args.tool_concurrency_cap,
    };

    let config = patch.apply(base);
    config.validate().context("validate merged config")?;
    Ok(config)
}

async fn load_config_file(path: &str) -> anyhow::Result<GatewayConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {path} as GatewayConfig"))
}

fn sanitize_optional(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed)
}

/// Installs the process-wide `tracing` subscriber, `RUST_LOG`-driven, with
/// the same `fmt` + `EnvFilter` combination the teacher uses at startup.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
