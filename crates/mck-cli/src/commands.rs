use anyhow::Context;
use colored::Colorize;
use tracing::info;

use mck_server::{MockchainServer, NodeConfig};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Config(args) => cmd_config(args, &cli.format),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<NodeConfig> {
    match path {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("reading configuration from {}", path.display())),
        None => Ok(NodeConfig::default()),
    }
}

fn effective_config(args: &ServeArgs) -> anyhow::Result<NodeConfig> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = &args.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind:?}"))?;
    }
    if let Some(workers) = args.workers {
        config.derivation_workers = workers;
    }
    Ok(config)
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = effective_config(&args)?;
    println!(
        "{} Mockchain node on {} ({} derivation workers)",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        config.derivation_workers.to_string().cyan(),
    );
    if let Some(retention) = config.channel_retention {
        println!("  Channel retention: {} events", retention.to_string().yellow());
    }
    info!(
        bind = %config.bind_addr,
        workers = config.derivation_workers,
        retention = ?config.channel_retention,
        config_file = ?args.config,
        "starting node"
    );

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(async move {
        let server = MockchainServer::new(config);
        server.serve().await
    })?;
    Ok(())
}

fn cmd_config(args: ConfigArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    match format {
        OutputFormat::Text => print!("{}", config.to_toml()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn serve_args(bind: Option<&str>, workers: Option<usize>) -> ServeArgs {
        ServeArgs {
            config: None,
            bind: bind.map(str::to_string),
            workers,
        }
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let config = effective_config(&serve_args(Some("0.0.0.0:9999"), Some(3))).unwrap();
        assert_eq!(config.bind_addr.port(), 9999);
        assert_eq!(config.derivation_workers, 3);
        assert_eq!(config.keep_alive_secs, NodeConfig::default().keep_alive_secs);
    }

    #[test]
    fn bad_bind_address_is_reported() {
        let err = effective_config(&serve_args(Some("nowhere"), None)).unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_config(Some(&PathBuf::from("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("here.toml"));
    }
}
