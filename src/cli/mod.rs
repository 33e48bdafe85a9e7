//! Command-line interface.
//!
//! Subcommands operate directly on the database in the configured data directory:
//! - `serve` - Run the key API server (default when no subcommand is given)
//! - `import keys|hosts|accounts` - Bulk import into the inventory
//! - `resolve` - Print the key export document for all or filtered hosts
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::db::{self, DbPool};
use crate::engine::{export, HostFilter};
use crate::importer::{self, ImportReport};
use crate::inventory::Inventory;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "skm")]
#[command(author, version, about = "SSH key manager: resolves which public keys each host account trusts", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "SKM_CONFIG", default_value = "skm.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the key API server
    Serve,

    /// Bulk import commands
    #[command(subcommand)]
    Import(ImportCommands),

    /// Print the resolved keys of every host as JSON
    Resolve {
        /// Restrict to one environment, group or host
        #[arg(long, value_parser = ["environment", "group", "host"])]
        filter_type: Option<String>,
        /// Name of the environment, group or host
        #[arg(long, requires = "filter_type")]
        filter_value: Option<String>,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Import subcommands
#[derive(Subcommand, Debug)]
pub enum ImportCommands {
    /// Import public keys from files or directories of `*.pub` files.
    ///
    /// The key name is derived from the file name: jonas_genannt.pub becomes "Jonas Genannt".
    Keys {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Import hosts from a file of `hostname[,environment[,ip]]` lines.
    ///
    /// The environment defaults to "production" and is created when missing.
    Hosts { file: PathBuf },
    /// Import account names offered for autocompletion
    Accounts {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Some(Commands::Import(command)) => cmd_import(config, command).await,
        Some(Commands::Resolve {
            filter_type,
            filter_value,
        }) => cmd_resolve(config, filter_type.as_deref(), filter_value.as_deref()).await,
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        Some(Commands::Serve) | None => {
            // Starting the server is handled in main.rs
            Ok(())
        }
    }
}

async fn open_database(config: &Config) -> Result<DbPool> {
    let data_dir = &config.server.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    db::init(data_dir).await
}

async fn cmd_import(config: &Config, command: &ImportCommands) -> Result<()> {
    let pool = open_database(config).await?;
    let report = db::update_inventory(&pool, |inventory| run_import(inventory, command)).await?;
    print_report(&report);

    if report.changed() {
        println!("[OK] {} item(s) saved", report.added.len());
    } else {
        println!("Nothing to save.");
    }

    if report.errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} item(s) could not be imported", report.errors.len())
    }
}

fn run_import(inventory: &mut Inventory, command: &ImportCommands) -> Result<ImportReport> {
    match command {
        ImportCommands::Keys { paths } => importer::import_keys(inventory, paths),
        ImportCommands::Hosts { file } => importer::import_hosts_file(inventory, file),
        ImportCommands::Accounts { names } => {
            Ok(importer::import_accounts_available(inventory, names.as_slice()))
        }
    }
}

fn print_report(report: &ImportReport) {
    if !report.added.is_empty() {
        println!("Added:");
        for item in &report.added {
            println!("    {}", item);
        }
    }
    if !report.already_present.is_empty() {
        println!("Already present:");
        for item in &report.already_present {
            println!("    {}", item);
        }
    }
    if !report.errors.is_empty() {
        println!("Errors:");
        for failure in &report.errors {
            println!("    {}: {}", failure.item, failure.reason);
        }
    }
    println!();
}

async fn cmd_resolve(
    config: &Config,
    filter_type: Option<&str>,
    filter_value: Option<&str>,
) -> Result<()> {
    let filter = HostFilter::parse(filter_type, filter_value)?;

    let pool = open_database(config).await?;
    let inventory = db::load_inventory(&pool).await?;
    let document = export(&inventory, filter.as_ref())?;

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration with a random API key will be used when starting the server.");
        return Ok(());
    }

    let config = Config::load(config_path)?;
    config.validate()?;

    println!("[OK] Configuration file is valid!");
    println!();
    println!("=== Configuration Summary ===");
    println!();
    println!("Server:");
    println!("  Listen:       {}", config.bind_address());
    println!("  Data Dir:     {}", config.server.data_dir.display());
    println!();
    println!("Auth:");
    if config.auth.generated_key {
        println!("  API Keys:     none configured, a random key is generated at startup");
    } else {
        println!("  API Keys:     {}", config.auth.api_keys.len());
    }
    println!();
    println!("Logging:");
    println!("  Level:        {}", config.logging.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::parse_from(["skm", "import", "keys", "/tmp/keys", "id_rsa.pub"]);
        match cli.command {
            Some(Commands::Import(ImportCommands::Keys { paths })) => assert_eq!(paths.len(), 2),
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::parse_from([
            "skm",
            "--config",
            "/etc/skm.toml",
            "resolve",
            "--filter-type",
            "group",
            "--filter-value",
            "Webservers",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/skm.toml"));
        assert!(matches!(cli.command, Some(Commands::Resolve { .. })));

        assert!(Cli::try_parse_from(["skm", "resolve", "--filter-type", "foobar"]).is_err());
        assert!(Cli::try_parse_from(["skm", "resolve", "--filter-value", "prod"]).is_err());
    }

    #[tokio::test]
    async fn test_import_and_resolve_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts.csv");
        std::fs::write(&hosts, "web1,production,10.0.0.1\nweb2\n").unwrap();

        let mut config = Config::default();
        config.server.data_dir = dir.path().join("data");

        cmd_import(&config, &ImportCommands::Hosts { file: hosts.clone() })
            .await
            .unwrap();
        cmd_import(
            &config,
            &ImportCommands::Accounts {
                names: vec!["root".to_string()],
            },
        )
        .await
        .unwrap();

        let pool = open_database(&config).await.unwrap();
        let inventory = db::load_inventory(&pool).await.unwrap();
        assert_eq!(inventory.hosts().count(), 2);
        assert_eq!(inventory.account_available_names(), vec!["root"]);

        cmd_resolve(&config, Some("host"), Some("web1")).await.unwrap();
        assert!(cmd_resolve(&config, Some("group"), None).await.is_err());
    }
}
