pub mod config;
pub mod doctor;
pub mod provision;

use clap::{Parser, Subcommand};

/// inv-gateway — an autonomous incident-investigation gateway.
#[derive(Debug, Parser)]
#[command(name = "inv-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Provision (or re-provision) a scenario's remote agent fleet and
    /// write its fleet record to `<state_dir>/fleets/<scenario>.fleet.json`.
    Provision {
        /// Scenario name, as configured under `[[scenarios]]`.
        scenario: String,
        /// Azure AI Search connection id for scenarios whose manifest uses
        /// a `search_*` tool.
        #[arg(long, default_value = "default-search-connection")]
        search_connection_id: String,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load the configuration from the path specified by `--config`/`INV_CONFIG`
/// (or `config.toml` by default), then apply `INV_<SECTION>_<FIELD>`
/// environment overrides on top. Shared by `serve`, `doctor`, and `config`
/// so the logic lives in one place.
pub fn load_config() -> anyhow::Result<(inv_domain::config::Config, String)> {
    let config_path = std::env::var("INV_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let mut config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        inv_domain::config::Config::load_from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        inv_domain::config::Config::default()
    };

    config.apply_env_overrides();

    Ok((config, config_path))
}
