mod config;
mod contracts;
mod interact;
mod keypair;
mod localnet;
mod networks;
mod rpc;
mod scaffold;
mod simulator;
mod system;
mod update;
mod validators;
mod version;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use config::{ConfigStore, NETWORK_KEY};
use interact::UserDeclined;
use networks::{Network, NetworkDescriptor};
use rpc::JsonRpcClient;
use serde_json::Value;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "genlayer")]
#[command(about = "CLI for the GenLayer simulator and intelligent contracts")]
#[command(version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (rustc ",
    env!("RUSTC_VERSION"),
    ")"
))]
struct Cli {
    /// JSON-RPC endpoint override
    #[arg(long, global = true, env = "GENLAYER_RPC")]
    rpc: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage CLI configuration values
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Manage the signing keypair
    #[command(subcommand)]
    Keygen(KeygenCommands),

    /// Deploy an intelligent contract
    Deploy {
        /// Path to the contract source file
        #[arg(long)]
        contract: String,

        /// Positional constructor arguments
        #[arg(long, num_args = 0..)]
        args: Vec<String>,

        /// Keyword constructor arguments as k=v,k2=v2
        #[arg(long)]
        kwargs: Option<String>,
    },

    /// Read from a deployed contract
    Call {
        /// Contract address
        address: String,

        /// Method to call
        method: String,

        /// Method arguments
        #[arg(long, num_args = 0..)]
        args: Vec<String>,
    },

    /// Send a state-mutating transaction to a contract
    Write {
        /// Contract address
        address: String,

        /// Method to call
        method: String,

        /// Method arguments
        #[arg(long, num_args = 0..)]
        args: Vec<String>,
    },

    /// Manage simulator validators
    #[command(subcommand)]
    Validators(ValidatorCommands),

    /// Select the target network
    Network {
        /// Network name (interactive selection when omitted)
        name: Option<String>,
    },

    /// Update simulator resources
    #[command(subcommand)]
    Update(UpdateCommands),

    /// Scaffold a new contract project
    New {
        /// Project name
        project_name: String,

        /// Directory to create the project in
        #[arg(long, default_value = ".")]
        path: String,

        /// Replace an existing directory
        #[arg(long)]
        overwrite: bool,
    },

    /// Set up the localnet simulator from scratch
    Init {
        /// Number of validators to create
        #[arg(short = 'n', long = "numValidators", default_value_t = 5)]
        num_validators: usize,
    },

    /// Start (or verify) the localnet simulator
    Up {
        /// Do not restart if already running
        #[arg(long)]
        no_restart: bool,
    },

    /// Stop the localnet simulator
    Stop,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Set a configuration value (key=value)
    Set {
        /// key=value pair
        key_value: String,
    },
    /// Read one value, or all of them
    Get {
        /// Key to read (all keys when omitted)
        key: Option<String>,
    },
    /// Remove a configuration value
    Reset {
        /// Key to remove
        key: String,
    },
}

#[derive(Subcommand, Debug)]
enum KeygenCommands {
    /// Generate a new keypair file
    Create {
        /// Where to write the keypair
        #[arg(long, default_value = keypair::DEFAULT_KEYPAIR_PATH)]
        output: String,

        /// Replace an existing keypair file
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ValidatorCommands {
    /// Show one validator, or all of them
    Get {
        /// Validator address (all validators when omitted)
        #[arg(long)]
        address: Option<String>,
    },
    /// Delete one validator, or all of them
    Delete {
        /// Validator address (all validators when omitted)
        #[arg(long)]
        address: Option<String>,
    },
    /// Count validators
    Count,
    /// Update a validator
    Update {
        /// Validator address
        address: String,

        /// New stake
        #[arg(long)]
        stake: Option<u64>,

        /// New provider
        #[arg(long)]
        provider: Option<String>,

        /// New model
        #[arg(long)]
        model: Option<String>,

        /// Model config as a JSON object
        #[arg(long)]
        config: Option<String>,
    },
    /// Create a validator
    Create {
        /// Stake amount
        #[arg(long, default_value_t = 1)]
        stake: u64,

        /// Provider (interactive selection when omitted)
        #[arg(long)]
        provider: Option<String>,

        /// Model (interactive selection when omitted)
        #[arg(long)]
        model: Option<String>,

        /// Model config as a JSON object
        #[arg(long)]
        config: Option<String>,
    },
    /// Create several randomly configured validators
    CreateRandom {
        /// How many validators to create
        #[arg(long, default_value_t = 5)]
        count: usize,

        /// Providers to draw from
        #[arg(long, num_args = 1.., default_values_t = [String::from("ollama")])]
        providers: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum UpdateCommands {
    /// Pull or remove an ollama model in the simulator
    Ollama {
        /// Model name (falls back to the configured default)
        #[arg(long)]
        model: Option<String>,

        /// Remove the model instead of pulling it
        #[arg(long)]
        remove: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => {}
        Err(e) if e.downcast_ref::<UserDeclined>().is_some() => {
            println!("{}", "Aborted.".yellow());
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let store = ConfigStore::open_default()?;

    match cli.command {
        Commands::Config(action) => match action {
            ConfigCommands::Set { key_value } => config_set(&store, &key_value),
            ConfigCommands::Get { key } => config_get(&store, key.as_deref()),
            ConfigCommands::Reset { key } => config_reset(&store, &key),
        },
        Commands::Keygen(action) => match action {
            KeygenCommands::Create { output, overwrite } => {
                let keypair =
                    keypair::create_keypair(&store, Path::new(&output), overwrite)?;
                println!("\n{} Keypair created", "✓".green().bold());
                println!("  {}: {}", "Address".bold(), keypair.address.bright_magenta());
                println!("  {}: {}", "Path".bold(), output.bright_black());
                println!(
                    "\n  {} Keep this file safe; it holds your private key.\n",
                    "→".bright_black()
                );
                Ok(())
            }
        },
        Commands::Deploy {
            contract,
            args,
            kwargs,
        } => {
            let rpc = resolve_rpc(&store, cli.rpc)?;
            contracts::deploy(&store, &rpc, &contract, &args, kwargs.as_deref()).await
        }
        Commands::Call {
            address,
            method,
            args,
        } => {
            let rpc = resolve_rpc(&store, cli.rpc)?;
            contracts::call(&rpc, &address, &method, &args).await
        }
        Commands::Write {
            address,
            method,
            args,
        } => {
            let rpc = resolve_rpc(&store, cli.rpc)?;
            contracts::write(&store, &rpc, &address, &method, &args).await
        }
        Commands::Validators(action) => {
            let rpc = resolve_rpc(&store, cli.rpc)?;
            match action {
                ValidatorCommands::Get { address } => {
                    validators::get(&rpc, address.as_deref()).await
                }
                ValidatorCommands::Delete { address } => {
                    validators::delete(&rpc, address.as_deref()).await
                }
                ValidatorCommands::Count => validators::count(&rpc).await,
                ValidatorCommands::Update {
                    address,
                    stake,
                    provider,
                    model,
                    config,
                } => {
                    validators::update(
                        &rpc,
                        &address,
                        stake,
                        provider.as_deref(),
                        model.as_deref(),
                        config.as_deref(),
                    )
                    .await
                }
                ValidatorCommands::Create {
                    stake,
                    provider,
                    model,
                    config,
                } => {
                    validators::create(
                        &rpc,
                        stake,
                        provider.as_deref(),
                        model.as_deref(),
                        config.as_deref(),
                    )
                    .await
                }
                ValidatorCommands::CreateRandom { count, providers } => {
                    validators::create_random(&rpc, count, &providers).await
                }
            }
        }
        Commands::Network { name } => select_network(&store, name),
        Commands::Update(action) => match action {
            UpdateCommands::Ollama { model, remove } => {
                update::ollama(&store, model.as_deref(), remove).await
            }
        },
        Commands::New {
            project_name,
            path,
            overwrite,
        } => scaffold::new_project(&project_name, &path, overwrite),
        Commands::Init { num_validators } => localnet::init(&store, num_validators).await,
        Commands::Up { no_restart } => localnet::up(&store, no_restart).await,
        Commands::Stop => localnet::stop(&store).await,
    }
}

/// Endpoint precedence: `--rpc` flag, then the persisted network
/// descriptor, then localnet.
fn resolve_rpc(store: &ConfigStore, flag: Option<String>) -> Result<JsonRpcClient> {
    if let Some(url) = flag {
        return Ok(JsonRpcClient::new(url));
    }

    if let Some(blob) = store.get(NETWORK_KEY)? {
        let descriptor: NetworkDescriptor = serde_json::from_value(blob)
            .context("Invalid network blob in config; run `genlayer network` to reselect")?;
        return Ok(JsonRpcClient::new(descriptor.rpc_url));
    }

    Ok(JsonRpcClient::new(Network::Localnet.descriptor().rpc_url))
}

fn config_set(store: &ConfigStore, key_value: &str) -> Result<()> {
    let (key, raw_value) = key_value
        .split_once('=')
        .context("Expected key=value")?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Expected key=value");
    }

    // Store valid JSON as JSON, anything else as a plain string.
    let value: Value = serde_json::from_str(raw_value)
        .unwrap_or_else(|_| Value::String(raw_value.to_string()));
    store.set(key, value)?;

    println!("{} {} = {}", "✓".green(), key.bold(), raw_value);
    Ok(())
}

fn config_get(store: &ConfigStore, key: Option<&str>) -> Result<()> {
    match key {
        Some(key) => match store.get(key)? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => println!("{} is not set", key.yellow()),
        },
        None => {
            let all = store.get_all()?;
            println!("{}", serde_json::to_string_pretty(&Value::Object(all))?);
        }
    }
    Ok(())
}

fn config_reset(store: &ConfigStore, key: &str) -> Result<()> {
    if store.remove(key)? {
        println!("{} Removed {}", "✓".green(), key.bold());
    } else {
        println!("{} was not set; nothing to do", key.yellow());
    }
    Ok(())
}

fn select_network(store: &ConfigStore, name: Option<String>) -> Result<()> {
    let network = match name {
        Some(name) => name.parse::<Network>()?,
        None => {
            let items: Vec<String> = Network::ALL.iter().map(ToString::to_string).collect();
            let picked = interact::select("Select a network", &items, 0)?;
            Network::ALL[picked]
        }
    };

    let descriptor = network.descriptor();
    store.set(NETWORK_KEY, serde_json::to_value(&descriptor)?)?;

    println!(
        "{} Network set to {} ({})",
        "✓".green(),
        descriptor.alias.bold(),
        descriptor.rpc_url.bright_blue()
    );
    Ok(())
}
