use crate::config::{ConfigStore, SIMULATOR_LOCATION_KEY};
use crate::interact;
use crate::networks::Network;
use crate::rpc::JsonRpcClient;
use crate::simulator::{SimulatorOrchestrator, WaitOutcome, DEFAULT_READY_RETRIES};
use crate::system::Platform;
use crate::validators::provider_keys;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Build the orchestrator against the localnet endpoint and the configured
/// simulator checkout.
pub fn orchestrator(store: &ConfigStore) -> Result<SimulatorOrchestrator> {
    let platform = Platform::detect()?;
    let simulator_dir = simulator_dir(store)?;
    let rpc = JsonRpcClient::new(Network::Localnet.descriptor().rpc_url);
    Ok(SimulatorOrchestrator::new(rpc, platform, simulator_dir))
}

fn simulator_dir(store: &ConfigStore) -> Result<PathBuf> {
    if let Some(location) = store.get_str(SIMULATOR_LOCATION_KEY)? {
        return Ok(PathBuf::from(location));
    }
    let home = dirs::home_dir().context("Cannot determine home directory")?;
    Ok(home.join(".genlayer").join("simulator"))
}

/// Full bring-up: requirements, confirmation, Docker reset, launch,
/// readiness, validator population.
pub async fn init(store: &ConfigStore, num_validators: usize) -> Result<()> {
    let orchestrator = orchestrator(store)?;

    println!("\n{}", "GenLayer Localnet Setup".bold().cyan());
    println!("{}", "=".repeat(60).cyan());

    let installed = orchestrator.check_install_requirements().await?;
    if !installed.satisfied() {
        if !installed.git {
            println!("{} git is not installed", "✗".red());
        }
        if !installed.docker {
            println!("{} docker is not installed", "✗".red());
        }
        println!(
            "\n{}",
            "Install the missing requirements and run `genlayer init` again.".yellow()
        );
        return Ok(());
    }

    let versions = orchestrator.check_version_requirements().await?;
    if !versions.satisfied() {
        if let Some(installed) = versions.docker {
            println!(
                "{} docker {} is below the required {}",
                "✗".red(),
                installed,
                crate::simulator::DOCKER_MIN_VERSION
            );
        }
        if let Some(installed) = versions.node {
            println!(
                "{} node {} is below the required {}",
                "✗".red(),
                installed,
                crate::simulator::NODE_MIN_VERSION
            );
        }
        println!(
            "\n{}",
            "Upgrade the listed tools and run `genlayer init` again.".yellow()
        );
        return Ok(());
    }

    interact::confirm(
        "This will remove every GenLayer container and image and start from scratch. Continue?",
    )?;

    let keys = provider_keys();
    let picked = interact::multi_select("Select the LLM providers for your validators", &keys)?;
    let providers: Vec<String> = picked.into_iter().map(|i| keys[i].clone()).collect();

    configure_provider_keys(&orchestrator, &providers)?;

    let pb = interact::spinner("Resetting Docker containers...");
    orchestrator.reset_docker_containers().await?;
    pb.set_message("Resetting Docker images...");
    orchestrator.reset_docker_images().await?;
    pb.finish_with_message(format!("{} Docker state reset", "✓".green()));

    let pb = interact::spinner("Starting the simulator...");
    orchestrator.run_simulator().await?;
    pb.set_message("Waiting for the simulator to be ready...");
    match orchestrator
        .wait_for_simulator_to_be_ready(DEFAULT_READY_RETRIES)
        .await
    {
        WaitOutcome::Ready => {
            pb.finish_with_message(format!("{} Simulator is ready", "✓".green()));
        }
        WaitOutcome::Timeout => {
            pb.finish_with_message(format!("{} Simulator did not become ready", "✗".red()));
            bail!("simulator did not respond in time (TIMEOUT)");
        }
        WaitOutcome::Failed(message) => {
            pb.finish_with_message(format!("{} Simulator failed to start", "✗".red()));
            bail!("simulator startup failed: {message}");
        }
    }

    let pb = interact::spinner("Populating validators...");
    orchestrator.delete_all_validators().await?;
    orchestrator
        .create_random_validators(num_validators, &providers)
        .await?;
    pb.finish_with_message(format!(
        "{} Created {} validator(s)",
        "✓".green(),
        num_validators
    ));

    match orchestrator.get_frontend_url() {
        Ok(url) => {
            println!("\n{} {}", "Frontend:".bold(), url.bright_blue());
            let _ = orchestrator.open_frontend().await;
        }
        Err(_) => {
            println!(
                "\n{}",
                "Simulator is running. Frontend port not configured yet.".bright_black()
            );
        }
    }

    println!("{}", "=".repeat(60).cyan());
    println!("{}\n", "Localnet is up.".green().bold());
    Ok(())
}

/// Restart the simulator, or with `no_restart` just verify it is
/// reachable.
pub async fn up(store: &ConfigStore, no_restart: bool) -> Result<()> {
    let orchestrator = orchestrator(store)?;

    if no_restart {
        let pb = interact::spinner("Checking the simulator...");
        match orchestrator.wait_for_simulator_to_be_ready(5).await {
            WaitOutcome::Ready => {
                pb.finish_with_message(format!("{} Simulator is running", "✓".green()));
                return Ok(());
            }
            outcome => {
                pb.finish_with_message(format!("{} Simulator is not responding", "✗".red()));
                bail!(
                    "simulator is not ready ({}); run `genlayer up` without --no-restart",
                    outcome.error_code().unwrap_or("UNKNOWN")
                );
            }
        }
    }

    let pb = interact::spinner("Restarting the simulator...");
    orchestrator.reset_docker_containers().await?;
    orchestrator.run_simulator().await?;
    pb.set_message("Waiting for the simulator to be ready...");
    match orchestrator
        .wait_for_simulator_to_be_ready(DEFAULT_READY_RETRIES)
        .await
    {
        WaitOutcome::Ready => {
            pb.finish_with_message(format!("{} Simulator is ready", "✓".green()));
        }
        WaitOutcome::Timeout => {
            pb.finish_with_message(format!("{} Simulator did not become ready", "✗".red()));
            bail!("simulator did not respond in time (TIMEOUT)");
        }
        WaitOutcome::Failed(message) => {
            pb.finish_with_message(format!("{} Simulator failed to start", "✗".red()));
            bail!("simulator startup failed: {message}");
        }
    }

    if let Ok(url) = orchestrator.get_frontend_url() {
        println!("\n{} {}\n", "Frontend:".bold(), url.bright_blue());
    }
    Ok(())
}

/// Stop running simulator containers, leaving them in place for a quick
/// `up`.
pub async fn stop(store: &ConfigStore) -> Result<()> {
    let orchestrator = orchestrator(store)?;

    let pb = interact::spinner("Stopping the simulator...");
    orchestrator.stop_docker_containers().await?;
    pb.finish_with_message(format!("{} Simulator stopped", "✓".green()));
    Ok(())
}

/// Providers other than ollama authenticate with an API key; collect the
/// keys and merge them into the simulator env file.
fn configure_provider_keys(
    orchestrator: &SimulatorOrchestrator,
    providers: &[String],
) -> Result<()> {
    let mut new_config = BTreeMap::new();
    for provider in providers {
        let env_key = match provider.as_str() {
            "openai" => "OPENAIKEY",
            "heuristai" => "HEURISTAIKEY",
            _ => continue,
        };
        let value = interact::input(
            &format!("Enter your {provider} API key"),
            None,
        )?;
        if !value.trim().is_empty() {
            new_config.insert(env_key.to_string(), value.trim().to_string());
        }
    }

    if new_config.is_empty() {
        return Ok(());
    }
    orchestrator.add_config_to_env_file(&new_config)
}
