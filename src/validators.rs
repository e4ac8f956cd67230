use crate::interact;
use crate::networks::{provider, PROVIDERS};
use crate::rpc::JsonRpcClient;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::{json, Value};

pub async fn get(rpc: &JsonRpcClient, address: Option<&str>) -> Result<()> {
    let response = match address {
        Some(address) => rpc
            .request_ok("sim_getValidator", json!([address]))
            .await
            .context("Failed to fetch validator")?,
        None => rpc
            .request_ok("sim_getAllValidators", json!([]))
            .await
            .context("Failed to fetch validators")?,
    };
    fail_on_rpc_error(&response)?;

    println!("\n{}", "Validators:".bold().cyan());
    println!(
        "{}\n",
        serde_json::to_string_pretty(&response["result"]).unwrap_or_default()
    );
    Ok(())
}

pub async fn count(rpc: &JsonRpcClient) -> Result<()> {
    let response = rpc
        .request_ok("sim_countValidators", json!([]))
        .await
        .context("Failed to count validators")?;
    fail_on_rpc_error(&response)?;

    println!(
        "\n{} {}\n",
        "Validators:".bold().cyan(),
        response["result"]
    );
    Ok(())
}

/// Delete one validator, or all of them after an explicit confirmation.
pub async fn delete(rpc: &JsonRpcClient, address: Option<&str>) -> Result<()> {
    let response = match address {
        Some(address) => rpc
            .request_ok("sim_deleteValidator", json!([address]))
            .await
            .context("Failed to delete validator")?,
        None => {
            interact::confirm("No address given. Delete ALL validators?")?;
            rpc.request_ok("sim_deleteAllValidators", json!([]))
                .await
                .context("Failed to delete validators")?
        }
    };
    fail_on_rpc_error(&response)?;

    match address {
        Some(address) => println!(
            "{} Deleted validator {}",
            "✓".green(),
            address.bright_magenta()
        ),
        None => println!("{} Deleted all validators", "✓".green()),
    }
    Ok(())
}

pub async fn update(
    rpc: &JsonRpcClient,
    address: &str,
    stake: Option<u64>,
    provider_key: Option<&str>,
    model: Option<&str>,
    config: Option<&str>,
) -> Result<()> {
    if let Some(key) = provider_key {
        if provider(key).is_none() {
            bail!(
                "Unknown provider: {}. Allowed values: {}",
                key,
                provider_keys().join(", ")
            );
        }
    }
    let config = parse_config_blob(config)?;

    let response = rpc
        .request_ok(
            "sim_updateValidator",
            json!([address, stake, provider_key, model, config]),
        )
        .await
        .context("Failed to update validator")?;
    fail_on_rpc_error(&response)?;

    println!(
        "{} Updated validator {}",
        "✓".green(),
        address.bright_magenta()
    );
    println!(
        "{}\n",
        serde_json::to_string_pretty(&response["result"]).unwrap_or_default()
    );
    Ok(())
}

pub async fn create(
    rpc: &JsonRpcClient,
    stake: u64,
    provider_key: Option<&str>,
    model: Option<&str>,
    config: Option<&str>,
) -> Result<()> {
    let descriptor = match provider_key {
        Some(key) => provider(key).with_context(|| {
            format!(
                "Unknown provider: {}. Allowed values: {}",
                key,
                provider_keys().join(", ")
            )
        })?,
        None => {
            let keys = provider_keys();
            let picked = interact::select("Select a provider", &keys, 0)?;
            provider(&keys[picked]).expect("selected key comes from the table")
        }
    };

    let model = match model {
        Some(model) => model.to_string(),
        None => {
            let models: Vec<String> = descriptor.models.iter().map(|m| m.to_string()).collect();
            let picked = interact::select("Select a model", &models, 0)?;
            models[picked].clone()
        }
    };

    let config = parse_config_blob(config)?;

    let response = rpc
        .request_ok(
            "sim_createValidator",
            json!([stake, {
                "provider": descriptor.key,
                "model": model,
                "config": config,
                "plugin": descriptor.plugin,
                "plugin_config": {},
            }]),
        )
        .await
        .context("Failed to create validator")?;
    fail_on_rpc_error(&response)?;

    println!("{} Validator created", "✓".green());
    println!(
        "{}\n",
        serde_json::to_string_pretty(&response["result"]).unwrap_or_default()
    );
    Ok(())
}

pub async fn create_random(
    rpc: &JsonRpcClient,
    count: usize,
    providers: &[String],
) -> Result<()> {
    if count == 0 {
        bail!("count must be at least 1");
    }
    for key in providers {
        if provider(key).is_none() {
            bail!(
                "Unknown provider: {}. Allowed values: {}",
                key,
                provider_keys().join(", ")
            );
        }
    }

    let pb = interact::spinner("Creating random validators...");
    let response = rpc
        .request_ok("sim_createRandomValidators", json!([count, providers]))
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            pb.finish_with_message(format!("{} Failed to create validators", "✗".red()));
            return Err(e).context("Failed to create validators");
        }
    };
    if let Err(e) = fail_on_rpc_error(&response) {
        pb.finish_with_message(format!("{} Failed to create validators", "✗".red()));
        return Err(e);
    }

    pb.finish_with_message(format!("{} Created {} validator(s)", "✓".green(), count));
    Ok(())
}

pub fn provider_keys() -> Vec<String> {
    PROVIDERS.iter().map(|p| p.key.to_string()).collect()
}

fn parse_config_blob(config: Option<&str>) -> Result<Value> {
    match config {
        Some(raw) => {
            serde_json::from_str(raw).context("Invalid JSON passed via --config")
        }
        None => Ok(json!({})),
    }
}

fn fail_on_rpc_error(response: &Value) -> Result<()> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        bail!("RPC error: {}", error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_blob_defaults_to_empty_object() {
        assert_eq!(parse_config_blob(None).unwrap(), json!({}));
    }

    #[test]
    fn test_parse_config_blob_valid_json() {
        let parsed = parse_config_blob(Some(r#"{"temperature": 0.7}"#)).unwrap();
        assert_eq!(parsed["temperature"], json!(0.7));
    }

    #[test]
    fn test_parse_config_blob_rejects_invalid_json() {
        assert!(parse_config_blob(Some("{not json")).is_err());
    }

    #[test]
    fn test_fail_on_rpc_error() {
        assert!(fail_on_rpc_error(&json!({"result": 3})).is_ok());
        assert!(fail_on_rpc_error(&json!({"result": null, "error": {"code": -32000}})).is_err());
        assert!(fail_on_rpc_error(&json!({"error": null, "result": 1})).is_ok());
    }
}
