use crate::config::ConfigStore;
use crate::interact;
use crate::keypair;
use crate::rpc::JsonRpcClient;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;

const RECEIPT_RETRIES: u32 = 30;
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Parse `k=v,k2=v2` keyword arguments into a JSON object.
pub fn parse_kwargs(raw: &str) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Invalid kwarg `{pair}`, expected key=value"))?;
        map.insert(key.trim().to_string(), json!(value.trim()));
    }
    Ok(map)
}

pub async fn deploy(
    store: &ConfigStore,
    rpc: &JsonRpcClient,
    contract_path: &str,
    args: &[String],
    kwargs: Option<&str>,
) -> Result<()> {
    let path = Path::new(contract_path);
    if !path.is_file() {
        bail!("contract file not found: {}", contract_path);
    }
    let code = fs::read_to_string(path)
        .with_context(|| format!("Failed to read contract {}", contract_path))?;

    let account = keypair::read_keypair(store)?;
    let kwargs = kwargs.map(parse_kwargs).transpose()?.unwrap_or_default();

    let pb = interact::spinner("Deploying contract...");
    let response = rpc
        .request_ok(
            "gen_deployContract",
            json!([{
                "from": account.address,
                "code": code,
                "args": args,
                "kwargs": kwargs,
            }]),
        )
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            pb.finish_with_message(format!("{} Deployment failed", "✗".red()));
            return Err(e).context("Failed to deploy contract");
        }
    };

    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        pb.finish_with_message(format!("{} Deployment rejected", "✗".red()));
        bail!("RPC error: {}", error);
    }

    let tx_hash = response["result"]
        .as_str()
        .map(str::to_string)
        .or_else(|| {
            response["result"]["transaction_hash"]
                .as_str()
                .map(str::to_string)
        });

    pb.set_message("Waiting for transaction receipt...");
    let receipt = match &tx_hash {
        Some(hash) => wait_for_receipt(rpc, hash).await?,
        None => None,
    };

    pb.finish_with_message(format!("{} Contract deployed", "✓".green()));

    println!("\n{}", "Deployment:".bold().cyan());
    println!("  {}: {}", "From".bold(), account.address.bright_magenta());
    println!("  {}: {}", "Contract".bold(), contract_path.bright_black());
    if let Some(hash) = tx_hash {
        println!("  {}: {}", "Tx Hash".bold(), hash.bright_black());
    }
    if let Some(receipt) = receipt {
        if let Some(address) = receipt["contractAddress"].as_str() {
            println!("  {}: {}", "Address".bold(), address.bright_blue());
        }
        if let Some(status) = receipt["status"].as_str() {
            println!("  {}: {}", "Status".bold(), status.green());
        }
    }
    println!();

    Ok(())
}

pub async fn call(
    rpc: &JsonRpcClient,
    address: &str,
    method: &str,
    args: &[String],
) -> Result<()> {
    let response = rpc
        .request_ok(
            "gen_call",
            json!([{
                "to": address,
                "method": method,
                "args": args,
            }]),
        )
        .await
        .context("Failed to call contract")?;

    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        bail!("RPC error: {}", error);
    }

    println!("\n{}", "Call Result:".bold().cyan());
    println!(
        "{}\n",
        serde_json::to_string_pretty(&response["result"]).unwrap_or_default()
    );

    Ok(())
}

pub async fn write(
    store: &ConfigStore,
    rpc: &JsonRpcClient,
    address: &str,
    method: &str,
    args: &[String],
) -> Result<()> {
    let account = keypair::read_keypair(store)?;

    let pb = interact::spinner("Sending transaction...");
    let response = rpc
        .request_ok(
            "gen_write",
            json!([{
                "from": account.address,
                "to": address,
                "method": method,
                "args": args,
            }]),
        )
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            pb.finish_with_message(format!("{} Transaction failed", "✗".red()));
            return Err(e).context("Failed to write to contract");
        }
    };

    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        pb.finish_with_message(format!("{} Transaction rejected", "✗".red()));
        bail!("RPC error: {}", error);
    }

    let tx_hash = response["result"].as_str().map(str::to_string);

    pb.set_message("Waiting for transaction receipt...");
    let receipt = match &tx_hash {
        Some(hash) => wait_for_receipt(rpc, hash).await?,
        None => None,
    };
    pb.finish_with_message(format!("{} Transaction sent", "✓".green()));

    println!("\n{}", "Write Result:".bold().cyan());
    println!("  {}: {}", "To".bold(), address.bright_blue());
    println!("  {}: {}", "Method".bold(), method);
    if let Some(hash) = tx_hash {
        println!("  {}: {}", "Tx Hash".bold(), hash.bright_black());
    }
    if let Some(receipt) = receipt {
        if let Some(status) = receipt["status"].as_str() {
            println!("  {}: {}", "Status".bold(), status.green());
        }
    } else {
        println!(
            "  {}",
            "Receipt not available yet; the transaction may still be pending.".yellow()
        );
    }
    println!();

    Ok(())
}

/// Poll for a transaction receipt with a bounded budget. `None` means the
/// transaction was still pending when the budget ran out.
async fn wait_for_receipt(rpc: &JsonRpcClient, tx_hash: &str) -> Result<Option<Value>> {
    for attempt in 0..RECEIPT_RETRIES {
        let response = rpc
            .request_ok("eth_getTransactionReceipt", json!([tx_hash]))
            .await
            .context("Failed to fetch transaction receipt")?;

        let result = &response["result"];
        if !result.is_null() {
            return Ok(Some(result.clone()));
        }
        if attempt + 1 < RECEIPT_RETRIES {
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kwargs() {
        let map = parse_kwargs("owner=0xabc, limit=10").unwrap();
        assert_eq!(map["owner"], json!("0xabc"));
        assert_eq!(map["limit"], json!("10"));
    }

    #[test]
    fn test_parse_kwargs_empty_segments_skipped() {
        let map = parse_kwargs("a=1,,b=2,").unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_parse_kwargs_rejects_bare_key() {
        assert!(parse_kwargs("justakey").is_err());
    }

    #[test]
    fn test_parse_kwargs_value_may_contain_equals() {
        let map = parse_kwargs("query=a=b").unwrap();
        assert_eq!(map["query"], json!("a=b"));
    }
}
