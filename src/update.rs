use crate::config::{ConfigStore, DEFAULT_OLLAMA_MODEL_KEY};
use crate::interact;
use crate::networks::provider;
use crate::system;
use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;

const OLLAMA_CONTAINER: &str = "genlayer-simulator-ollama";

/// Pull or remove an ollama model inside the simulator's ollama container
/// and keep the `defaultOllamaModel` config key in sync.
pub async fn ollama(store: &ConfigStore, model: Option<&str>, remove: bool) -> Result<()> {
    let model = match model {
        Some(model) => model.to_string(),
        None => store
            .get_str(DEFAULT_OLLAMA_MODEL_KEY)?
            .unwrap_or_else(|| {
                provider("ollama")
                    .map(|p| p.default_model.to_string())
                    .unwrap_or_else(|| "llama3".to_string())
            }),
    };

    if remove {
        let pb = interact::spinner(&format!("Removing model {model}..."));
        let result = system::run("docker", &["exec", OLLAMA_CONTAINER, "ollama", "rm", &model])
            .await
            .with_context(|| format!("Failed to remove model {model}"));
        if let Err(e) = result {
            pb.finish_with_message(format!("{} Model removal failed", "✗".red()));
            return Err(e);
        }
        pb.finish_with_message(format!("{} Removed model {}", "✓".green(), model.bold()));

        if store.get_str(DEFAULT_OLLAMA_MODEL_KEY)?.as_deref() == Some(model.as_str()) {
            store.remove(DEFAULT_OLLAMA_MODEL_KEY)?;
        }
        return Ok(());
    }

    let pb = interact::spinner(&format!("Pulling model {model}..."));
    let result = system::run("docker", &["exec", OLLAMA_CONTAINER, "ollama", "pull", &model])
        .await
        .with_context(|| format!("Failed to pull model {model}"));
    if let Err(e) = result {
        pb.finish_with_message(format!("{} Model pull failed", "✗".red()));
        return Err(e);
    }
    pb.finish_with_message(format!("{} Model {} ready", "✓".green(), model.bold()));

    store.set(DEFAULT_OLLAMA_MODEL_KEY, json!(model))?;
    Ok(())
}
