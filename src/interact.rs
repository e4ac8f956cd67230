use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, MultiSelect, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use thiserror::Error;

/// The user answered "no" to a confirmation. The top-level dispatcher maps
/// this to a clean zero exit instead of an error trace.
#[derive(Debug, Error)]
#[error("aborted by user")]
pub struct UserDeclined;

/// Ask for confirmation; a declined answer becomes the typed
/// `UserDeclined` error so callers can abort without treating it as a
/// failure.
pub fn confirm(prompt: &str) -> Result<()> {
    let accepted = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    if !accepted {
        return Err(UserDeclined.into());
    }
    Ok(())
}

pub fn select(prompt: &str, items: &[String], default: usize) -> Result<usize> {
    Ok(Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .default(default)
        .interact()?)
}

/// Multi-select with the first item preselected. An empty selection is
/// coerced to the default so downstream calls always receive at least one
/// choice.
pub fn multi_select(prompt: &str, items: &[String]) -> Result<Vec<usize>> {
    let defaults: Vec<bool> = items.iter().enumerate().map(|(i, _)| i == 0).collect();
    let picked = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .defaults(&defaults)
        .interact()?;
    if picked.is_empty() {
        return Ok(vec![0]);
    }
    Ok(picked)
}

pub fn input(prompt: &str, default: Option<&str>) -> Result<String> {
    let theme = ColorfulTheme::default();
    let value = match default {
        Some(d) => Input::<String>::with_theme(&theme)
            .with_prompt(prompt)
            .default(d.to_string())
            .interact_text()?,
        None => Input::<String>::with_theme(&theme)
            .with_prompt(prompt)
            .interact_text()?,
    };
    Ok(value)
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
