use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

const STORAGE_CONTRACT: &str = r#"# { "Depends": "py-genlayer:latest" }

from genlayer import *


class Storage(gl.Contract):
    storage: str

    def __init__(self, initial_storage: str):
        self.storage = initial_storage

    @gl.public.view
    def get_storage(self) -> str:
        return self.storage

    @gl.public.write
    def update_storage(self, new_storage: str) -> None:
        self.storage = new_storage
"#;

const GITIGNORE: &str = "keypair.json\n.env\n";

/// Scaffold a new project directory with a starter contract.
pub fn new_project(project_name: &str, base_path: &str, overwrite: bool) -> Result<()> {
    if project_name.is_empty()
        || !project_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        bail!(
            "invalid project name `{}`: use letters, digits, `-` and `_`",
            project_name
        );
    }

    let target = Path::new(base_path).join(project_name);
    if target.exists() {
        if !overwrite {
            bail!(
                "directory {} already exists (pass --overwrite to replace it)",
                target.display()
            );
        }
        fs::remove_dir_all(&target)
            .with_context(|| format!("Failed to clear {}", target.display()))?;
    }

    let contracts_dir = target.join("contracts");
    fs::create_dir_all(&contracts_dir)
        .with_context(|| format!("Failed to create {}", contracts_dir.display()))?;

    fs::write(contracts_dir.join("storage.py"), STORAGE_CONTRACT)?;
    fs::write(target.join(".gitignore"), GITIGNORE)?;
    fs::write(target.join("README.md"), readme(project_name))?;

    println!("\n{} Project created", "✓".green().bold());
    println!("  {}: {}", "Path".bold(), target.display());
    println!("\n  {} Next steps:", "→".bright_black());
    println!("    cd {}", target.display());
    println!("    genlayer deploy --contract contracts/storage.py\n");

    Ok(())
}

fn readme(project_name: &str) -> String {
    format!(
        "# {project_name}\n\n\
         A GenLayer intelligent contract project.\n\n\
         ## Deploy\n\n\
         ```sh\n\
         genlayer deploy --contract contracts/storage.py --args \"initial value\"\n\
         ```\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_creates_project_layout() {
        let dir = tempdir().unwrap();
        let base = dir.path().to_string_lossy().to_string();

        new_project("my-dapp", &base, false).unwrap();

        let target = dir.path().join("my-dapp");
        assert!(target.join("contracts/storage.py").is_file());
        assert!(target.join("README.md").is_file());
        assert!(target.join(".gitignore").is_file());
    }

    #[test]
    fn test_refuses_existing_without_overwrite() {
        let dir = tempdir().unwrap();
        let base = dir.path().to_string_lossy().to_string();

        new_project("my-dapp", &base, false).unwrap();
        let err = new_project("my-dapp", &base, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let dir = tempdir().unwrap();
        let base = dir.path().to_string_lossy().to_string();

        new_project("my-dapp", &base, false).unwrap();
        let marker = dir.path().join("my-dapp").join("marker.txt");
        fs::write(&marker, "stale").unwrap();

        new_project("my-dapp", &base, true).unwrap();
        assert!(!marker.exists());
        assert!(dir.path().join("my-dapp/contracts/storage.py").is_file());
    }

    #[test]
    fn test_rejects_bad_names() {
        let dir = tempdir().unwrap();
        let base = dir.path().to_string_lossy().to_string();
        assert!(new_project("", &base, false).is_err());
        assert!(new_project("../escape", &base, false).is_err());
        assert!(new_project("has space", &base, false).is_err());
    }
}
