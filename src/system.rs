use crate::version::Version;
use log::debug;
use std::io;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum SystemError {
    #[error("{0} is not installed")]
    NotInstalled(String),
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
    #[error("command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("could not parse a version out of `{0}`")]
    VersionParse(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub fn detect() -> Result<Platform, SystemError> {
        match std::env::consts::OS {
            "macos" => Ok(Platform::MacOs),
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            other => Err(SystemError::UnsupportedPlatform(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run an external program, capturing output. A missing binary surfaces as
/// the typed `NotInstalled` failure; a non-zero exit as `CommandFailed`.
pub async fn run(program: &str, args: &[&str]) -> Result<CommandOutput, SystemError> {
    debug!("exec: {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SystemError::NotInstalled(program.to_string()),
            _ => SystemError::Io(e),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return Err(SystemError::CommandFailed {
            command: format!("{} {}", program, args.join(" ")),
            stderr,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

/// Probe `<tool> --version` and parse the installed version out of its
/// output.
pub async fn tool_version(tool: &str) -> Result<Version, SystemError> {
    let output = run(tool, &["--version"]).await?;
    let text = if output.stdout.trim().is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    extract_version(&text).ok_or_else(|| SystemError::VersionParse(text.trim().to_string()))
}

/// Scan command output for the first token that parses as a version.
/// Handles `Docker version 27.0.3, build ...`, `git version 2.43.0`,
/// and node's bare `v22.2.0`.
pub fn extract_version(text: &str) -> Option<Version> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .find_map(Version::parse)
}

/// Open a URL with the platform-appropriate opener. Returns once the
/// opener is dispatched; does not confirm the browser actually opened.
pub async fn open_url(platform: Platform, url: &str) -> Result<(), SystemError> {
    match platform {
        Platform::MacOs => run("open", &[url]).await?,
        Platform::Windows => run("cmd", &["/C", "start", "", url]).await?,
        Platform::Linux => run("xdg-open", &[url]).await?,
    };
    Ok(())
}

/// One-shot Docker daemon remediation. Not retried.
pub async fn start_docker_daemon(platform: Platform) -> Result<(), SystemError> {
    match platform {
        Platform::MacOs => run("open", &["-a", "Docker"]).await?,
        Platform::Windows => {
            run(
                "cmd",
                &[
                    "/C",
                    "start",
                    "",
                    "C:\\Program Files\\Docker\\Docker\\Docker Desktop.exe",
                ],
            )
            .await?
        }
        Platform::Linux => run("systemctl", &["start", "docker"]).await?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_version_docker() {
        let v = extract_version("Docker version 27.0.3, build 7d4bcd8").unwrap();
        assert_eq!(v, Version::new(27, 0, 3));
    }

    #[test]
    fn test_extract_version_git() {
        let v = extract_version("git version 2.43.0").unwrap();
        assert_eq!(v, Version::new(2, 43, 0));
    }

    #[test]
    fn test_extract_version_node() {
        let v = extract_version("v22.2.0\n").unwrap();
        assert_eq!(v, Version::new(22, 2, 0));
    }

    #[test]
    fn test_extract_version_none() {
        assert!(extract_version("no numbers here").is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_is_typed() {
        let err = run("definitely-not-a-real-binary-xyz", &[]).await.unwrap_err();
        assert!(matches!(err, SystemError::NotInstalled(_)));
    }
}
