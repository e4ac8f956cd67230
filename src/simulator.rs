use crate::rpc::JsonRpcClient;
use crate::system::{self, CommandOutput, Platform, SystemError};
use crate::version::Version;
use anyhow::{Context, Result};
use bollard::container::{ListContainersOptions, StopContainerOptions};
use bollard::image::{ListImagesOptions, RemoveImageOptions};
use bollard::Docker;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name prefix shared by every container and image the simulator owns.
/// Resources without it are never touched.
pub const SIMULATOR_PREFIX: &str = "genlayer-simulator-";

pub const DOCKER_MIN_VERSION: Version = Version::new(24, 0, 0);
pub const NODE_MIN_VERSION: Version = Version::new(18, 0, 0);

pub const DEFAULT_READY_RETRIES: u32 = 60;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

const FRONTEND_PORT_KEY: &str = "FRONTEND_PORT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallRequirements {
    pub git: bool,
    pub docker: bool,
}

impl InstallRequirements {
    pub fn satisfied(&self) -> bool {
        self.git && self.docker
    }
}

/// Version-requirement failures. An entry is present only when the
/// installed version fails the minimum; absence means "satisfied".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRequirements {
    pub docker: Option<String>,
    pub node: Option<String>,
}

impl VersionRequirements {
    pub fn satisfied(&self) -> bool {
        self.docker.is_none() && self.node.is_none()
    }
}

/// Outcome of readiness polling. Transient unreadiness is retried until
/// the budget runs out; a hard error during polling fails immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    Timeout,
    Failed(String),
}

impl WaitOutcome {
    pub fn initialized(&self) -> bool {
        matches!(self, WaitOutcome::Ready)
    }

    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            WaitOutcome::Ready => None,
            WaitOutcome::Timeout => Some("TIMEOUT"),
            WaitOutcome::Failed(_) => Some("ERROR"),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            WaitOutcome::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// The backend has shipped three shapes for a successful `ping`; all
/// three are accepted, checked in precedence order:
///   1. `{"result": "OK"}`
///   2. `{"result": {"status": "OK"}}`
///   3. `{"result": {"data": {"status": "OK"}}}`
pub fn response_indicates_ready(body: &Value) -> bool {
    let result = &body["result"];
    if result.as_str() == Some("OK") {
        return true;
    }
    if result["status"].as_str() == Some("OK") {
        return true;
    }
    result["data"]["status"].as_str() == Some("OK")
}

/// Poll `ping` until it reports ready, the retry budget runs out, or it
/// fails hard. `Ok(None)` from the ping (no answer) counts as unready and
/// is retried; an `Err` is not retried.
pub async fn poll_until_ready<F, Fut>(mut ping: F, retries: u32, interval: Duration) -> WaitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<Value>>>,
{
    let mut remaining = retries;
    while remaining > 0 {
        match ping().await {
            Ok(Some(body)) if response_indicates_ready(&body) => return WaitOutcome::Ready,
            Ok(_) => {}
            Err(e) => return WaitOutcome::Failed(format!("{e:#}")),
        }
        remaining -= 1;
        if remaining > 0 {
            tokio::time::sleep(interval).await;
        }
    }
    WaitOutcome::Timeout
}

#[derive(Debug, Clone)]
pub(crate) struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub running: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ResetPlan {
    pub to_stop: Vec<String>,
    pub to_remove: Vec<String>,
}

/// Decide which containers a reset touches: every prefixed container is
/// removed, and the running ones are stopped first. Engine API names carry
/// a leading slash.
pub(crate) fn container_reset_plan(containers: &[ContainerInfo]) -> ResetPlan {
    let mut plan = ResetPlan::default();
    for container in containers {
        let name = container.name.trim_start_matches('/');
        if !name.starts_with(SIMULATOR_PREFIX) {
            continue;
        }
        if container.running {
            plan.to_stop.push(container.id.clone());
        }
        plan.to_remove.push(container.id.clone());
    }
    plan
}

/// Decide which images a reset removes: any image with a prefixed repo
/// tag.
pub(crate) fn image_reset_plan(images: &[(String, Vec<String>)]) -> Vec<String> {
    images
        .iter()
        .filter(|(_, tags)| {
            tags.iter()
                .any(|tag| tag.starts_with(SIMULATOR_PREFIX))
        })
        .map(|(id, _)| id.clone())
        .collect()
}

/// Parse `.env`-style content, preserving line order. Blank lines and
/// `#` comments are skipped.
pub(crate) fn parse_env(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            let (key, value) = trimmed.split_once('=')?;
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Merge new keys over the original content. Existing keys are updated in
/// place; new keys are appended. New values win on conflict.
pub(crate) fn merge_env(original: &str, new_config: &BTreeMap<String, String>) -> String {
    let mut entries = parse_env(original);
    let mut pending = new_config.clone();

    for (key, value) in entries.iter_mut() {
        if let Some(updated) = pending.remove(key) {
            *value = updated;
        }
    }
    for (key, value) in pending {
        entries.push((key, value));
    }

    entries
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sequences requirement checks, Docker resets, simulator launch,
/// readiness polling, and validator population against external services.
/// Does not retry anything except readiness polling, and does not log
/// except on the env-file error path; callers report failures.
pub struct SimulatorOrchestrator {
    rpc: JsonRpcClient,
    platform: Platform,
    simulator_dir: PathBuf,
}

impl SimulatorOrchestrator {
    pub fn new(rpc: JsonRpcClient, platform: Platform, simulator_dir: PathBuf) -> Self {
        Self {
            rpc,
            platform,
            simulator_dir,
        }
    }

    pub fn simulator_dir(&self) -> &Path {
        &self.simulator_dir
    }

    /// Probe for git and docker. A missing binary reads as `false`;
    /// anything else propagates. When the docker binary is present but
    /// the daemon is unreachable, attempt to start it once and move on.
    pub async fn check_install_requirements(&self) -> Result<InstallRequirements> {
        let git = match system::run("git", &["--version"]).await {
            Ok(_) => true,
            Err(SystemError::NotInstalled(_)) => false,
            Err(e) => return Err(e.into()),
        };

        let docker = match system::run("docker", &["--version"]).await {
            Ok(_) => true,
            Err(SystemError::NotInstalled(_)) => false,
            Err(e) => return Err(e.into()),
        };

        if docker && system::run("docker", &["info"]).await.is_err() {
            // One remediation attempt, no retry.
            let _ = system::start_docker_daemon(self.platform).await;
        }

        Ok(InstallRequirements { git, docker })
    }

    /// Compare installed tool versions against the minimums. Only failing
    /// tools appear in the result, carrying their installed version.
    pub async fn check_version_requirements(&self) -> Result<VersionRequirements> {
        let mut failures = VersionRequirements::default();

        let docker = system::tool_version("docker").await?;
        if !docker.satisfies_min(&DOCKER_MIN_VERSION) {
            failures.docker = Some(docker.to_string());
        }

        let node = system::tool_version("node").await?;
        if !node.satisfies_min(&NODE_MIN_VERSION) {
            failures.node = Some(node.to_string());
        }

        Ok(failures)
    }

    /// Stop and remove every simulator container. The first per-resource
    /// failure aborts the whole reset.
    pub async fn reset_docker_containers(&self) -> Result<bool> {
        let docker = connect_docker()?;
        let plan = container_reset_plan(&list_containers(&docker).await?);

        for id in &plan.to_stop {
            docker
                .stop_container(id, Some(StopContainerOptions { t: 30 }))
                .await
                .with_context(|| format!("Failed to stop container {id}"))?;
        }
        for id in &plan.to_remove {
            docker
                .remove_container(id, None)
                .await
                .with_context(|| format!("Failed to remove container {id}"))?;
        }

        Ok(true)
    }

    /// Force-remove every simulator image.
    pub async fn reset_docker_images(&self) -> Result<bool> {
        let docker = connect_docker()?;
        let images = docker
            .list_images(Some(ListImagesOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .context("Failed to list Docker images")?;

        let summaries: Vec<(String, Vec<String>)> = images
            .into_iter()
            .map(|image| (image.id, image.repo_tags))
            .collect();

        for id in image_reset_plan(&summaries) {
            docker
                .remove_image(
                    &id,
                    Some(RemoveImageOptions {
                        force: true,
                        ..Default::default()
                    }),
                    None,
                )
                .await
                .with_context(|| format!("Failed to remove image {id}"))?;
        }

        Ok(true)
    }

    /// Stop running simulator containers without removing them.
    pub async fn stop_docker_containers(&self) -> Result<bool> {
        let docker = connect_docker()?;
        let containers = list_containers(&docker).await?;

        for container in containers {
            let name = container.name.trim_start_matches('/');
            if !name.starts_with(SIMULATOR_PREFIX) || !container.running {
                continue;
            }
            docker
                .stop_container(&container.id, Some(StopContainerOptions { t: 30 }))
                .await
                .with_context(|| format!("Failed to stop container {}", container.id))?;
        }

        Ok(true)
    }

    /// Build and start the simulator with the platform's shell template.
    pub async fn run_simulator(&self) -> Result<CommandOutput> {
        let dir = self.simulator_dir.to_string_lossy();
        let output = match self.platform {
            Platform::Linux => {
                let script = format!("cd '{dir}' && docker compose up -d");
                system::run("sh", &["-c", &script]).await?
            }
            Platform::MacOs => {
                let script = format!("cd '{dir}' && docker compose up -d --remove-orphans");
                system::run("sh", &["-c", &script]).await?
            }
            Platform::Windows => {
                let script = format!("cd /d \"{dir}\" && docker compose up -d");
                system::run("cmd", &["/C", &script]).await?
            }
        };
        Ok(output)
    }

    /// Poll the `ping` RPC until the simulator reports ready or the retry
    /// budget runs out.
    pub async fn wait_for_simulator_to_be_ready(&self, retries: u32) -> WaitOutcome {
        let rpc = self.rpc.clone();
        poll_until_ready(
            move || {
                let rpc = rpc.clone();
                async move { rpc.request("ping", json!([])).await.map_err(Into::into) }
            },
            retries,
            READY_POLL_INTERVAL,
        )
        .await
    }

    pub async fn delete_all_validators(&self) -> Result<Value> {
        let response = self
            .rpc
            .request_ok("sim_deleteAllValidators", json!([]))
            .await
            .context("Failed to delete validators")?;
        Ok(response)
    }

    pub async fn create_random_validators(
        &self,
        count: usize,
        providers: &[String],
    ) -> Result<Value> {
        let response = self
            .rpc
            .request_ok("sim_createRandomValidators", json!([count, providers]))
            .await
            .context("Failed to create validators")?;
        Ok(response)
    }

    pub fn env_file_path(&self) -> PathBuf {
        self.simulator_dir.join(".env")
    }

    /// Merge new keys into the simulator's `.env` file, writing a
    /// timestamped `.bak` of the prior content first. A missing env file
    /// is a fatal error, never silently created.
    pub fn add_config_to_env_file(&self, new_config: &BTreeMap<String, String>) -> Result<()> {
        let path = self.env_file_path();
        if !path.exists() {
            log::error!("env file not found at {}", path.display());
            anyhow::bail!("env file not found at {}", path.display());
        }

        let original = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read env file {}", path.display()))?;

        let backup = path.with_file_name(format!(
            ".env.{}.bak",
            Utc::now().format("%Y%m%d%H%M%S")
        ));
        fs::write(&backup, &original)
            .with_context(|| format!("Failed to write env backup {}", backup.display()))?;

        let merged = merge_env(&original, new_config);
        fs::write(&path, merged)
            .with_context(|| format!("Failed to write env file {}", path.display()))?;

        Ok(())
    }

    /// Derive the frontend URL from the env file's port. Pure read.
    pub fn get_frontend_url(&self) -> Result<String> {
        let path = self.env_file_path();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read env file {}", path.display()))?;

        let port = parse_env(&content)
            .into_iter()
            .find(|(key, _)| key == FRONTEND_PORT_KEY)
            .map(|(_, value)| value)
            .with_context(|| format!("{FRONTEND_PORT_KEY} not set in {}", path.display()))?;

        Ok(format!("http://localhost:{}/", port.trim()))
    }

    /// Open the frontend in the default browser. True means the opener
    /// was dispatched, not that the browser actually opened.
    pub async fn open_frontend(&self) -> Result<bool> {
        let url = self.get_frontend_url()?;
        system::open_url(self.platform, &url).await?;
        Ok(true)
    }
}

fn connect_docker() -> Result<Docker> {
    Docker::connect_with_local_defaults().context("Failed to connect to the Docker daemon")
}

async fn list_containers(docker: &Docker) -> Result<Vec<ContainerInfo>> {
    let summaries = docker
        .list_containers(Some(ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        }))
        .await
        .context("Failed to list Docker containers")?;

    Ok(summaries
        .into_iter()
        .filter_map(|summary| {
            let id = summary.id?;
            let name = summary
                .names
                .and_then(|names| names.into_iter().next())
                .unwrap_or_default();
            let running = summary.state.as_deref() == Some("running");
            Some(ContainerInfo { id, name, running })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn container(id: &str, name: &str, running: bool) -> ContainerInfo {
        ContainerInfo {
            id: id.to_string(),
            name: name.to_string(),
            running,
        }
    }

    #[test]
    fn test_ready_shape_bare_result() {
        assert!(response_indicates_ready(&json!({"result": "OK"})));
    }

    #[test]
    fn test_ready_shape_result_status() {
        assert!(response_indicates_ready(
            &json!({"result": {"status": "OK"}})
        ));
    }

    #[test]
    fn test_ready_shape_result_data_status() {
        assert!(response_indicates_ready(
            &json!({"result": {"data": {"status": "OK"}}})
        ));
    }

    #[test]
    fn test_not_ready_shapes() {
        assert!(!response_indicates_ready(
            &json!({"result": {"status": "NOT_OK"}})
        ));
        assert!(!response_indicates_ready(&json!({"result": "BOOTING"})));
        assert!(!response_indicates_ready(&json!({})));
        assert!(!response_indicates_ready(&json!({"result": null})));
    }

    #[tokio::test]
    async fn test_poll_times_out_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let outcome = poll_until_ready(
            move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(json!({"result": {"status": "NOT_OK"}})))
                }
            },
            1,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(outcome, WaitOutcome::Timeout);
        assert_eq!(outcome.error_code(), Some("TIMEOUT"));
        assert!(!outcome.initialized());
        // retries=1 means exactly one ping, no infinite loop
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_recognizes_ready() {
        let outcome = poll_until_ready(
            || async { Ok(Some(json!({"result": "OK"}))) },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(outcome, WaitOutcome::Ready);
        assert!(outcome.initialized());
        assert_eq!(outcome.error_code(), None);
    }

    #[tokio::test]
    async fn test_poll_retries_missing_answer_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let outcome = poll_until_ready(
            move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Ok(None)
                    } else {
                        Ok(Some(json!({"result": "OK"})))
                    }
                }
            },
            5,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(outcome, WaitOutcome::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_fails_fast_on_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let outcome = poll_until_ready(
            move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("connection reset"))
                }
            },
            10,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(outcome.error_code(), Some("ERROR"));
        assert_eq!(outcome.error_message(), Some("connection reset"));
        // hard errors are not retried
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_container_reset_plan_filters_by_prefix() {
        let containers = vec![
            container("c1", "/genlayer-simulator-backend", true),
            container("c2", "/genlayer-simulator-ollama", false),
            container("c3", "/postgres", true),
        ];

        let plan = container_reset_plan(&containers);

        // exactly one stop (the running prefixed one), two removes
        assert_eq!(plan.to_stop, vec!["c1".to_string()]);
        assert_eq!(plan.to_remove, vec!["c1".to_string(), "c2".to_string()]);
    }

    #[test]
    fn test_container_reset_plan_empty_when_nothing_matches() {
        let containers = vec![
            container("c1", "/redis", true),
            container("c2", "/some-other-app", false),
        ];
        assert_eq!(container_reset_plan(&containers), ResetPlan::default());
    }

    #[test]
    fn test_image_reset_plan() {
        let images = vec![
            (
                "img1".to_string(),
                vec!["genlayer-simulator-backend:latest".to_string()],
            ),
            ("img2".to_string(), vec!["postgres:16".to_string()]),
            ("img3".to_string(), vec![]),
        ];
        assert_eq!(image_reset_plan(&images), vec!["img1".to_string()]);
    }

    #[test]
    fn test_parse_env_skips_comments_and_blanks() {
        let parsed = parse_env("# comment\n\nKEY1=value1\nKEY2=a=b\n");
        assert_eq!(
            parsed,
            vec![
                ("KEY1".to_string(), "value1".to_string()),
                ("KEY2".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn test_merge_env_new_wins_and_appends() {
        let original = "KEY1=value1\nKEY2=value2";
        let mut new_config = BTreeMap::new();
        new_config.insert("KEY2".to_string(), "newValue2".to_string());
        new_config.insert("KEY3".to_string(), "value3".to_string());

        let merged = merge_env(original, &new_config);
        assert_eq!(merged, "KEY1=value1\nKEY2=newValue2\nKEY3=value3");
    }

    #[test]
    fn test_add_config_writes_backup_first() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = SimulatorOrchestrator::new(
            JsonRpcClient::new("http://localhost:4000/api"),
            Platform::Linux,
            dir.path().to_path_buf(),
        );

        fs::write(orchestrator.env_file_path(), "KEY1=value1\nKEY2=value2").unwrap();

        let mut new_config = BTreeMap::new();
        new_config.insert("KEY2".to_string(), "newValue2".to_string());
        new_config.insert("KEY3".to_string(), "value3".to_string());
        orchestrator.add_config_to_env_file(&new_config).unwrap();

        let merged = fs::read_to_string(orchestrator.env_file_path()).unwrap();
        assert_eq!(merged, "KEY1=value1\nKEY2=newValue2\nKEY3=value3");

        let backup = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .find(|entry| entry.file_name().to_string_lossy().ends_with(".bak"))
            .expect("a .bak backup must exist");
        assert_eq!(
            fs::read_to_string(backup.path()).unwrap(),
            "KEY1=value1\nKEY2=value2"
        );
    }

    #[test]
    fn test_add_config_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = SimulatorOrchestrator::new(
            JsonRpcClient::new("http://localhost:4000/api"),
            Platform::Linux,
            dir.path().to_path_buf(),
        );

        let err = orchestrator
            .add_config_to_env_file(&BTreeMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("env file not found"));
    }

    #[test]
    fn test_frontend_url_from_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = SimulatorOrchestrator::new(
            JsonRpcClient::new("http://localhost:4000/api"),
            Platform::Linux,
            dir.path().to_path_buf(),
        );

        fs::write(orchestrator.env_file_path(), "FRONTEND_PORT=8080\n").unwrap();
        assert_eq!(
            orchestrator.get_frontend_url().unwrap(),
            "http://localhost:8080/"
        );
    }

    #[test]
    fn test_frontend_url_missing_port() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = SimulatorOrchestrator::new(
            JsonRpcClient::new("http://localhost:4000/api"),
            Platform::Linux,
            dir.path().to_path_buf(),
        );

        fs::write(orchestrator.env_file_path(), "OTHER=1\n").unwrap();
        assert!(orchestrator.get_frontend_url().is_err());
    }
}
