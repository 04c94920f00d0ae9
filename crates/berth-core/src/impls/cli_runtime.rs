//! CliRuntime - docker / podman / nerdctl の CLI を叩く ContainerRuntime 実装
//!
//! # 学習ポイント
//! - `tokio::process::Command` + `kill_on_drop`（future の drop = プロセス停止）
//! - 引数の組み立ては純粋関数にしてテストする
//! - 出力の分類は `PhraseTable` に閉じ込める

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use std::str::FromStr;

use super::phrases::{PHRASE_TABLE_VERSION, PhraseTable, Recognized};
use crate::domain::{InstanceName, RuntimeError, RuntimeOp};
use crate::ports::{ContainerRuntime, EnvVar, RemoveOutcome, RunOutcome, RunSpec};

/// Which CLI-compatible runtime to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeFlavor {
    #[default]
    Docker,
    Podman,
    Nerdctl,
}

impl RuntimeFlavor {
    pub fn program(&self) -> &'static str {
        match self {
            RuntimeFlavor::Docker => "docker",
            RuntimeFlavor::Podman => "podman",
            RuntimeFlavor::Nerdctl => "nerdctl",
        }
    }

    /// Scheme of the connection handle clients dial.
    pub fn handle_scheme(&self) -> &'static str {
        match self {
            RuntimeFlavor::Docker => "docker-container",
            RuntimeFlavor::Podman => "podman-container",
            RuntimeFlavor::Nerdctl => "nerdctl-container",
        }
    }

    /// Value for `ps --filter`. Docker names carry a leading `/`, podman's
    /// don't, and nerdctl only does substring matching; discovery re-checks
    /// the prefix either way.
    fn name_filter(&self, prefix: &str) -> String {
        match self {
            RuntimeFlavor::Docker => format!("name=^/{prefix}"),
            RuntimeFlavor::Podman => format!("name=^{prefix}"),
            RuntimeFlavor::Nerdctl => format!("name={prefix}"),
        }
    }
}

impl fmt::Display for RuntimeFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown container runtime {0:?} (expected docker, podman or nerdctl)")]
pub struct UnknownFlavor(String);

impl FromStr for RuntimeFlavor {
    type Err = UnknownFlavor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(RuntimeFlavor::Docker),
            "podman" => Ok(RuntimeFlavor::Podman),
            "nerdctl" => Ok(RuntimeFlavor::Nerdctl),
            _ => Err(UnknownFlavor(s.to_string())),
        }
    }
}

/// Exit status and output of one runtime invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl Execution {
    /// stdout followed by stderr, trimmed. Used as the diagnostic text.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        out.push_str(self.stdout.trim());
        if !self.stdout.trim().is_empty() && !self.stderr.trim().is_empty() {
            out.push('\n');
        }
        out.push_str(self.stderr.trim());
        out
    }
}

pub struct CliRuntime {
    flavor: RuntimeFlavor,
    program: String,
    phrases: PhraseTable,
}

impl CliRuntime {
    pub fn new(flavor: RuntimeFlavor) -> Self {
        Self {
            flavor,
            program: flavor.program().to_string(),
            phrases: PhraseTable::builtin(),
        }
    }

    /// Use a different executable (absolute path, wrapper script, ...).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_phrases(mut self, phrases: PhraseTable) -> Self {
        self.phrases = phrases;
        self
    }

    pub fn list_args(&self, prefix: &str) -> Vec<String> {
        vec![
            "ps".to_string(),
            "-a".to_string(),
            "--no-trunc".to_string(),
            "--filter".to_string(),
            self.flavor.name_filter(prefix),
            "--format".to_string(),
            "{{.Names}}".to_string(),
        ]
    }

    pub fn start_args(&self, name: &InstanceName) -> Vec<String> {
        vec!["start".to_string(), name.to_string()]
    }

    /// Env values are not part of argv: `-e NAME` makes the CLI copy the
    /// value from its own environment, which [`CliRuntime::exec`] sets.
    pub fn run_args(&self, spec: &RunSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--name".to_string(),
            spec.name.to_string(),
            "-d".to_string(),
        ];
        if let Some(restart) = &spec.restart {
            args.push("--restart".to_string());
            args.push(restart.clone());
        }
        for var in &spec.env {
            args.push("-e".to_string());
            args.push(var.name.clone());
        }
        for mount in &spec.mounts {
            args.push("-v".to_string());
            args.push(match &mount.source {
                Some(source) => format!("{source}:{}", mount.target),
                None => mount.target.clone(),
            });
        }
        if spec.privileged {
            args.push("--privileged".to_string());
        }
        args.push(spec.image.clone());
        args.extend(spec.args.iter().cloned());
        args
    }

    pub fn remove_args(&self, name: &InstanceName) -> Vec<String> {
        vec!["rm".to_string(), "-fv".to_string(), name.to_string()]
    }

    /// Run the CLI to completion. Dropping the returned future kills the child.
    pub async fn exec(&self, args: &[String], env: &[EnvVar]) -> Result<Execution, RuntimeError> {
        tracing::debug!(program = %self.program, ?args, "invoking container runtime");
        let output = tokio::process::Command::new(&self.program)
            .args(args)
            .envs(env.iter().map(|var| (var.name.as_str(), var.value.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        Ok(Execution {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    pub fn list_outcome(&self, prefix: &str, exec: Execution) -> Result<Vec<String>, RuntimeError> {
        if !exec.success {
            return Err(RuntimeError::invocation(RuntimeOp::List, prefix, exec.combined()));
        }
        Ok(exec
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn run_outcome(&self, name: &InstanceName, exec: Execution) -> Result<RunOutcome, RuntimeError> {
        if exec.success {
            return Ok(RunOutcome::Created);
        }
        let diagnostic = exec.combined();
        if self.phrases.is(&diagnostic, Recognized::NameConflict) {
            tracing::debug!(instance = %name, phrase_table = PHRASE_TABLE_VERSION, "run reported a name conflict");
            return Ok(RunOutcome::AlreadyExists);
        }
        Err(RuntimeError::invocation(RuntimeOp::Run, name.as_str(), diagnostic))
    }

    pub fn remove_outcome(
        &self,
        name: &InstanceName,
        exec: Execution,
    ) -> Result<RemoveOutcome, RuntimeError> {
        if exec.success {
            return Ok(RemoveOutcome::Removed);
        }
        let diagnostic = exec.combined();
        if self.phrases.is(&diagnostic, Recognized::RemovalInProgress) {
            tracing::debug!(instance = %name, phrase_table = PHRASE_TABLE_VERSION, "remove reported removal in progress");
            return Ok(RemoveOutcome::AlreadyInProgress);
        }
        Err(RuntimeError::invocation(RuntimeOp::Remove, name.as_str(), diagnostic))
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, RuntimeError> {
        let exec = self.exec(&self.list_args(prefix), &[]).await?;
        self.list_outcome(prefix, exec)
    }

    async fn start(&self, name: &InstanceName) -> Result<(), RuntimeError> {
        let exec = self.exec(&self.start_args(name), &[]).await?;
        if exec.success {
            Ok(())
        } else {
            Err(RuntimeError::invocation(RuntimeOp::Start, name.as_str(), exec.combined()))
        }
    }

    async fn run(&self, spec: &RunSpec) -> Result<RunOutcome, RuntimeError> {
        let exec = self.exec(&self.run_args(spec), &spec.env).await?;
        self.run_outcome(&spec.name, exec)
    }

    async fn remove(&self, name: &InstanceName) -> Result<RemoveOutcome, RuntimeError> {
        let exec = self.exec(&self.remove_args(name), &[]).await?;
        self.remove_outcome(name, exec)
    }

    fn connection_handle(&self, name: &InstanceName) -> String {
        format!("{}://{}", self.flavor.handle_scheme(), name)
    }
}
