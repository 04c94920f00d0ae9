//! InMemoryRuntime - テスト用のコンテナランタイム
//!
//! # 学習ポイント
//! - 名前付きコンテナの集合だけを状態として持つ
//! - すべての呼び出しを `RuntimeCall` として記録（テストで検証するため）
//! - 失敗は呼び出し単位で注入できる

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::domain::{InstanceName, RuntimeError, RuntimeOp};
use crate::ports::{ContainerRuntime, RemoveOutcome, RunOutcome, RunSpec};

/// A call made against the fake, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    List(String),
    Start(InstanceName),
    Run(InstanceName),
    Remove(InstanceName),
}

impl RuntimeCall {
    /// `true` for calls that change runtime state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, RuntimeCall::List(_))
    }
}

#[derive(Default)]
struct State {
    /// Newest first, exactly as `list` reports them (leading `/` allowed).
    listed: Vec<String>,

    /// Exist but were created after the listing was taken.
    unlisted: HashSet<String>,
    calls: Vec<RuntimeCall>,
    runs: Vec<RunSpec>,
    list_failure: Option<String>,
    run_failure: Option<String>,
    start_failures: HashMap<String, String>,
    remove_failures: HashMap<String, String>,
    removing: HashSet<String>,
}

impl State {
    fn exists(&self, name: &str) -> bool {
        self.unlisted.contains(name) || self.listed.iter().any(|n| n.trim_start_matches('/') == name)
    }
}

/// InMemoryRuntime は ContainerRuntime の fake
///
/// # 使用例
/// ```ignore
/// let runtime = InMemoryRuntime::new().with_containers(["berth-engine-aaaa"]);
/// let names = runtime.list("berth-engine-").await?;
/// assert_eq!(runtime.mutations(), 0);
/// ```
pub struct InMemoryRuntime {
    state: Mutex<State>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed existing containers, newest first.
    pub fn with_containers<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().listed = names.into_iter().map(Into::into).collect();
        self
    }

    /// A container that exists but does not show up in `list`, as if a
    /// concurrent provisioner created it right after our listing.
    pub fn with_unlisted(self, name: impl Into<String>) -> Self {
        self.lock().unlisted.insert(name.into());
        self
    }

    pub fn failing_list(self, diagnostic: impl Into<String>) -> Self {
        self.lock().list_failure = Some(diagnostic.into());
        self
    }

    pub fn failing_run(self, diagnostic: impl Into<String>) -> Self {
        self.lock().run_failure = Some(diagnostic.into());
        self
    }

    pub fn failing_start(self, name: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        self.lock().start_failures.insert(name.into(), diagnostic.into());
        self
    }

    pub fn failing_remove(self, name: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        self.lock().remove_failures.insert(name.into(), diagnostic.into());
        self
    }

    /// Another collector is removing `name`.
    pub fn removal_in_progress(self, name: impl Into<String>) -> Self {
        self.lock().removing.insert(name.into());
        self
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.lock().calls.clone()
    }

    pub fn mutations(&self) -> usize {
        self.lock().calls.iter().filter(|c| c.is_mutation()).count()
    }

    pub fn runs(&self) -> Vec<RunSpec> {
        self.lock().runs.clone()
    }

    /// Current container names, newest first, without leading `/`.
    pub fn containers(&self) -> Vec<String> {
        let state = self.lock();
        state
            .listed
            .iter()
            .map(|n| n.trim_start_matches('/').to_string())
            .chain(state.unlisted.iter().cloned())
            .collect()
    }
}

impl Default for InMemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    /// Substring filter, like the loosest real runtime. Callers anchor it.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, RuntimeError> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::List(prefix.to_string()));
        if let Some(diagnostic) = &state.list_failure {
            return Err(RuntimeError::invocation(RuntimeOp::List, prefix, diagnostic.clone()));
        }
        Ok(state
            .listed
            .iter()
            .filter(|n| n.contains(prefix))
            .cloned()
            .collect())
    }

    async fn start(&self, name: &InstanceName) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::Start(name.clone()));
        if let Some(diagnostic) = state.start_failures.get(name.as_str()) {
            return Err(RuntimeError::invocation(RuntimeOp::Start, name.as_str(), diagnostic.clone()));
        }
        if !state.exists(name.as_str()) {
            return Err(RuntimeError::invocation(
                RuntimeOp::Start,
                name.as_str(),
                format!("Error response from daemon: No such container: {name}"),
            ));
        }
        Ok(())
    }

    async fn run(&self, spec: &RunSpec) -> Result<RunOutcome, RuntimeError> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::Run(spec.name.clone()));
        state.runs.push(spec.clone());
        if let Some(diagnostic) = &state.run_failure {
            return Err(RuntimeError::invocation(RuntimeOp::Run, spec.name.as_str(), diagnostic.clone()));
        }
        if state.exists(spec.name.as_str()) {
            return Ok(RunOutcome::AlreadyExists);
        }
        state.listed.insert(0, spec.name.to_string());
        Ok(RunOutcome::Created)
    }

    async fn remove(&self, name: &InstanceName) -> Result<RemoveOutcome, RuntimeError> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::Remove(name.clone()));
        if state.removing.contains(name.as_str()) {
            return Ok(RemoveOutcome::AlreadyInProgress);
        }
        if let Some(diagnostic) = state.remove_failures.get(name.as_str()) {
            return Err(RuntimeError::invocation(RuntimeOp::Remove, name.as_str(), diagnostic.clone()));
        }
        let before = state.listed.len();
        state.listed.retain(|n| n.trim_start_matches('/') != name.as_str());
        let removed_unlisted = state.unlisted.remove(name.as_str());
        if state.listed.len() == before && !removed_unlisted {
            return Err(RuntimeError::invocation(
                RuntimeOp::Remove,
                name.as_str(),
                format!("Error response from daemon: No such container: {name}"),
            ));
        }
        Ok(RemoveOutcome::Removed)
    }

    fn connection_handle(&self, name: &InstanceName) -> String {
        format!("docker-container://{name}")
    }
}
