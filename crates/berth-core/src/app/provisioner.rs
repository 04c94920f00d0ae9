//! Provisioner - エンジンインスタンスの調停
//!
//! # フロー
//! 1. reference を parse（失敗は hard）
//! 2. identity を解決（失敗は soft → fallback。digest の形式不正だけは hard）
//! 3. 既存インスタンスを列挙
//! 4. Decider で Decision を決める（純粋関数）
//! 5. Decision を実行（start / run）
//! 6. 残りを GC（失敗しても結果は変わらない）
//!
//! # 並行性
//! ロックは持たない。同じ digest からは同じ名前が導出され、ランタイムの
//! 「名前付き作成」がアトミックなので、同時に走った provisioner は同じ
//! コンテナに収束する。作成競合は成功として扱う。

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::builder::ProvisionerBuilder;
use super::discovery::{discover, try_discover};
use super::gc::GarbageCollector;
use super::identity::resolve_identity;
use crate::config::{EngineEnv, ProvisionerConfig};
use crate::domain::{
    AttemptId, CollectReport, Decider, Decision, InstanceName, LeftoverSet,
    ProvisionError, ProvisionOutcome, ProvisionPath, RuntimeError, ServiceReference,
};
use crate::ports::{ContainerRuntime, Mount, RegistryResolver, RunOutcome, RunSpec};

pub struct Provisioner {
    pub(super) resolver: Arc<dyn RegistryResolver>,
    pub(super) runtime: Arc<dyn ContainerRuntime>,
    pub(super) decider: Box<dyn Decider>,
    pub(super) config: ProvisionerConfig,
    pub(super) env: EngineEnv,
}

impl Provisioner {
    pub fn builder() -> ProvisionerBuilder {
        ProvisionerBuilder::new()
    }

    /// Provision from a runner host (`docker-image://...`) or a plain image reference.
    pub async fn provision(
        &self,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let reference = ServiceReference::from_runner_host(target)?;
        self.provision_reference(&reference, cancel).await
    }

    /// Bring up an engine for `reference` and collect the ones it supersedes.
    ///
    /// Stops early with `Cancelled` when `cancel` fires, or `DeadlineExceeded`
    /// once the configured deadline passes. The in-flight runtime call or
    /// registry request is dropped (and killed) in both cases.
    pub async fn provision_reference(
        &self,
        reference: &ServiceReference,
        cancel: &CancellationToken,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let attempt = AttemptId::generate();
        let span = tracing::info_span!("provision", %attempt, %reference);
        let work = self.reconcile(attempt, reference).instrument(span);

        let bounded = async {
            match self.config.deadline() {
                Some(limit) => tokio::time::timeout(limit, work)
                    .await
                    .map_err(|_| ProvisionError::DeadlineExceeded(limit))?,
                None => work.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(%attempt, "provisioning cancelled");
                Err(ProvisionError::Cancelled)
            }
            result = bounded => result,
        }
    }

    async fn reconcile(
        &self,
        attempt: AttemptId,
        reference: &ServiceReference,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let identity = resolve_identity(self.resolver.as_ref(), reference).await?;
        let leftovers = discover(self.runtime.as_ref(), &self.config.instance_prefix).await;
        let decision = self.decider.decide(identity.digest(), &leftovers);
        tracing::debug!(digest_known = identity.is_known(), ?decision, "reconciliation decision");

        let (instance, path, conflict_absorbed) = match &decision {
            Decision::Reuse { target, .. } => {
                self.runtime.start(target).await?;
                tracing::info!(instance = %target, "reusing existing engine");
                (target.clone(), ProvisionPath::Reused, false)
            }
            Decision::Create { target, .. } => {
                match self.runtime.run(&self.run_spec(target, reference)).await? {
                    RunOutcome::Created => {
                        tracing::info!(instance = %target, "created engine");
                        (target.clone(), ProvisionPath::Created, false)
                    }
                    RunOutcome::AlreadyExists => {
                        tracing::info!(instance = %target, "engine was created concurrently, adopting it");
                        (target.clone(), ProvisionPath::Reused, true)
                    }
                }
            }
            Decision::FallBack { target, .. } => {
                self.runtime.start(target).await?;
                tracing::info!(instance = %target, "started fallback engine");
                (target.clone(), ProvisionPath::FallenBack, false)
            }
            Decision::NoFallback => return Err(ProvisionError::NoFallback),
        };

        let collected = GarbageCollector::new(self.runtime.as_ref())
            .collect(decision.collect())
            .await;

        Ok(ProvisionOutcome {
            attempt,
            handle: self.runtime.connection_handle(&instance),
            instance,
            path,
            conflict_absorbed,
            collected,
        })
    }

    /// What `run` is given for a new instance named `name`.
    pub fn run_spec(&self, name: &InstanceName, reference: &ServiceReference) -> RunSpec {
        RunSpec {
            name: name.clone(),
            image: reference.to_string(),
            env: self.env.container_env(),
            mounts: vec![Mount::anonymous(self.config.state_dir.clone())],
            privileged: self.config.privileged,
            restart: self.config.restart_policy.clone(),
            args: self.config.engine_args.clone(),
        }
    }

    /// Leftover instances, surfacing listing errors.
    pub async fn leftovers(&self) -> Result<LeftoverSet, RuntimeError> {
        try_discover(self.runtime.as_ref(), &self.config.instance_prefix).await
    }

    /// Remove every leftover except `keep`.
    pub async fn collect_leftovers(&self, keep: Option<&InstanceName>) -> Result<CollectReport, RuntimeError> {
        let leftovers = self.leftovers().await?;
        let names = match keep {
            Some(keep) => leftovers.without(keep),
            None => leftovers.into_vec(),
        };
        Ok(GarbageCollector::new(self.runtime.as_ref()).collect(&names).await)
    }
}
