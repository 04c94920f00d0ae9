//! Garbage collection of superseded engine instances.

use crate::domain::{CollectReport, InstanceName};
use crate::ports::{ContainerRuntime, RemoveOutcome};

/// GarbageCollector は不要になったインスタンスを削除する
///
/// # 設計原則
/// - 失敗は呼び出し元に返さない（ログのみ）
/// - 他のプロセスが削除中なら、それで十分
pub struct GarbageCollector<'a> {
    runtime: &'a dyn ContainerRuntime,
}

impl<'a> GarbageCollector<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime) -> Self {
        Self { runtime }
    }

    /// Remove each instance, one after another.
    pub async fn collect(&self, names: &[InstanceName]) -> CollectReport {
        let mut report = CollectReport::default();
        for name in names {
            if name.is_empty() {
                continue;
            }
            match self.runtime.remove(name).await {
                Ok(RemoveOutcome::Removed) => {
                    tracing::info!(instance = %name, "removed old engine");
                    report.removed.push(name.clone());
                }
                Ok(RemoveOutcome::AlreadyInProgress) => {
                    tracing::debug!(instance = %name, "removal already in progress");
                    report.in_progress.push(name.clone());
                }
                Err(err) => {
                    tracing::warn!(instance = %name, error = %err, "failed to remove old engine");
                    report.failed.push(name.clone());
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryRuntime, RuntimeCall};

    #[tokio::test]
    async fn failures_do_not_stop_the_loop() {
        let runtime = InMemoryRuntime::new()
            .with_containers(["e-1", "e-2", "e-3"])
            .failing_remove("e-1", "Error response from daemon: device or resource busy")
            .removal_in_progress("e-2");

        let names: Vec<InstanceName> = ["e-1", "e-2", "e-3"].into_iter().map(InstanceName::new).collect();
        let report = GarbageCollector::new(&runtime).collect(&names).await;

        assert_eq!(report.failed, vec![InstanceName::new("e-1")]);
        assert_eq!(report.in_progress, vec![InstanceName::new("e-2")]);
        assert_eq!(report.removed, vec![InstanceName::new("e-3")]);
        assert!(!report.is_clean());
        assert_eq!(runtime.calls().len(), 3);
    }

    #[tokio::test]
    async fn empty_names_are_skipped() {
        let runtime = InMemoryRuntime::new().with_containers(["e-1"]);
        let names = vec![InstanceName::new(""), InstanceName::new("e-1")];
        let report = GarbageCollector::new(&runtime).collect(&names).await;

        assert_eq!(report.removed.len(), 1);
        assert_eq!(runtime.calls(), vec![RuntimeCall::Remove("e-1".into())]);
    }
}
