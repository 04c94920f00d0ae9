//! StaticResolver - テスト用の RegistryResolver
//!
//! ネットワークに出ずに、固定の digest / エラーを返す。呼び出し回数を数える。

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{ContentDigest, RegistryError, ServiceReference};
use crate::ports::RegistryResolver;

type ErrorFactory = Box<dyn Fn() -> RegistryError + Send + Sync>;

enum Answer {
    Digest(ContentDigest),
    Error(ErrorFactory),

    /// Never answers. For cancellation and deadline tests.
    Hang,
}

pub struct StaticResolver {
    answer: Answer,
    calls: AtomicUsize,
}

impl StaticResolver {
    pub fn digest(digest: ContentDigest) -> Self {
        Self::with_answer(Answer::Digest(digest))
    }

    pub fn failing<F>(error: F) -> Self
    where
        F: Fn() -> RegistryError + Send + Sync + 'static,
    {
        Self::with_answer(Answer::Error(Box::new(error)))
    }

    /// Registry unreachable.
    pub fn unreachable() -> Self {
        Self::failing(|| RegistryError::Transport("connection refused".to_string()))
    }

    pub fn denied() -> Self {
        Self::failing(|| RegistryError::Denied {
            status: 401,
            message: "UNAUTHORIZED: authentication required".to_string(),
        })
    }

    pub fn hanging() -> Self {
        Self::with_answer(Answer::Hang)
    }

    fn with_answer(answer: Answer) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryResolver for StaticResolver {
    async fn resolve(&self, _reference: &ServiceReference) -> Result<ContentDigest, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Answer::Digest(digest) => Ok(digest.clone()),
            Answer::Error(make) => Err(make()),
            Answer::Hang => std::future::pending().await,
        }
    }
}
