//! Registry of per-bucket note subscriptions.
//!
//! # Invariants
//! - At most one live note subscription per bucket id.
//! - Every entry's token is a child of the registry root, so cancelling the
//!   root reaches every subscription, including ones added later.
//! - `shutdown` returns only after every task ever registered has finished,
//!   including ones cancelled individually earlier.

use crate::model::board::BucketId;
use log::warn;
use std::collections::BTreeMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct SubscriptionHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

pub(crate) struct SubscriptionRegistry {
    root: CancellationToken,
    entries: BTreeMap<BucketId, SubscriptionHandle>,
    /// Cancelled tasks not yet joined.
    retired: Vec<JoinHandle<()>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new(root: CancellationToken) -> Self {
        Self {
            root,
            entries: BTreeMap::new(),
            retired: Vec::new(),
        }
    }

    /// Token for a subscription about to be registered.
    pub(crate) fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub(crate) fn contains(&self, bucket_id: &str) -> bool {
        self.entries.contains_key(bucket_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn insert(
        &mut self,
        bucket_id: BucketId,
        token: CancellationToken,
        task: JoinHandle<()>,
    ) {
        if let Some(previous) = self
            .entries
            .insert(bucket_id, SubscriptionHandle { token, task })
        {
            previous.token.cancel();
            self.retired.push(previous.task);
        }
    }

    /// Cancels one bucket's subscription without waiting for it.
    pub(crate) fn cancel(&mut self, bucket_id: &str) -> bool {
        match self.entries.remove(bucket_id) {
            Some(handle) => {
                handle.token.cancel();
                self.retired.push(handle.task);
                true
            }
            None => false,
        }
    }

    /// Cancels every subscription and waits for all tasks to exit.
    pub(crate) async fn shutdown(mut self) {
        self.root.cancel();
        let entries = std::mem::take(&mut self.entries);
        for (bucket_id, handle) in entries {
            handle.token.cancel();
            if let Err(err) = handle.task.await {
                warn!(
                    "event=subscription_join module=sync status=error bucket_id={} error={}",
                    bucket_id, err
                );
            }
        }
        for task in std::mem::take(&mut self.retired) {
            if let Err(err) = task.await {
                warn!("event=subscription_join module=sync status=error error={}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriptionRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn spawn_waiter(token: CancellationToken, stopped: Arc<AtomicUsize>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            token.cancelled().await;
            stopped.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn shutdown_cancels_every_registered_task() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let mut registry = SubscriptionRegistry::new(CancellationToken::new());
        for bucket_id in ["k1", "k2", "k3"] {
            let token = registry.child_token();
            let task = spawn_waiter(token.clone(), stopped.clone());
            registry.insert(bucket_id.to_string(), token, task);
        }
        assert_eq!(registry.len(), 3);

        registry.shutdown().await;
        assert_eq!(stopped.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancel_targets_a_single_bucket() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let mut registry = SubscriptionRegistry::new(CancellationToken::new());
        let keep = registry.child_token();
        let drop_token = registry.child_token();
        registry.insert("keep".to_string(), keep.clone(), spawn_waiter(keep.clone(), stopped.clone()));
        registry.insert(
            "drop".to_string(),
            drop_token.clone(),
            spawn_waiter(drop_token.clone(), stopped.clone()),
        );

        assert!(registry.cancel("drop"));
        assert!(!registry.cancel("drop"));
        assert!(drop_token.is_cancelled());
        assert!(!keep.is_cancelled());
        assert!(registry.contains("keep"));
        registry.shutdown().await;
    }
}
