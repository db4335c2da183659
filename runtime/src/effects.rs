//! Effect execution.
//!
//! The engine persists state first and only then hands the reducer's effects
//! to the tracker. Effects run on the tokio runtime in the background; any
//! action they produce is passed to an [`ActionSink`].

use campus_core::effect::Effect;
use futures::future::{BoxFuture, join_all};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;

/// Receives actions produced by effects.
pub type ActionSink<A> = Arc<dyn Fn(A) + Send + Sync>;

/// Execute one effect tree and collect the actions it produced.
pub fn execute<A>(effect: Effect<A>) -> BoxFuture<'static, Vec<A>>
where
    A: Send + 'static,
{
    Box::pin(async move {
        match effect {
            Effect::None => Vec::new(),
            Effect::Future(future) => future.await.into_iter().collect(),
            Effect::Sequential(effects) => {
                let mut actions = Vec::new();
                for effect in effects {
                    actions.extend(execute(effect).await);
                }
                actions
            },
            Effect::Parallel(effects) => join_all(effects.into_iter().map(execute))
                .await
                .into_iter()
                .flatten()
                .collect(),
        }
    })
}

/// Runs effects in the background and keeps track of them.
#[derive(Default)]
pub struct EffectTracker {
    tasks: Mutex<JoinSet<()>>,
}

impl EffectTracker {
    /// Create an idle tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `effects` concurrently. Actions they produce go to `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<A, I>(&self, effects: I, sink: ActionSink<A>)
    where
        A: Send + 'static,
        I: IntoIterator<Item = Effect<A>>,
    {
        let effects: Vec<_> = effects.into_iter().filter(|e| !e.is_none()).collect();
        if effects.is_empty() {
            return;
        }

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap what already finished so the set does not grow unbounded.
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            for action in execute(Effect::Parallel(effects)).await {
                sink(action);
            }
        });
    }

    /// Number of effect batches still running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Wait until every spawned effect has finished.
    pub async fn wait_idle(&self) {
        loop {
            let mut running = {
                let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *tasks)
            };
            if running.is_empty() {
                return;
            }
            while let Some(result) = running.join_next().await {
                if let Err(error) = result {
                    tracing::error!(%error, "Effect task failed");
                }
            }
        }
    }
}

impl std::fmt::Debug for EffectTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectTracker")
            .field("pending", &self.pending())
            .finish()
    }
}
