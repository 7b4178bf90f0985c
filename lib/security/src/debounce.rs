//! Trailing-edge debouncing of background work.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

type Action = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Runs an action once after a burst of triggers has gone quiet.
///
/// Every [`trigger`](Self::trigger) pushes the deadline `delay` into the
/// future. The action runs once the deadline passes with no further
/// triggers. At most one timer task is pending at a time.
pub struct Debouncer {
    name: &'static str,
    delay: Duration,
    action: Action,
    deadline: Arc<Mutex<Option<Instant>>>,
}

impl Debouncer {
    pub fn new<F>(name: &'static str, delay: Duration, action: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self {
            name,
            delay,
            action: Arc::new(action),
            deadline: Arc::new(Mutex::new(None)),
        }
    }

    /// Schedules the action, postponing any run that is still pending.
    ///
    /// Outside a Tokio runtime the trigger is dropped.
    pub fn trigger(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(debouncer = self.name, "no runtime available, trigger dropped");
            return;
        };

        {
            let mut deadline = self.deadline.lock();
            let pending = deadline.is_some();
            *deadline = Some(Instant::now() + self.delay);
            if pending {
                return;
            }
        }

        let name = self.name;
        let deadline = Arc::clone(&self.deadline);
        let action = Arc::clone(&self.action);
        handle.spawn(async move {
            loop {
                let until = {
                    let mut deadline = deadline.lock();
                    let current = *deadline;
                    match current {
                        None => return,
                        Some(until) if Instant::now() >= until => {
                            *deadline = None;
                            break;
                        }
                        Some(until) => until,
                    }
                };
                tokio::time::sleep_until(until).await;
            }

            debug!(debouncer = name, "running debounced action");
            action().await;
        });
    }

    /// Returns true while a run is scheduled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.lock().is_some()
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("name", &self.name)
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}
