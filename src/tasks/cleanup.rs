//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

// == Sweep Trait ==
/// Something the janitor can purge on every tick.
pub trait Sweep: Send + Sync + 'static {
    /// Removes expired entries and returns how many were dropped.
    fn sweep(&self) -> usize;
}

// == Janitor Handle ==
/// Owner side of a running cleanup task.
///
/// Dropping the handle also stops the task, since the stop channel closes.
#[derive(Debug)]
pub struct Janitor {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Janitor {
    /// Signals the task to stop and waits for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            warn!("TTL cleanup task ended abnormally: {}", e);
        }
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns a task that calls [`Sweep::sweep`] on `target` every `every`.
///
/// The task keeps only a weak reference: it exits on the stop signal, when
/// the stop sender is dropped, or once `target` has been dropped.
///
/// # Example
/// ```ignore
/// let janitor = spawn_janitor(&Handle::current(), Arc::downgrade(&inner), every);
/// // Later, during close:
/// janitor.shutdown().await;
/// ```
pub fn spawn_janitor<T: Sweep>(runtime: &Handle, target: Weak<T>, every: Duration) -> Janitor {
    let (stop, mut stopped) = oneshot::channel::<()>();

    let handle = runtime.spawn(async move {
        info!("Starting TTL cleanup task with interval of {:?}", every);

        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stopped => break,
                _ = ticker.tick() => {
                    let Some(target) = target.upgrade() else {
                        break;
                    };

                    let removed = target.sweep();
                    if removed > 0 {
                        debug!("TTL cleanup: removed {} expired entries", removed);
                    }
                }
            }
        }

        debug!("TTL cleanup task stopped");
    });

    Janitor {
        stop: Some(stop),
        handle,
    }
}
