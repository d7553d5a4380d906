//! Owns the long-running tasks of the service and their shutdown.
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Tracks spawned tasks so they can be awaited, or aborted, on shutdown.
///
/// Every task receives the same `watch` shutdown signal through
/// [`TaskManager::get_shutdown_rx`] and is expected to return once it fires.
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<(&'static str, JoinHandle<()>)>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskManager {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_rx,
        }
    }

    /// Spawns a named task and keeps its handle.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        if let Ok(mut handles) = self.handles.lock() {
            handles.push((name, handle));
        }
    }

    pub fn get_shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Waits for all tasks to finish, aborting whatever is still running once
    /// `deadline` has passed.
    pub async fn shutdown(self, deadline: Duration) {
        let handles: Vec<_> = match self.handles.lock() {
            Ok(mut handles) => handles.drain(..).collect(),
            Err(_) => return,
        };
        info!(
            "Waiting up to {:?} for {} tasks to complete...",
            deadline,
            handles.len()
        );

        let task_names: Vec<&'static str> = handles.iter().map(|(name, _)| *name).collect();
        let aborts: Vec<_> = handles.iter().map(|(_, h)| h.abort_handle()).collect();

        let joined = tokio::time::timeout(
            deadline,
            join_all(handles.into_iter().map(|(_, handle)| handle)),
        )
        .await;

        let results = match joined {
            Ok(results) => results,
            Err(_) => {
                warn!(tasks = ?task_names, "Shutdown deadline passed, aborting remaining tasks.");
                for abort in aborts {
                    abort.abort();
                }
                return;
            }
        };

        let mut panicked = Vec::new();
        for (task_name, result) in task_names.into_iter().zip(results) {
            match result {
                Ok(()) => debug!(task_name, "Task shut down gracefully."),
                Err(e) => {
                    error!(task_name, error = %e, "Task failed during shutdown.");
                    panicked.push(task_name);
                }
            }
        }

        if panicked.is_empty() {
            info!("All tasks shut down gracefully.");
        } else {
            error!(tasks = ?panicked, "{} tasks failed during shutdown", panicked.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tasks_stop_on_signal() {
        let (tx, rx) = watch::channel(false);
        let manager = TaskManager::new(rx);

        let mut task_rx = manager.get_shutdown_rx();
        manager.spawn("waiter", async move {
            let _ = task_rx.changed().await;
        });

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), manager.shutdown(Duration::from_secs(1)))
            .await
            .expect("shutdown should finish");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_task_is_aborted_after_deadline() {
        let (_tx, rx) = watch::channel(false);
        let manager = TaskManager::new(rx);
        manager.spawn("stuck", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let started = tokio::time::Instant::now();
        manager.shutdown(Duration::from_secs(2)).await;
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
