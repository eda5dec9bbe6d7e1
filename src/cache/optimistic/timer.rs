//! Cancellable one-shot timers on the tokio runtime

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Handle to a delayed task; the task is aborted on `cancel` or drop
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Run `action` on `runtime` once `delay` has elapsed.
    ///
    /// Falls back to the runtime of the calling thread when no handle is
    /// given. Returns `None` when neither exists; the caller then simply has
    /// no timer for this entry.
    pub fn schedule<F>(runtime: Option<&Handle>, delay: Duration, action: F) -> Option<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = match runtime {
            Some(handle) => handle.clone(),
            None => match Handle::try_current() {
                Ok(handle) => handle,
                Err(_) => {
                    log::warn!("No tokio runtime available, timer of {:?} not armed", delay);
                    return None;
                }
            },
        };
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        Some(Self { task })
    }

    pub fn cancel(self) {
        // Drop aborts.
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
