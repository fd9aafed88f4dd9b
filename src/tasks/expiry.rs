//! Expiry Task
//!
//! A deferred action that fires once at a record's deadline.
//!
//! Each armed timer is identified by a token. Aborting the task stops a timer
//! that is still sleeping; the token covers the window where the task already
//! woke up and is waiting for the cache lock. The fire action must check that
//! the record it is about to remove still carries its token.

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

// == Timer Handle ==
/// Owned handle to one armed expiry timer.
///
/// Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    token: u64,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// Token the fire action was armed with.
    pub fn token(&self) -> u64 {
        self.token
    }

    // == Cancel ==
    /// Stops the timer. Has no effect once the fire action has run.
    pub fn cancel(mut self) {
        self.abort();
    }

    // == Detach ==
    /// Releases the handle without aborting the task.
    ///
    /// Used by the fire action itself when it removes its own record.
    pub fn detach(mut self) {
        self.task.take();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            trace!(token = self.token, "Cancelling expiry timer");
            task.abort();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

// == Spawn Expiry Task ==
/// Spawns a task on `runtime` that sleeps until `deadline` and then runs `on_fire`.
///
/// # Arguments
/// * `runtime` - Runtime the timer task is spawned on
/// * `token` - Identifier of this arming, handed back to `on_fire`
/// * `deadline` - Instant at or after which `on_fire` runs
/// * `on_fire` - Action run once the deadline passes, unless cancelled first
///
/// # Returns
/// A `TimerHandle` owning the task.
pub fn spawn_expiry_task<F>(
    runtime: &Handle,
    token: u64,
    deadline: Instant,
    on_fire: F,
) -> TimerHandle
where
    F: FnOnce(u64) + Send + 'static,
{
    let task = runtime.spawn(async move {
        tokio::time::sleep_until(deadline).await;
        trace!(token, "Expiry timer fired");
        on_fire(token);
    });

    TimerHandle {
        token,
        task: Some(task),
    }
}
