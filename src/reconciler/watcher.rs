/*!
 * Change coalescing.
 *
 * A [`ChangeWatcher`] owns one mutation subscription and a [`Debouncer`].
 * Relevant batches arm the debouncer; any batch that arrives while it is
 * armed pushes the deadline back. The watcher reports a change only once the
 * burst has been quiet for the whole window.
 */

use std::future;
use std::time::Duration;

use tokio::time::Instant;

use crate::dom::{MutationBatch, MutationStream};

/// Resettable quiescence timer
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Arm the timer, or push an armed deadline back to a full window
    pub fn poke(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolve once the armed deadline passes; pends forever when disarmed
    ///
    /// Cancel safe: dropping the future keeps the deadline.
    pub async fn elapsed(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => future::pending::<()>().await,
        }
    }
}

/// A mutation subscription with debounced delivery
#[derive(Debug)]
pub struct ChangeWatcher {
    stream: Option<MutationStream>,
    debounce: Debouncer,
}

impl ChangeWatcher {
    pub fn new(window: Duration) -> Self {
        Self {
            stream: None,
            debounce: Debouncer::new(window),
        }
    }

    /// Replace the subscription; a pending burst is dropped
    pub fn attach(&mut self, stream: MutationStream) {
        self.stream = Some(stream);
        self.debounce.cancel();
    }

    /// Drop the subscription, disconnecting the observer
    pub fn detach(&mut self) {
        self.stream = None;
        self.debounce.cancel();
    }

    pub fn is_attached(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Wait until a burst that contained a relevant batch has gone quiet
    ///
    /// Pends forever while detached. Cancel safe.
    pub async fn quiesced(&mut self, mut relevant: impl FnMut(&MutationBatch) -> bool) {
        loop {
            tokio::select! {
                batch = next_batch(&mut self.stream) => match batch {
                    Some(batch) => {
                        if self.debounce.is_pending() || relevant(&batch) {
                            self.debounce.poke();
                        }
                    }
                    None => {
                        // Host dropped the subscription
                        self.stream = None;
                    }
                },
                _ = self.debounce.elapsed() => return,
            }
        }
    }
}

async fn next_batch(stream: &mut Option<MutationStream>) -> Option<MutationBatch> {
    match stream {
        Some(stream) => stream.recv().await,
        None => future::pending().await,
    }
}
