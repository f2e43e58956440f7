/*!
 * Mock fetcher for tests.
 *
 * Responses are registered per locator:
 * - `with_page()` - serve a body
 * - `with_failure()` - fail with the given error
 * - `with_delay()` - hold the response back to shuffle completion order
 *
 * Unregistered locators fail with a 404 status.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::FetchError;
use crate::providers::PageFetcher;

/// Canned outcome for one locator
#[derive(Debug, Clone)]
enum MockOutcome {
    Body(String),
    Failure(FetchError),
}

/// Fetcher that serves registered bodies and records every request
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    outcomes: Arc<Mutex<HashMap<String, MockOutcome>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    requests: Arc<Mutex<Vec<String>>>,
    request_count: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `locator`
    pub fn with_page(self, locator: impl Into<String>, body: impl Into<String>) -> Self {
        self.set_page(locator, body);
        self
    }

    /// Fail every request for `locator` with `error`
    pub fn with_failure(self, locator: impl Into<String>, error: FetchError) -> Self {
        self.outcomes
            .lock()
            .insert(locator.into(), MockOutcome::Failure(error));
        self
    }

    /// Delay the response for `locator`
    pub fn with_delay(self, locator: impl Into<String>, delay: Duration) -> Self {
        self.delays.lock().insert(locator.into(), delay);
        self
    }

    /// Replace the body served for `locator`
    pub fn set_page(&self, locator: impl Into<String>, body: impl Into<String>) {
        self.outcomes
            .lock()
            .insert(locator.into(), MockOutcome::Body(body.into()));
    }

    /// Number of requests made so far, including failed ones
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Locators requested so far, in call order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_text(&self, locator: &str) -> Result<String, FetchError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(locator.to_string());

        let delay = self.delays.lock().get(locator).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.outcomes.lock().get(locator).cloned();
        match outcome {
            Some(MockOutcome::Body(body)) => Ok(body),
            Some(MockOutcome::Failure(error)) => Err(error),
            None => Err(FetchError::Status {
                locator: locator.to_string(),
                status_code: 404,
            }),
        }
    }
}
