/*!
 * Page fetchers used by the track codec.
 *
 * The codec never talks to the network directly. It asks a [`PageFetcher`]
 * for the text behind a locator (an item page or a timed-text payload):
 * - `HttpFetcher`: reqwest-backed client for the live site
 * - `MockFetcher`: canned responses and failures for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::FetchError;

/// Source of page and payload text
///
/// Every call is attempted exactly once; retry policy, if any, belongs to
/// the caller.
#[async_trait]
pub trait PageFetcher: Send + Sync + Debug {
    /// Fetch the body behind `locator` as text
    ///
    /// # Arguments
    /// * `locator` - Absolute URL of the page or payload
    ///
    /// # Returns
    /// * `Result<String, FetchError>` - The response body or the transport failure
    async fn fetch_text(&self, locator: &str) -> Result<String, FetchError>;
}

pub mod http;
pub mod mock;

pub use http::HttpFetcher;
pub use mock::MockFetcher;
