//! Application state shared across HTTP handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::scrape::Scraper;

/// Type alias for shared application state.
pub type SharedState<C> = Arc<AppState<C>>;

/// Global application state, generic over the upstream source so tests can
/// run the full HTTP surface against an in-memory fake.
pub struct AppState<C> {
    pub scraper: Scraper<C>,
    pub config: Arc<Config>,
}
