use pricewatch_core::{Controller, CrawlEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Shared application state, available to all route handlers via `State<Arc<AppState<..>>>`.
pub struct AppState<T, S> {
    pub crawler: Controller<T, S>,
    /// Engine events; every SSE client subscribes to this sender.
    pub events: broadcast::Sender<CrawlEvent>,
    /// Admin token protecting the `/v1` routes (None = control API disabled).
    pub admin_token: Option<String>,
    /// Fired on shutdown so open event streams end.
    pub shutdown: CancellationToken,
}
