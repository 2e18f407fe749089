use tokio_util::sync::CancellationToken;

/// Request-scoped fields visible to every plugin hook. A thin subset of the
/// engine's own request context (deadlines, cancellation, correlation) —
/// plugins never see pool handles or provider internals.
#[derive(Clone)]
pub struct PluginContext {
    pub trace_id: String,
    pub cancel: CancellationToken,
}
