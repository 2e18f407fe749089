use async_trait::async_trait;
use bytes::Bytes;
use mgate_common::{ErrorKind, GatewayError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::capability::CapabilitySet;
use crate::key::Key;
use crate::model::{GatewayRequest, GatewayResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// The provider-native payload produced by `prepare`. Adapters fill in
/// their own method/url/headers/body; the engine never inspects this.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectTimeout,
    ReadTimeout,
    ConnectionReset,
    Dns,
    Tls,
    Other,
}

/// What `execute` can fail with before a response is even parsed —
/// distinct from the closed `ErrorKind` taxonomy, which is what these
/// get classified into by `parse`/`decide_unavailable`.
#[derive(Debug, Clone)]
pub enum UpstreamFailure {
    Transport {
        kind: TransportErrorKind,
        message: String,
    },
    Http {
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
    },
}

/// Classifies an [`UpstreamFailure`] into the closed error taxonomy so the
/// worker pool knows whether to retry (§4.4 step 4).
pub fn classify_failure(failure: &UpstreamFailure) -> ErrorKind {
    match failure {
        UpstreamFailure::Http { status, .. } => match *status {
            401 | 403 => ErrorKind::Auth,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::Upstream5xx,
            _ => ErrorKind::UpstreamMalformed,
        },
        UpstreamFailure::Transport { kind, .. } => match kind {
            TransportErrorKind::ConnectTimeout | TransportErrorKind::ReadTimeout => {
                ErrorKind::Timeout
            }
            _ => ErrorKind::ProviderUnavailable,
        },
    }
}

/// A polymorphic per-upstream contract: translate, execute, parse (§4.3).
/// Adapters are stateless after construction and never invoked outside a
/// worker — the worker pool owns the only call sites for these methods.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> CapabilitySet;

    async fn prepare(
        &self,
        request: &GatewayRequest,
        key: &Key,
    ) -> Result<WireRequest, GatewayError>;

    async fn execute(
        &self,
        wire: WireRequest,
        deadline: Instant,
        cancel: CancellationToken,
    ) -> Result<WireResponse, UpstreamFailure>;

    async fn parse(&self, wire: WireResponse) -> Result<GatewayResponse, GatewayError>;

    /// Classifies a failed `execute` into the closed error taxonomy, so the
    /// worker pool and key selector agree on whether it counts against the
    /// key's health (§4.2) and whether the worker should retry (§4.4).
    /// Adapters override this only for provider-specific status code quirks.
    fn classify(&self, failure: &UpstreamFailure) -> ErrorKind {
        classify_failure(failure)
    }
}
