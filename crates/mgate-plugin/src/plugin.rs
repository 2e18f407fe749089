use async_trait::async_trait;
use mgate_common::GatewayError;
use mgate_provider::{GatewayRequest, GatewayResponse};

use crate::context::PluginContext;

/// What a pre-hook decided: keep going with a (possibly replaced) request,
/// or short-circuit the rest of the dispatch with a synthetic response.
pub enum PreOutcome {
    Continue(GatewayRequest),
    ShortCircuit(GatewayResponse),
}

/// One interceptor in the symmetric pipeline (§4.5). `pre` and `post` are
/// matched by stack discipline: a plugin's `post` runs iff its `pre` ran
/// and returned without error (P1), in strictly reverse order (P2).
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn pre(
        &self,
        ctx: &PluginContext,
        request: GatewayRequest,
    ) -> Result<PreOutcome, GatewayError>;

    async fn post(
        &self,
        ctx: &PluginContext,
        response: GatewayResponse,
    ) -> Result<GatewayResponse, GatewayError>;
}
