pub mod adapter;
pub mod capability;
pub mod key;
pub mod model;
pub mod selector;

pub use adapter::{
    HttpMethod, ProviderAdapter, TransportErrorKind, UpstreamFailure, WireRequest, WireResponse,
    classify_failure,
};
pub use capability::CapabilitySet;
pub use key::{Key, KeyId};
pub use model::{
    AttemptRecord, AttemptTarget, ChatMessage, ChatRole, Choice, FinishReason, GatewayRequest,
    GatewayResponse, RequestInput, RequestParams, ResponseMeta, ToolCallRequest, ToolChoicePolicy,
    ToolSpec, Usage,
};
pub use selector::{KeySelector, SelectError};
