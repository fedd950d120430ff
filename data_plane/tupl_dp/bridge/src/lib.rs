//! # Request-Pipeline Runtime
//!
//! Everything that touches a live request on its way through the gateway:
//! protocol normalization (C6), the aggregated detector pipeline (C3),
//! content masking (C5), conversation tracking (C12), the priority
//! queue/worker pool (C8), the upstream forwarder (C9), and the Interceptor
//! (C7) that wires them together. The rule data model these operate
//! against lives in the `rule_engine` crate.

// Core modules
pub mod aggregator;
pub mod conversation;
pub mod errors;
pub mod forwarder;
pub mod interceptor;
pub mod masker;
pub mod protocol;
pub mod queue;
pub mod types;

// Re-export commonly used types
pub use aggregator::{Aggregator, AggregatorConfig};
pub use conversation::{ConversationState, ConversationTracker};
pub use errors::{BridgeError, Result};
pub use forwarder::{ForwardOutcome, ProviderEndpoint, ProviderRegistry, StreamHandle, UpstreamForwarder};
pub use interceptor::{new_request_id, InterceptOutcome, Interceptor};
pub use masker::mask_response;
pub use queue::{EnqueueError, PriorityQueue, WorkerPool};
pub use types::{
    InterceptedRequest, InterceptedResponse, Priority, ProviderTag, QueuedRequest, StandardChoice,
    StandardMessage, StandardRequest, StandardResponse, StandardUsage,
};
