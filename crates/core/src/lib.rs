//! Proxy control plane: aggregation, routing, PII masking, LLM-driven
//! compression, and result caching for a multi-upstream MCP proxy.

pub mod aggregator;
pub mod cache;
pub mod capability;
pub mod compressor;
pub mod content;
pub mod error;
pub mod generation;
pub mod handler;
pub mod masker;
pub mod model;
pub mod pii_patterns;
pub mod policy;
pub mod resolver;
pub mod retry;
pub mod router;
pub mod upstream;

pub use aggregator::Aggregator;
pub use content::{ContentBlock, ToolCallResult};
pub use generation::Generation;
pub use handler::RequestHandler;
pub use model::{AggregatedPrompt, AggregatedResource, AggregatedTool, UpstreamDescriptor, UpstreamTransport};
pub use resolver::ToolConfigResolver;
pub use router::Router;
pub use upstream::UpstreamClient;
