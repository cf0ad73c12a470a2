pub mod common;
pub mod convert;
pub mod sse;
pub mod stdio;
pub mod streamable_http;

pub use sse::SseUpstreamClient;
pub use stdio::StdioUpstreamClient;
pub use streamable_http::StreamableHttpUpstreamClient;

use mcpcp_core::model::{UpstreamDescriptor, UpstreamTransport};
use mcpcp_core::upstream::UpstreamClient;
use std::sync::Arc;

/// Build the `UpstreamClient` matching a descriptor's configured transport
/// kind. One call site for the `UpstreamTransport` match so adding a fourth
/// transport later only ever touches this function and its own module.
#[must_use]
pub fn build_upstream_client(descriptor: &UpstreamDescriptor) -> Arc<dyn UpstreamClient> {
    match &descriptor.transport {
        UpstreamTransport::Stdio { command, args, env } => Arc::new(StdioUpstreamClient::new(
            descriptor.id.clone(),
            command.clone(),
            args.clone(),
            env.clone(),
        )),
        UpstreamTransport::Sse { url, headers } => {
            Arc::new(SseUpstreamClient::new(descriptor.id.clone(), url.clone(), headers.clone()))
        }
        UpstreamTransport::StreamableHttp { url, headers } => {
            Arc::new(StreamableHttpUpstreamClient::new(descriptor.id.clone(), url.clone(), headers.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn stdio_descriptor_builds_a_stdio_client() {
        let descriptor = UpstreamDescriptor {
            id: "files".to_string(),
            display_name: "files".to_string(),
            transport: UpstreamTransport::Stdio {
                command: "mcp-server-filesystem".to_string(),
                args: vec![],
                env: HashMap::new(),
            },
            enabled: true,
        };
        let client = build_upstream_client(&descriptor);
        assert_eq!(client.id(), "files");
    }

    #[test]
    fn streamable_http_descriptor_builds_a_streamable_http_client() {
        let descriptor = UpstreamDescriptor {
            id: "search".to_string(),
            display_name: "search".to_string(),
            transport: UpstreamTransport::StreamableHttp {
                url: "https://example.invalid/mcp".to_string(),
                headers: HashMap::new(),
            },
            enabled: true,
        };
        let client = build_upstream_client(&descriptor);
        assert_eq!(client.id(), "search");
    }

    #[tokio::test]
    async fn a_freshly_built_client_reports_disconnected() {
        let descriptor = UpstreamDescriptor {
            id: "files".to_string(),
            display_name: "files".to_string(),
            transport: UpstreamTransport::Stdio {
                command: "true".to_string(),
                args: vec![],
                env: HashMap::new(),
            },
            enabled: true,
        };
        let client = build_upstream_client(&descriptor);
        assert!(!*client.is_connected().borrow());
    }
}
