//! Configuration generation ("hot reload").
//!
//! A `Generation` bundles everything that is rebuilt wholesale on a
//! successful config reload: resolved policy, upstream clients, the
//! aggregator built on top of them, and the pluggable LLM/tokenizer
//! capabilities. The cache and retry tracker are deliberately NOT part of
//! a generation — they outlive a reload (see DESIGN.md, "cache/tracker
//! survive hot reload").

use crate::aggregator::Aggregator;
use crate::capability::{LlmClient, Tokenizer};
use crate::masker::PiiMasker;
use crate::resolver::ToolConfigResolver;
use crate::router::Router;
use crate::upstream::UpstreamClient;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Generation {
    pub id: u64,
    pub resolver: Arc<ToolConfigResolver>,
    pub aggregator: Arc<Aggregator>,
    pub router: Arc<Router>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub tokenizer: Arc<dyn Tokenizer>,
}

impl Generation {
    #[must_use]
    pub fn new(
        id: u64,
        resolver: ToolConfigResolver,
        clients: HashMap<String, Arc<dyn UpstreamClient>>,
        custom_pii_patterns: Vec<crate::pii_patterns::PiiPattern>,
        llm: Option<Arc<dyn LlmClient>>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Self {
        let resolver = Arc::new(resolver);
        let aggregator = Arc::new(Aggregator::new(clients));
        let masker = Arc::new(PiiMasker::new(custom_pii_patterns));
        let router = Arc::new(Router::new(
            aggregator.clone(),
            resolver.clone(),
            masker,
            llm.clone(),
        ));
        Self { id, resolver, aggregator, router, llm, tokenizer }
    }
}
