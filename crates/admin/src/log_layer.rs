//! A `tracing_subscriber::Layer` that mirrors every event into a bounded
//! in-memory ring buffer and a broadcast channel, so `/logs` can both
//! backfill recent history and stream new lines as they happen.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::field::{Field, Visit};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

#[derive(Clone)]
pub struct LogTail {
    ring: Arc<Mutex<VecDeque<String>>>,
    sender: broadcast::Sender<String>,
    capacity: usize,
}

impl LogTail {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(16));
        Self { ring: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))), sender, capacity }
    }

    /// Lines currently in the ring buffer, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.ring.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    fn push(&self, line: String) {
        let mut ring = self.ring.lock();
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(line.clone());
        drop(ring);
        let _ = self.sender.send(line);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for LogTail {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        self.push(format!("{} {} {}", metadata.level(), metadata.target(), visitor.message));
    }
}
