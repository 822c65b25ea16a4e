use std::sync::Arc;

use super::server::Server;
use crate::config::ServerConfig;
use crate::events::{Bus, DEFAULT_CAPACITY};
use crate::logging::{LogSink, TracingSink};
use crate::policies::{DefaultClassifier, FaultClassifier};

/// Builder for a [`Server`] with optional collaborators.
///
/// Defaults: [`TracingSink`], [`DefaultClassifier`], bus capacity [`DEFAULT_CAPACITY`].
pub struct ServerBuilder {
    cfg: ServerConfig,
    sink: Arc<dyn LogSink>,
    classifier: Arc<dyn FaultClassifier>,
    bus_capacity: usize,
}

impl ServerBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: ServerConfig) -> Self {
        Self {
            cfg,
            sink: Arc::new(TracingSink),
            classifier: Arc::new(DefaultClassifier),
            bus_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Sets where rendered log lines go.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the policy deciding which faults are retried.
    pub fn with_classifier(mut self, classifier: Arc<dyn FaultClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the event bus ring size (clamped to at least 1).
    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Builds the server. Nothing is bound until [`Server::run`].
    pub fn build(self) -> Server {
        Server::from_parts(
            self.cfg,
            self.sink,
            self.classifier,
            Bus::new(self.bus_capacity),
        )
    }
}
