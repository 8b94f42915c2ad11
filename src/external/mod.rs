//! Collaborators the audit engine talks to.
//!
//! The engine only sees the traits below. The service wires in the reference
//! implementations from this module; tests substitute in-crate fakes.

pub mod callback;
pub mod catalog;
pub mod client;
pub mod error;
pub mod evaluator;
pub mod exporter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::audit::export::{ExportArtifact, ExportFormat};
use crate::audit::types::{Document, JobSummary, Rule, RuleResult, Verdict};

pub use callback::HttpCallbackClient;
pub use catalog::Catalog;
pub use error::{ExternalError, ExternalResult};
pub use evaluator::KeywordEvaluator;
pub use exporter::UnavailableExporter;

/// Decides whether a document satisfies a rule
#[async_trait]
pub trait RuleEvaluator: Send + Sync {
    async fn evaluate(&self, document: &Document, rule: &Rule) -> ExternalResult<Verdict>;

    /// Fails when the evaluator cannot be invoked at all. A failure here
    /// fails the whole job instead of individual tasks.
    async fn ready(&self) -> ExternalResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait RuleSetRepository: Send + Sync {
    /// Rules of a rule set, in declaration order
    async fn resolve(&self, rule_set_id: &str) -> ExternalResult<Vec<Rule>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch(&self, document_id: &str) -> ExternalResult<Document>;
}

/// Renders binary export formats
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn render(
        &self,
        format: ExportFormat,
        results: &[RuleResult],
        summary: &JobSummary,
    ) -> ExternalResult<ExportArtifact>;
}

#[async_trait]
pub trait CallbackClient: Send + Sync {
    async fn post(&self, url: &str, payload: &serde_json::Value) -> ExternalResult<()>;
}

/// The full set of collaborators an audit service needs
#[derive(Clone)]
pub struct Collaborators {
    pub evaluator: Arc<dyn RuleEvaluator>,
    pub rule_sets: Arc<dyn RuleSetRepository>,
    pub documents: Arc<dyn DocumentStore>,
    pub exporter: Arc<dyn Exporter>,
    pub callbacks: Arc<dyn CallbackClient>,
}

impl Collaborators {
    /// Reference collaborators backed by one catalog
    pub fn from_catalog(catalog: Arc<Catalog>, callback_timeout: Duration) -> Self {
        Self {
            evaluator: Arc::new(KeywordEvaluator::new()),
            rule_sets: Arc::clone(&catalog) as Arc<dyn RuleSetRepository>,
            documents: catalog,
            exporter: Arc::new(UnavailableExporter),
            callbacks: Arc::new(HttpCallbackClient::with_timeout(callback_timeout)),
        }
    }
}
