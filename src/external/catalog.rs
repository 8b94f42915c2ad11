//! In-memory rule sets and documents.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::audit::types::{Document, Rule};
use crate::external::error::{ExternalError, ExternalResult};
use crate::external::{DocumentStore, RuleSetRepository};

/// Named, ordered collection of rules
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    #[serde(default)]
    rule_sets: Vec<RuleSet>,
    #[serde(default)]
    documents: Vec<Document>,
}

/// Read-only catalog serving both rule sets and documents
#[derive(Debug, Default)]
pub struct Catalog {
    rule_sets: HashMap<String, RuleSet>,
    documents: HashMap<String, Document>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads a catalog from a JSON file shaped as
    /// `{"ruleSets": [{"id", "name", "rules"}], "documents": [...]}`.
    pub async fn from_path(path: impl AsRef<Path>) -> ExternalResult<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let catalog = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.as_ref().display(),
            rule_sets = catalog.rule_sets.len(),
            documents = catalog.documents.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> ExternalResult<Self> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        let mut catalog = Self::empty();
        for rule_set in file.rule_sets {
            catalog = catalog.with_rule_set(rule_set);
        }
        for document in file.documents {
            catalog = catalog.with_document(document);
        }
        Ok(catalog)
    }

    /// Later entries with the same id replace earlier ones.
    pub fn with_rule_set(mut self, rule_set: RuleSet) -> Self {
        self.rule_sets.insert(rule_set.id.clone(), rule_set);
        self
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.insert(document.id.clone(), document);
        self
    }

    pub fn rule_set_count(&self) -> usize {
        self.rule_sets.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

#[async_trait]
impl RuleSetRepository for Catalog {
    async fn resolve(&self, rule_set_id: &str) -> ExternalResult<Vec<Rule>> {
        self.rule_sets
            .get(rule_set_id)
            .map(|set| set.rules.clone())
            .ok_or_else(|| ExternalError::not_found("RuleSet", rule_set_id))
    }
}

#[async_trait]
impl DocumentStore for Catalog {
    async fn fetch(&self, document_id: &str) -> ExternalResult<Document> {
        self.documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| ExternalError::not_found("Document", document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CATALOG_JSON: &str = r#"{
        "ruleSets": [
            {
                "id": "health-basic",
                "name": "Health basics",
                "rules": [
                    {"id": "r1", "name": "Waiting period", "keywords": ["waiting period"]},
                    {"id": "r2", "name": "Exclusions", "keywords": ["exclusion"], "threshold": 1.0}
                ]
            }
        ],
        "documents": [
            {"id": "doc-1", "title": "Policy", "paragraphs": [{"page": 1, "text": "A 30 day waiting period applies."}]}
        ]
    }"#;

    #[tokio::test]
    async fn test_from_path_loads_rule_sets_and_documents() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CATALOG_JSON.as_bytes()).unwrap();

        let catalog = Catalog::from_path(file.path()).await.unwrap();
        assert_eq!(catalog.rule_set_count(), 1);
        assert_eq!(catalog.document_count(), 1);

        let rules = catalog.resolve("health-basic").await.unwrap();
        let ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert_eq!(rules[0].threshold, 0.8);
        assert_eq!(rules[1].threshold, 1.0);

        let document = catalog.fetch("doc-1").await.unwrap();
        assert_eq!(document.paragraphs.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let catalog = Catalog::empty();
        assert!(matches!(
            catalog.resolve("missing").await,
            Err(ExternalError::NotFound { kind: "RuleSet", .. })
        ));
        assert!(matches!(
            catalog.fetch("missing").await,
            Err(ExternalError::NotFound { kind: "Document", .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_and_bad_json() {
        assert!(matches!(
            Catalog::from_path("/nonexistent/catalog.json").await,
            Err(ExternalError::Io(_))
        ));
        assert!(matches!(
            Catalog::from_json("{not json"),
            Err(ExternalError::Parse(_))
        ));
    }
}
