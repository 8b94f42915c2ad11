use async_trait::async_trait;
use dashmap::DashMap;
use regex::{Regex, RegexBuilder};

use crate::audit::types::{
    Document, Evidence, MatchType, ResultStatus, Rule, TextSpan, Verdict,
};
use crate::external::RuleEvaluator;
use crate::external::error::{ExternalError, ExternalResult};

/// Scores a rule by the share of its keywords present in the document.
///
/// Keywords match case-insensitively on word boundaries. Every occurrence is
/// reported as evidence. Each distinct keyword is compiled once and reused
/// across evaluations.
#[derive(Debug, Default)]
pub struct KeywordEvaluator {
    patterns: DashMap<String, Regex>,
}

impl KeywordEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn pattern(&self, keyword: &str) -> ExternalResult<Regex> {
        if let Some(pattern) = self.patterns.get(keyword) {
            return Ok(pattern.clone());
        }

        let pattern = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(keyword)))
            .case_insensitive(true)
            .build()
            .map_err(|e| ExternalError::Evaluation(format!("invalid keyword '{}': {}", keyword, e)))?;
        self.patterns.insert(keyword.to_string(), pattern.clone());
        Ok(pattern)
    }

    fn classify(score: f64, rule: &Rule) -> ResultStatus {
        if score >= rule.threshold {
            ResultStatus::Passed
        } else if score >= rule.threshold - rule.warning_margin {
            ResultStatus::Warning
        } else {
            ResultStatus::Failed
        }
    }
}

fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

#[async_trait]
impl RuleEvaluator for KeywordEvaluator {
    async fn evaluate(&self, document: &Document, rule: &Rule) -> ExternalResult<Verdict> {
        let keywords: Vec<&str> = rule
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Err(ExternalError::Evaluation(format!(
                "rule '{}' has no keywords",
                rule.id
            )));
        }

        let mut evidences = Vec::new();
        let mut missing = Vec::new();

        for keyword in &keywords {
            let pattern = self.pattern(keyword)?;
            let before = evidences.len();

            for (index, paragraph) in document.paragraphs.iter().enumerate() {
                for found in pattern.find_iter(&paragraph.text) {
                    evidences.push(Evidence {
                        text: found.as_str().to_string(),
                        page: paragraph.page,
                        paragraph: index as u32,
                        span: TextSpan {
                            start: char_offset(&paragraph.text, found.start()),
                            end: char_offset(&paragraph.text, found.end()),
                        },
                        match_type: MatchType::Keyword,
                    });
                }
            }

            if evidences.len() == before {
                missing.push(*keyword);
            }
        }

        let matched = keywords.len() - missing.len();
        let score = matched as f64 / keywords.len() as f64;
        let status = Self::classify(score, rule);

        let recommendation = match status {
            ResultStatus::Passed => None,
            _ => rule
                .recommendation
                .clone()
                .or_else(|| Some(format!("Document does not mention: {}", missing.join(", ")))),
        };

        tracing::debug!(
            document_id = %document.id,
            rule_id = %rule.id,
            score,
            ?status,
            "Keyword evaluation finished"
        );

        Ok(Verdict {
            status,
            score,
            threshold: rule.threshold,
            evidences,
            recommendation,
        })
    }
}
