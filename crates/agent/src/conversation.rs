use async_trait::async_trait;

use concierge_core::domain::intent::{
    Entities, Intent, IntentResult, DEFAULT_DATETIME, DEFAULT_LOCATION, DEFAULT_SERVICE,
};
use concierge_core::errors::CollaboratorError;

use crate::tools::IntentExtractor;

const BOOK_KEYWORDS: &[&str] = &["book", "schedule", "appointment", "reserve"];
const SEARCH_KEYWORDS: &[&str] = &["search", "find", "look for"];
const CHECK_KEYWORDS: &[&str] = &["check", "calendar"];

/// Offline extractor driven by keyword lists. Used when no model is configured
/// and as the behaviour tests pin down.
#[derive(Clone, Debug, Default)]
pub struct KeywordIntentExtractor;

impl KeywordIntentExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> IntentResult {
        let normalized_text = normalize_text(text);

        let intent = if contains_any(&normalized_text, BOOK_KEYWORDS) {
            Intent::Book
        } else if contains_any(&normalized_text, SEARCH_KEYWORDS) {
            Intent::Search
        } else if contains_any(&normalized_text, CHECK_KEYWORDS) {
            Intent::Check
        } else {
            Intent::Unknown
        };

        IntentResult {
            intent,
            entities: Entities {
                service: Some(extract_service(&normalized_text).to_string()),
                location: Some(extract_location(&normalized_text).to_string()),
                datetime: Some(DEFAULT_DATETIME.to_string()),
            },
        }
    }
}

#[async_trait]
impl IntentExtractor for KeywordIntentExtractor {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn extract(&self, text: &str) -> Result<IntentResult, CollaboratorError> {
        Ok(self.classify(text))
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn contains_any(normalized_text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| normalized_text.contains(keyword))
}

fn extract_service(normalized_text: &str) -> &'static str {
    if normalized_text.contains("massage") {
        "massage"
    } else {
        DEFAULT_SERVICE
    }
}

fn extract_location(normalized_text: &str) -> &'static str {
    if normalized_text.contains("nice") {
        "Nice"
    } else if normalized_text.contains("cannes") {
        "Cannes"
    } else {
        DEFAULT_LOCATION
    }
}
