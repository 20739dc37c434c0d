use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVICE: &str = "haircut";
pub const DEFAULT_LOCATION: &str = "Antibes";
pub const DEFAULT_DATETIME: &str = "tomorrow at 2pm";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Search,
    Book,
    Check,
    Unknown,
}

impl Intent {
    /// Maps free-form extractor output onto an intent; anything unrecognized is `Unknown`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "search" => Self::Search,
            "book" => Self::Book,
            "check" => Self::Check,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Book => "book",
            Self::Check => "check",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    pub service: Option<String>,
    pub location: Option<String>,
    pub datetime: Option<String>,
}

impl Entities {
    pub fn service_or_default(&self) -> &str {
        non_blank(self.service.as_deref()).unwrap_or(DEFAULT_SERVICE)
    }

    pub fn location_or_default(&self) -> &str {
        non_blank(self.location.as_deref()).unwrap_or(DEFAULT_LOCATION)
    }

    pub fn datetime_or_default(&self) -> &str {
        non_blank(self.datetime.as_deref()).unwrap_or(DEFAULT_DATETIME)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub entities: Entities,
}

impl IntentResult {
    pub fn unknown() -> Self {
        Self { intent: Intent::Unknown, entities: Entities::default() }
    }
}

/// Audit-trail label for a pipeline stage that did meaningful work during a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    SearchedProviders,
    CheckedAvailability,
    CreatedBooking,
    Error,
    ServiceUnavailable,
}

impl ActionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchedProviders => "searched_providers",
            Self::CheckedAvailability => "checked_availability",
            Self::CreatedBooking => "created_booking",
            Self::Error => "error",
            Self::ServiceUnavailable => "service_unavailable",
        }
    }
}
