//! Admin remark model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::RemarkType;

/// Annotation an admin attaches to a request or one of its items
/// (damage report, missing parts, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remark {
    #[serde(rename = "type")]
    pub remark_type: Option<RemarkType>,
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<String>,
}

impl Remark {
    pub fn new(remark_type: Option<RemarkType>, text: impl Into<String>) -> Self {
        Self {
            remark_type,
            text: text.into(),
            created_at: Some(Utc::now()),
            author: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// A remark must carry at least a type or some text to be saveable.
    pub fn is_empty(&self) -> bool {
        self.remark_type.is_none() && self.text.trim().is_empty()
    }

    /// Badge label: the type label, or a generic marker for free-text ones.
    pub fn badge_label(&self) -> &'static str {
        self.remark_type.map(|t| t.label()).unwrap_or("Has Remark")
    }
}
