//! User review models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::inventory::ImageFile;

/// A feedback entry submitted by a student about a borrowed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Review {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, alias = "itemName")]
    pub item_name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default, alias = "submittedByName")]
    pub submitted_by_name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved: bool,
}

/// Payload for submitting a new review.
#[derive(Debug, Clone, Validate)]
pub struct NewReview {
    #[validate(length(min = 1, message = "item name is required"))]
    pub item_name: String,
    #[validate(length(min = 1, message = "comment is required"))]
    pub comment: String,
    pub submitted_by_name: Option<String>,
    pub image: Option<ImageFile>,
}

impl NewReview {
    /// Cache view appended to `phyLab_UserReviews` when the backend is down.
    pub fn to_local_review(&self) -> Review {
        Review {
            id: None,
            item_name: self.item_name.clone(),
            comment: self.comment.clone(),
            submitted_by_name: self.submitted_by_name.clone(),
            image: None,
            image_url: None,
            created_at: Some(Utc::now()),
            resolved: false,
        }
    }
}
