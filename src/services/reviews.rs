//! Review service: student feedback listing, submission, resolution

use std::sync::Arc;

use reqwest::Method;
use validator::Validate;

use crate::{
    error::AppResult,
    gateway::{BackendClient, FilePart, FormPayload},
    models::{
        notice::Notice,
        review::{NewReview, Review},
    },
    store::{keys, CacheStore},
};

#[derive(Clone)]
pub struct ReviewsService {
    gateway: Arc<dyn BackendClient>,
    store: CacheStore,
}

impl ReviewsService {
    pub fn new(gateway: Arc<dyn BackendClient>, store: CacheStore) -> Self {
        Self { gateway, store }
    }

    /// List reviews, falling back to the cached list.
    pub async fn list(&self) -> Vec<Review> {
        let outcome = self.gateway.send(Method::GET, "/api/reviews/", None).await;
        if let Some(reviews) = outcome.parse::<Vec<Review>>() {
            return reviews;
        }
        tracing::warn!("reviews unavailable remotely, using cached list");
        self.store.dir.read(keys::USER_REVIEWS)
    }

    /// Submit a review (multipart, optionally with a photo), appending to
    /// the cached list when the backend is unreachable.
    pub async fn submit(&self, review: NewReview) -> AppResult<Notice> {
        review.validate()?;

        let mut form = FormPayload::default()
            .text("item_name", review.item_name.clone())
            .text("comment", review.comment.clone());
        if let Some(name) = &review.submitted_by_name {
            form = form.text("submitted_by_name", name.clone());
        }
        if let Some(image) = &review.image {
            form = form.file(FilePart {
                field: "image".into(),
                filename: image.filename.clone(),
                content_type: image.content_type.clone(),
                data: image.data.clone(),
            });
        }

        let outcome = self.gateway.send_form("/api/reviews/", form).await;
        if outcome.ok {
            return Ok(Notice::success("Review submitted. Thank you!"));
        }

        tracing::warn!(item = %review.item_name, "backend unavailable, caching review locally");
        let entry = review.to_local_review();
        self.store
            .dir
            .mutate(keys::USER_REVIEWS, |reviews: &mut Vec<Review>| reviews.push(entry))
            .await?;
        Ok(Notice::warning("Review saved locally. Backend unavailable."))
    }

    /// Mark a review resolved.
    pub async fn resolve(&self, id: i64) -> AppResult<Notice> {
        let outcome = self
            .gateway
            .send(Method::POST, &format!("/api/reviews/{id}/resolve/"), None)
            .await;

        if outcome.ok {
            Ok(Notice::success("Review resolved."))
        } else {
            Ok(Notice::error("Could not resolve review: backend unavailable."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FetchOutcome, MockBackendClient};

    #[tokio::test]
    async fn offline_submit_caches_review() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::open(tmp.path()).unwrap();

        let mut gateway = MockBackendClient::new();
        gateway
            .expect_send_form()
            .returning(|_, _| FetchOutcome::failure("connection refused"));
        gateway
            .expect_send()
            .returning(|_, _, _| FetchOutcome::failure("connection refused"));

        let svc = ReviewsService::new(Arc::new(gateway), store);
        let notice = svc
            .submit(NewReview {
                item_name: "Prism".into(),
                comment: "One face is chipped".into(),
                submitted_by_name: Some("Ada".into()),
                image: None,
            })
            .await
            .unwrap();

        assert_eq!(notice.severity, crate::models::enums::Severity::Warning);
        let cached = svc.list().await;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].item_name, "Prism");
        assert!(!cached[0].resolved);
    }
}
