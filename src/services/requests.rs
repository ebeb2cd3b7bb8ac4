//! Borrow-request service: listing, detail, history, checkout

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    gateway::{BackendClient, FetchOutcome},
    models::{
        cart::{Cart, CheckoutForm},
        enums::ItemStatus,
        inventory::InventoryItem,
        notice::Notice,
        request::{BorrowRequest, CreateBorrowRequest, RequestRef},
    },
    store::CacheStore,
    util::generate_loan_id,
};

#[derive(Clone)]
pub struct RequestsService {
    gateway: Arc<dyn BackendClient>,
    store: CacheStore,
}

impl RequestsService {
    pub fn new(gateway: Arc<dyn BackendClient>, store: CacheStore) -> Self {
        Self { gateway, store }
    }

    /// Fetch the full request list from the backend, or `None` when the
    /// gateway is unreachable.
    pub async fn fetch_all(&self) -> Option<Vec<BorrowRequest>> {
        let outcome = self
            .gateway
            .send(Method::GET, "/api/borrow-requests/", None)
            .await;
        parse_records(&outcome)
    }

    /// The "pending approvals" view: requests with at least one pending
    /// item, narrowed to those items. Falls back to the cached queue.
    pub async fn pending_requests(&self) -> Vec<BorrowRequest> {
        let outcome = self
            .gateway
            .send(
                Method::GET,
                "/api/borrow-requests/?status=pending",
                None,
            )
            .await;

        if let Some(records) = parse_records(&outcome) {
            return records.iter().filter_map(BorrowRequest::pending_view).collect();
        }

        tracing::warn!("pending requests unavailable remotely, using cached queue");
        self.store
            .requests
            .queue()
            .iter()
            .filter(|r| r.derived_status() == ItemStatus::Pending)
            .filter_map(BorrowRequest::pending_view)
            .collect()
    }

    /// The "active loans" view: requests with borrowed/approved items.
    pub async fn active_loans(&self) -> Vec<BorrowRequest> {
        let outcome = self
            .gateway
            .send(
                Method::GET,
                "/api/borrow-requests/?status=borrowed",
                None,
            )
            .await;

        if let Some(records) = parse_records(&outcome) {
            return records;
        }

        tracing::warn!("active loans unavailable remotely, using cached queue");
        self.store
            .requests
            .queue()
            .into_iter()
            .filter(|r| r.derived_status() == ItemStatus::Borrowed)
            .collect()
    }

    /// Returned-request history: the dedicated endpoint first, then the
    /// status filter, then the cached archive.
    pub async fn history(&self) -> Vec<BorrowRequest> {
        for path in [
            "/api/borrow-requests/history/",
            "/api/borrow-requests/?status=returned",
        ] {
            let outcome = self.gateway.send(Method::GET, path, None).await;
            if let Some(records) = parse_records(&outcome) {
                return records;
            }
        }

        tracing::warn!("history unavailable remotely, using cached archive");
        self.store.requests.history()
    }

    /// Single request detail, falling back to the cached queue and archive.
    pub async fn get(&self, rf: &RequestRef) -> AppResult<BorrowRequest> {
        let outcome = self
            .gateway
            .send(Method::GET, &format!("/api/borrow-requests/{rf}/"), None)
            .await;

        if outcome.ok {
            if let Some(record) = outcome.parse::<BorrowRequest>() {
                return Ok(record);
            }
        }

        self.store
            .requests
            .find_anywhere(rf)
            .ok_or_else(|| AppError::NotFound(format!("request {rf} not found")))
    }

    /// Regroup the remote request list into pending/borrowed queue entries
    /// and overwrite the cached queue. Returns whether a refresh happened.
    pub async fn refresh_queue_from_backend(&self) -> AppResult<bool> {
        let Some(records) = self.fetch_all().await else {
            tracing::warn!("queue refresh skipped, backend unreachable");
            return Ok(false);
        };

        let mut normalized = Vec::new();
        for record in &records {
            if let Some(pending) = record.pending_view() {
                normalized.push(pending);
            }

            let active: Vec<_> = record.active_items().cloned().collect();
            if !active.is_empty() {
                let mut borrowed = record.clone();
                borrowed.id = Some(RequestRef::Code(generate_loan_id()));
                borrowed.request_id = Some(record.public_code());
                borrowed.status = ItemStatus::Borrowed;
                borrowed.items = active;
                normalized.push(borrowed);
            }
        }

        self.store.requests.save_queue(&normalized)?;
        Ok(true)
    }

    /// Submit a new borrow request, appending to the local queue when the
    /// backend is unreachable.
    pub async fn create(&self, request: CreateBorrowRequest) -> AppResult<Notice> {
        request.validate()?;

        let body = serde_json::to_value(&request)
            .map_err(|e| AppError::Internal(format!("request serialize failed: {e}")))?;
        let outcome = self
            .gateway
            .send(Method::POST, "/api/borrow-requests/", Some(body))
            .await;

        if outcome.ok {
            return Ok(Notice::success("Request submitted successfully."));
        }

        tracing::warn!(
            code = %request.request_id,
            error = outcome.error.as_deref().unwrap_or("unknown"),
            "backend unavailable, queueing request locally"
        );
        let entry = request.to_local_entry();
        self.store
            .requests
            .mutate_queue(|queue| queue.push(entry))
            .await?;
        Ok(Notice::warning(
            "Request saved locally. It will reach the backend once it is available.",
        ))
    }

    /// Put one unit of an inventory item into the cart, reserving it in
    /// the local stock ledger.
    pub async fn add_to_cart(&self, cart: &mut Cart, item: &InventoryItem) -> AppResult<()> {
        let key = item.stock_key();
        self.store.stock.reserve(&key, 1).await?;
        cart.add(key, item.name.clone(), item.image_url.clone().or_else(|| item.image.clone()));
        Ok(())
    }

    /// Remove one unit from the cart line at `index`, releasing the
    /// reserved unit back to stock.
    pub async fn remove_from_cart(&self, cart: &mut Cart, index: usize) -> AppResult<()> {
        if let Some(key) = cart.remove_one(index) {
            self.store.stock.release(&key, 1).await?;
        }
        Ok(())
    }

    /// Cart checkout: build, validate and submit the request.
    pub async fn checkout(&self, cart: &Cart, form: CheckoutForm) -> AppResult<Notice> {
        if cart.is_empty() {
            return Err(AppError::Validation("cart is empty".into()));
        }
        self.create(form.into_request(cart)).await
    }
}

/// Accept either a bare array or a `{results: [...]}` wrapper; anything
/// else (including a failed outcome) is `None`.
fn parse_records(outcome: &FetchOutcome) -> Option<Vec<BorrowRequest>> {
    if !outcome.ok {
        return None;
    }
    let data = outcome.data.as_ref()?;
    let records = match data {
        Value::Array(_) => data.clone(),
        Value::Object(map) => map.get("results")?.clone(),
        _ => return None,
    };
    serde_json::from_value(records).ok()
}
