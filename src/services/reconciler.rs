//! Lifecycle reconciler
//!
//! Applies status transitions to request items: one PATCH per request for a
//! batched admin selection, with the local cache as compensation when the
//! gateway is unreachable. Remote success and local fallback are mutually
//! exclusive for any one action.

use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use reqwest::Method;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    gateway::BackendClient,
    models::{
        enums::ItemStatus,
        notice::Notice,
        remark::Remark,
        request::{BorrowRequest, RequestItem, RequestRef},
    },
    services::requests::RequestsService,
    store::{remarks::RemarksCache, CacheStore},
    util::generate_loan_id,
};

/// Admin decision over a selection of pending items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Target status sent to the item-update endpoint.
    pub fn target_status(self) -> ItemStatus {
        match self {
            Decision::Approve => ItemStatus::Approved,
            Decision::Reject => ItemStatus::Rejected,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
        }
    }
}

/// One selected (request, item, quantity) triple.
#[derive(Debug, Clone)]
pub struct ItemAction {
    pub request: RequestRef,
    pub item_id: Option<i64>,
    /// Position within the request's pending view; addresses local entries
    /// whose items never got server ids.
    pub item_index: usize,
    pub quantity: u32,
}

/// How one request's update was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Remote,
    LocalFallback,
    Failed,
}

/// Per-request result of a batch application.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub request: RequestRef,
    pub persistence: Persistence,
    pub updated_items: usize,
}

/// Result of a batch: every request's outcome plus the derived notice.
/// There is no transaction across requests; each one stands alone.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub outcomes: Vec<RequestOutcome>,
    pub notice: Notice,
}

impl BatchOutcome {
    pub fn all_remote(&self) -> bool {
        !self.outcomes.is_empty()
            && self.outcomes.iter().all(|o| o.persistence == Persistence::Remote)
    }

    pub fn any_remote(&self) -> bool {
        self.outcomes.iter().any(|o| o.persistence == Persistence::Remote)
    }
}

/// Typed result of a request-identifier resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedId {
    Numeric(i64),
    /// Lookup exhausted; carries the original identifier verbatim so the
    /// caller can still address the backend with it.
    Unresolved(String),
}

impl std::fmt::Display for ResolvedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedId::Numeric(n) => write!(f, "{}", n),
            ResolvedId::Unresolved(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Clone)]
pub struct ReconcilerService {
    gateway: Arc<dyn BackendClient>,
    store: CacheStore,
    requests: RequestsService,
}

impl ReconcilerService {
    pub fn new(gateway: Arc<dyn BackendClient>, store: CacheStore, requests: RequestsService) -> Self {
        Self { gateway, store, requests }
    }

    /// Apply an approve/reject decision to a selection of items.
    ///
    /// Actions are grouped by request id and each group becomes one PATCH;
    /// quantities are clamped to the remaining requested quantity, a clamp
    /// to zero dropping the item from the batch.
    pub async fn apply(&self, decision: Decision, actions: Vec<ItemAction>) -> AppResult<BatchOutcome> {
        if actions.is_empty() {
            return Err(AppError::BadRequest("no items selected".into()));
        }

        let mut groups: IndexMap<String, (RequestRef, Vec<ItemAction>)> = IndexMap::new();
        for action in actions {
            groups
                .entry(action.request.to_string())
                .or_insert_with(|| (action.request.clone(), Vec::new()))
                .1
                .push(action);
        }

        let target = decision.target_status();
        let mut outcomes = Vec::new();

        for (_, (request, group)) in groups {
            let cached = self.store.requests.find_in_queue(&request);

            let mut clamped: Vec<(ItemAction, u32)> = Vec::new();
            for action in group {
                let item = cached_item(cached.as_ref(), &action);
                if let Some(status) = item.map(|i| i.status) {
                    if !status.can_transition(target) {
                        tracing::warn!(%request, item = ?action.item_id, %status, %target,
                            "illegal transition, skipping item");
                        continue;
                    }
                }
                let qty = match item.map(|i| i.quantity) {
                    Some(remaining) => action.quantity.min(remaining),
                    None => action.quantity,
                };
                if qty == 0 {
                    tracing::debug!(%request, item = ?action.item_id, "quantity clamped to zero, skipping");
                    continue;
                }
                clamped.push((action, qty));
            }
            if clamped.is_empty() {
                continue;
            }

            let resolved = self.resolve_request_id(&request).await;
            let path = format!("/api/borrow-requests/{resolved}/update_item_statuses/");
            let items: Vec<Value> = clamped
                .iter()
                .map(|(action, qty)| {
                    json!({ "id": action.item_id, "status": target.as_str(), "quantity": qty })
                })
                .collect();

            let outcome = self
                .gateway
                .send(Method::PATCH, &path, Some(json!({ "items": items })))
                .await;

            if outcome.ok {
                tracing::debug!(%request, count = clamped.len(), status = %target,
                    "item statuses updated remotely");
                outcomes.push(RequestOutcome {
                    request,
                    persistence: Persistence::Remote,
                    updated_items: clamped.len(),
                });
                continue;
            }

            let updated = self.apply_locally(decision, &request, &clamped).await?;
            outcomes.push(RequestOutcome {
                request,
                persistence: if updated > 0 {
                    Persistence::LocalFallback
                } else {
                    Persistence::Failed
                },
                updated_items: updated,
            });
        }

        let any_remote = outcomes.iter().any(|o| o.persistence == Persistence::Remote);
        if any_remote {
            // Borrowed entries must reappear in the queue under fresh loan ids.
            self.requests.refresh_queue_from_backend().await?;
        }

        let total: usize = outcomes.iter().map(|o| o.updated_items).sum();
        let notice = batch_notice(decision, &outcomes, total);
        Ok(BatchOutcome { outcomes, notice })
    }

    /// Compensating queue mutation when the remote update failed. Approve
    /// splits the approved quantity into a new borrowed entry and leaves the
    /// remainder pending; reject restores the reserved stock.
    async fn apply_locally(
        &self,
        decision: Decision,
        request: &RequestRef,
        actions: &[(ItemAction, u32)],
    ) -> AppResult<usize> {
        let mut restocks: Vec<(String, u32)> = Vec::new();
        let request_for_match = request.clone();

        let updated = self
            .store
            .requests
            .mutate_queue(|queue| {
                let Some(pos) = queue.iter().position(|r| r.matches(&request_for_match)) else {
                    return 0usize;
                };

                let mut splits: Vec<BorrowRequest> = Vec::new();
                let mut count = 0usize;
                {
                    let entry = &mut queue[pos];
                    for (action, qty) in actions {
                        let idx = entry
                            .items
                            .iter()
                            .position(|i| i.id.is_some() && i.id == action.item_id)
                            .or_else(|| {
                                (action.item_index < entry.items.len()).then_some(action.item_index)
                            });
                        let Some(idx) = idx else { continue };

                        let qty = (*qty).min(entry.items[idx].quantity);
                        if qty == 0 {
                            continue;
                        }

                        match decision {
                            Decision::Approve => {
                                let Ok(next) = entry.items[idx].status.transition(ItemStatus::Borrowed)
                                else {
                                    continue;
                                };
                                let mut approved_item = entry.items[idx].clone();
                                approved_item.quantity = qty;
                                approved_item.status = next;

                                let mut split = entry.clone();
                                split.id = Some(RequestRef::Code(generate_loan_id()));
                                split.status = ItemStatus::Borrowed;
                                split.items = vec![approved_item];
                                splits.push(split);
                            }
                            Decision::Reject => {
                                if !entry.items[idx].status.can_transition(ItemStatus::Rejected) {
                                    continue;
                                }
                                restocks.push((entry.items[idx].stock_key().to_string(), qty));
                            }
                        }

                        entry.items[idx].quantity -= qty;
                        count += 1;
                    }
                    entry.items.retain(|i| i.quantity > 0);
                }

                if queue[pos].items.is_empty() {
                    queue.remove(pos);
                }
                queue.extend(splits);
                count
            })
            .await?;

        for (key, qty) in restocks {
            self.store.stock.release(&key, qty).await?;
        }

        Ok(updated)
    }

    /// Return workflow: mark one borrowed item returned, archive the record
    /// into history and restore its stock (clamped to the baseline).
    pub async fn return_item(&self, request: &RequestRef, item_id: i64) -> AppResult<Notice> {
        let resolved = self.resolve_request_id(request).await;
        let path = format!("/api/borrow-requests/{resolved}/update_item_statuses/");
        let payload = json!({ "items": [{ "id": item_id, "status": ItemStatus::Returned.as_str() }] });

        let outcome = self.gateway.send(Method::PATCH, &path, Some(payload)).await;
        let backend_success = outcome.ok;
        if !backend_success {
            tracing::warn!(%request, item_id, error = outcome.error.as_deref().unwrap_or("unknown"),
                "return not persisted remotely");
        }

        let archived = self
            .archive_locally(request, item_id, backend_success, outcome.data.as_ref())
            .await?;

        if backend_success {
            Ok(Notice::success("Item returned successfully. Now visible in history."))
        } else if archived {
            Ok(Notice::warning("Item marked as returned locally. Backend update failed."))
        } else {
            Ok(Notice::error("Return failed: request not found and backend unavailable."))
        }
    }

    /// Mark the one returned item in the cached entry, restore its stock,
    /// and move the entry into history only once every item is returned.
    /// Without a cached entry, an archive record is rebuilt from the backend
    /// echo when the echo actually carries the request.
    async fn archive_locally(
        &self,
        request: &RequestRef,
        item_id: i64,
        backend_success: bool,
        echo: Option<&Value>,
    ) -> AppResult<bool> {
        let request_for_match = request.clone();
        let (entry_found, marked) = self
            .store
            .requests
            .mutate_queue(|queue| {
                let Some(pos) = queue.iter().position(|r| r.matches(&request_for_match)) else {
                    return (false, None);
                };

                let entry = &mut queue[pos];
                let idx = entry
                    .items
                    .iter()
                    .position(|i| i.id == Some(item_id))
                    .or_else(|| {
                        // local split entries carry a single id-less item
                        (entry.items.len() == 1 && entry.items[0].id.is_none()).then_some(0)
                    });
                let Some(idx) = idx else { return (true, None) };
                if !entry.items[idx].status.can_transition(ItemStatus::Returned) {
                    return (true, None);
                }

                entry.items[idx].status = ItemStatus::Returned;
                let stock_key = entry.items[idx].stock_key().to_string();
                let quantity = entry.items[idx].quantity.max(1);
                let fully_returned =
                    entry.items.iter().all(|i| i.status == ItemStatus::Returned);

                let archived = if fully_returned {
                    let mut done = queue.remove(pos);
                    done.status = ItemStatus::Returned;
                    done.actual_return_date = Some(Utc::now().to_rfc3339());
                    Some(done)
                } else {
                    None
                };
                (true, Some((stock_key, quantity, archived)))
            })
            .await?;

        if let Some((key, qty, archived)) = marked {
            self.store.stock.restore_for_return(&key, qty).await?;
            if let Some(entry) = archived {
                self.store.requests.push_history(entry).await?;
            }
            return Ok(true);
        }
        if entry_found {
            // nothing left to mark locally; the remote state governs
            return Ok(backend_success);
        }

        if backend_success {
            if let Some(orig) = request_echo(echo) {
                if let Ok(mut record) = serde_json::from_value::<BorrowRequest>(orig.clone()) {
                    if record.id.is_none() {
                        record.id = Some(request.clone());
                    }
                    record.items.retain(|i| i.id == Some(item_id));
                    if !record.items.is_empty() {
                        if let Some(item) = record.items.first() {
                            let qty = item.quantity.max(1);
                            let key = item.stock_key().to_string();
                            self.store.stock.restore_for_return(&key, qty).await?;
                        }
                        for item in &mut record.items {
                            item.status = ItemStatus::Returned;
                        }
                        record.status = ItemStatus::Returned;
                        record.actual_return_date = Some(Utc::now().to_rfc3339());
                        self.store.requests.push_history(record).await?;
                    }
                }
            }
            return Ok(true);
        }

        Ok(false)
    }

    /// Attach a remark to one item, piggybacking on the item-update
    /// endpoint. A missing item id is a reported failure, never a silent
    /// skip.
    pub async fn save_remark(
        &self,
        request: &RequestRef,
        item_id: Option<i64>,
        remark: Remark,
    ) -> AppResult<Notice> {
        if remark.is_empty() {
            return Err(AppError::Validation(
                "provide at least a remark type or description".into(),
            ));
        }
        let Some(item_id) = item_id else {
            return Err(AppError::NotFound("remark target has no item id".into()));
        };

        let resolved = self.resolve_request_id(request).await;
        let created_at = remark.created_at.unwrap_or_else(Utc::now);
        let path = format!("/api/borrow-requests/{resolved}/update_item_statuses/");
        let payload = json!({
            "items": [{
                "id": item_id,
                "admin_remark": remark.text,
                "remark_type": remark.remark_type,
                "remark_created_at": created_at.to_rfc3339(),
            }]
        });

        let outcome = self.gateway.send(Method::PATCH, &path, Some(payload)).await;

        if outcome.ok {
            let updated = outcome
                .data
                .as_ref()
                .and_then(|d| d.get("updated_count"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            if updated > 0 {
                return Ok(Notice::success("Remark saved to server."));
            }
            let skipped = outcome.data.as_ref().and_then(|d| d.get("skipped_ids")).cloned();
            tracing::warn!(%request, item_id, ?skipped,
                "remark accepted by backend but no item matched");
            return Ok(Notice::error(
                "Remark not saved: item does not belong to this request.",
            ));
        }

        self.store
            .remarks
            .set(RemarksCache::item_key(item_id), remark)
            .await?;
        Ok(Notice::warning("Remark saved locally. Backend unavailable."))
    }

    /// Look up the existing remark for one item: backend first, cached
    /// remark map as fallback.
    pub async fn existing_remark(&self, request: &RequestRef, item_id: i64) -> Option<Remark> {
        if let Ok(record) = self.requests.get(request).await {
            if let Some(item) = record.items.iter().find(|i| i.id == Some(item_id)) {
                if item.admin_remark.is_some() || item.remark_type.is_some() {
                    return Some(Remark {
                        remark_type: item.remark_type,
                        text: item.admin_remark.clone().unwrap_or_default(),
                        created_at: item.remark_created_at,
                        author: None,
                    });
                }
            }
        }
        self.store.remarks.for_item(item_id)
    }

    /// Resolve a request identifier to the numeric database id: all-digit
    /// input passes through, short codes are looked up in the cached queue
    /// and then the full remote list. An exhausted lookup yields
    /// `Unresolved` carrying the original text verbatim.
    pub async fn resolve_request_id(&self, rf: &RequestRef) -> ResolvedId {
        let code = match rf {
            RequestRef::Id(n) => return ResolvedId::Numeric(*n),
            RequestRef::Code(code) => code,
        };

        if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = code.parse() {
                return ResolvedId::Numeric(n);
            }
        }

        if let Some(entry) = self.store.requests.find_in_queue(rf) {
            if let Some(RequestRef::Id(n)) = entry.id {
                return ResolvedId::Numeric(n);
            }
        }

        if let Some(records) = self.requests.fetch_all().await {
            let found = records
                .iter()
                .find(|r| r.request_id.as_deref() == Some(code.as_str()));
            if let Some(RequestRef::Id(n)) = found.and_then(|r| r.id.clone()) {
                return ResolvedId::Numeric(n);
            }
        }

        tracing::debug!(%code, "request code unresolved, passing through verbatim");
        ResolvedId::Unresolved(code.clone())
    }
}

/// Pick the request record out of an item-update echo, if the echo carries
/// one at all. The plain `{updated_count, skipped_ids}` acknowledgement has
/// nothing to rebuild an archive entry from.
fn request_echo(echo: Option<&Value>) -> Option<&Value> {
    let echo = echo?;
    if let Some(orig) = echo.get("original_request") {
        return Some(orig);
    }
    let has_items = echo
        .get("items")
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty());
    has_items.then_some(echo)
}

fn cached_item<'a>(cached: Option<&'a BorrowRequest>, action: &ItemAction) -> Option<&'a RequestItem> {
    let entry = cached?;
    entry
        .items
        .iter()
        .find(|i| i.id.is_some() && i.id == action.item_id)
        .or_else(|| entry.items.get(action.item_index))
}

fn batch_notice(decision: Decision, outcomes: &[RequestOutcome], total_items: usize) -> Notice {
    let verb = decision.verb();
    if outcomes.is_empty() || total_items == 0 {
        return Notice::error(format!("No items could be {verb}."));
    }

    let all_remote = outcomes.iter().all(|o| o.persistence == Persistence::Remote);
    let any_applied = outcomes
        .iter()
        .any(|o| matches!(o.persistence, Persistence::Remote | Persistence::LocalFallback));
    let any_failed = outcomes.iter().any(|o| o.persistence == Persistence::Failed);

    if all_remote {
        Notice::success(format!("Successfully {verb} {total_items} item(s)."))
    } else if any_applied && any_failed {
        Notice::warning(format!("Partially {verb} {total_items} item(s); some requests failed."))
    } else if any_applied {
        Notice::warning(format!("{} {total_items} item(s) locally. Backend unavailable.",
            capitalize(verb)))
    } else {
        Notice::error(format!("No items could be {verb}."))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FetchOutcome, MockBackendClient};

    fn store() -> (tempfile::TempDir, CacheStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    fn service(gateway: MockBackendClient, store: &CacheStore) -> ReconcilerService {
        let gateway: Arc<dyn BackendClient> = Arc::new(gateway);
        let requests = RequestsService::new(gateway.clone(), store.clone());
        ReconcilerService::new(gateway, store.clone(), requests)
    }

    fn offline() -> MockBackendClient {
        let mut gateway = MockBackendClient::new();
        gateway
            .expect_send()
            .returning(|_, _, _| FetchOutcome::failure("connection refused"));
        gateway
    }

    fn pending_entry(id: i64, item_id: i64, qty: u32) -> BorrowRequest {
        BorrowRequest {
            id: Some(RequestRef::Id(id)),
            request_id: Some(format!("REQ{id:04}")),
            items: vec![RequestItem {
                id: Some(item_id),
                name: "Oscilloscope".into(),
                item_key: Some("oscilloscope".into()),
                quantity: qty,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn offline_approve_splits_remainder_into_borrowed_entry() {
        let (_tmp, store) = store();
        store.requests.save_queue(&[pending_entry(7, 5, 3)]).unwrap();

        let svc = service(offline(), &store);
        let batch = svc
            .apply(
                Decision::Approve,
                vec![ItemAction {
                    request: RequestRef::Id(7),
                    item_id: Some(5),
                    item_index: 0,
                    quantity: 2,
                }],
            )
            .await
            .unwrap();

        assert_eq!(batch.outcomes.len(), 1);
        assert_eq!(batch.outcomes[0].persistence, Persistence::LocalFallback);
        assert_eq!(batch.notice.severity, crate::models::enums::Severity::Warning);

        let queue = store.requests.queue();
        assert_eq!(queue.len(), 2);

        let remainder = queue.iter().find(|r| r.matches(&RequestRef::Id(7))).unwrap();
        assert_eq!(remainder.items[0].quantity, 1);
        assert_eq!(remainder.items[0].status, ItemStatus::Pending);

        let split = queue.iter().find(|r| !r.matches(&RequestRef::Id(7))).unwrap();
        assert_eq!(split.status, ItemStatus::Borrowed);
        assert_eq!(split.items[0].quantity, 2);
        assert_eq!(split.items[0].status, ItemStatus::Borrowed);
        assert_eq!(split.request_id.as_deref(), Some("REQ0007"));
    }

    #[tokio::test]
    async fn offline_reject_restores_stock_unclamped() {
        let (_tmp, store) = store();
        store.stock.seed("oscilloscope", 10).unwrap();
        store.requests.save_queue(&[pending_entry(7, 5, 2)]).unwrap();

        let svc = service(offline(), &store);
        svc.apply(
            Decision::Reject,
            vec![ItemAction {
                request: RequestRef::Id(7),
                item_id: Some(5),
                item_index: 0,
                quantity: 2,
            }],
        )
        .await
        .unwrap();

        assert_eq!(store.stock.current("oscilloscope"), 12);
        assert_eq!(store.stock.original("oscilloscope"), 10);
        // the fully-rejected request is pruned from the queue
        assert!(store.requests.queue().is_empty());
    }

    #[tokio::test]
    async fn quantities_clamp_to_remaining() {
        let (_tmp, store) = store();
        store.requests.save_queue(&[pending_entry(7, 5, 3)]).unwrap();

        let svc = service(offline(), &store);
        let batch = svc
            .apply(
                Decision::Approve,
                vec![ItemAction {
                    request: RequestRef::Id(7),
                    item_id: Some(5),
                    item_index: 0,
                    quantity: 99,
                }],
            )
            .await
            .unwrap();

        assert_eq!(batch.outcomes[0].updated_items, 1);
        let queue = store.requests.queue();
        // the whole quantity moved to the borrowed split, nothing remains pending
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, ItemStatus::Borrowed);
        assert_eq!(queue[0].items[0].quantity, 3);
    }

    #[tokio::test]
    async fn zero_clamp_is_a_no_op() {
        let (_tmp, store) = store();
        store.requests.save_queue(&[pending_entry(7, 5, 3)]).unwrap();

        let svc = service(offline(), &store);
        let batch = svc
            .apply(
                Decision::Approve,
                vec![ItemAction {
                    request: RequestRef::Id(7),
                    item_id: Some(5),
                    item_index: 0,
                    quantity: 0,
                }],
            )
            .await
            .unwrap();

        assert!(batch.outcomes.is_empty());
        assert_eq!(batch.notice.severity, crate::models::enums::Severity::Error);
        assert_eq!(store.requests.queue().len(), 1);
    }

    #[tokio::test]
    async fn remote_success_suppresses_local_mutation() {
        let (_tmp, store) = store();
        store.requests.save_queue(&[pending_entry(7, 5, 3)]).unwrap();

        let mut gateway = MockBackendClient::new();
        gateway.expect_send().returning(|method, path, _| {
            if method == Method::PATCH {
                assert!(path.contains("/api/borrow-requests/7/update_item_statuses/"));
                FetchOutcome {
                    ok: true,
                    status: Some(200),
                    data: Some(json!({"updated_count": 1, "skipped_ids": []})),
                    error: None,
                }
            } else {
                // queue refresh reads the authoritative list
                FetchOutcome {
                    ok: true,
                    status: Some(200),
                    data: Some(json!([{
                        "id": 7,
                        "request_id": "REQ0007",
                        "items": [
                            {"id": 5, "item_name": "Oscilloscope", "item_key": "oscilloscope",
                             "quantity": 2, "status": "borrowed"},
                            {"id": 5, "item_name": "Oscilloscope", "item_key": "oscilloscope",
                             "quantity": 1, "status": "pending"}
                        ]
                    }])),
                    error: None,
                }
            }
        });

        let svc = service(gateway, &store);
        let batch = svc
            .apply(
                Decision::Approve,
                vec![ItemAction {
                    request: RequestRef::Id(7),
                    item_id: Some(5),
                    item_index: 0,
                    quantity: 2,
                }],
            )
            .await
            .unwrap();

        assert!(batch.all_remote());
        assert_eq!(batch.notice.severity, crate::models::enums::Severity::Success);

        // the queue now mirrors the backend: one pending view, one borrowed view
        let queue = store.requests.queue();
        assert_eq!(queue.len(), 2);
        assert!(queue.iter().any(|r| r.derived_status() == ItemStatus::Pending));
        assert!(queue.iter().any(|r| r.derived_status() == ItemStatus::Borrowed));
    }

    #[tokio::test]
    async fn offline_return_archives_and_restores_stock() {
        let (_tmp, store) = store();
        store.stock.seed("oscilloscope", 10).unwrap();
        store.stock.set_current("oscilloscope", 8).unwrap();

        let mut entry = pending_entry(7, 5, 2);
        entry.status = ItemStatus::Borrowed;
        entry.items[0].status = ItemStatus::Borrowed;
        store.requests.save_queue(&[entry]).unwrap();

        let svc = service(offline(), &store);
        let notice = svc.return_item(&RequestRef::Id(7), 5).await.unwrap();
        assert_eq!(notice.severity, crate::models::enums::Severity::Warning);

        assert!(store.requests.queue().is_empty());
        let history = store.requests.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].derived_status(), ItemStatus::Returned);
        assert!(history[0].actual_return_date.is_some());
        assert_eq!(store.stock.current("oscilloscope"), 10);
    }

    #[tokio::test]
    async fn returning_one_item_leaves_siblings_borrowed() {
        let (_tmp, store) = store();
        store.stock.seed("oscilloscope", 10).unwrap();
        store.stock.seed("prism", 6).unwrap();
        store.stock.set_current("oscilloscope", 8).unwrap();
        store.stock.set_current("prism", 5).unwrap();

        let mut entry = pending_entry(7, 5, 2);
        entry.status = ItemStatus::Borrowed;
        entry.items[0].status = ItemStatus::Borrowed;
        entry.items.push(RequestItem {
            id: Some(6),
            name: "Prism".into(),
            item_key: Some("prism".into()),
            quantity: 1,
            status: ItemStatus::Borrowed,
            ..Default::default()
        });
        store.requests.save_queue(&[entry]).unwrap();

        let svc = service(offline(), &store);
        let notice = svc.return_item(&RequestRef::Id(7), 5).await.unwrap();
        assert_eq!(notice.severity, crate::models::enums::Severity::Warning);

        // only the targeted item's stock comes back
        assert_eq!(store.stock.current("oscilloscope"), 10);
        assert_eq!(store.stock.current("prism"), 5);

        // the entry stays in the queue with the sibling still borrowed
        let queue = store.requests.queue();
        assert_eq!(queue.len(), 1);
        let items = &queue[0].items;
        assert_eq!(items.iter().find(|i| i.id == Some(5)).unwrap().status, ItemStatus::Returned);
        assert_eq!(items.iter().find(|i| i.id == Some(6)).unwrap().status, ItemStatus::Borrowed);
        assert!(store.requests.history().is_empty());

        // returning the last item archives the whole entry
        svc.return_item(&RequestRef::Id(7), 6).await.unwrap();
        assert!(store.requests.queue().is_empty());
        let history = store.requests.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].derived_status(), ItemStatus::Returned);
        assert_eq!(store.stock.current("prism"), 6);
    }

    #[tokio::test]
    async fn bare_acknowledgement_echo_does_not_fabricate_history() {
        let (_tmp, store) = store();
        let mut gateway = MockBackendClient::new();
        gateway.expect_send().returning(|_, _, _| FetchOutcome {
            ok: true,
            status: Some(200),
            data: Some(json!({"updated_count": 1, "skipped_ids": []})),
            error: None,
        });

        // no cached entry: the active-loans view never populates the queue
        let svc = service(gateway, &store);
        let notice = svc.return_item(&RequestRef::Id(7), 5).await.unwrap();
        assert_eq!(notice.severity, crate::models::enums::Severity::Success);
        assert!(store.requests.history().is_empty());
    }

    #[tokio::test]
    async fn echo_with_request_payload_rebuilds_archive_entry() {
        let (_tmp, store) = store();
        store.stock.seed("oscilloscope", 10).unwrap();
        store.stock.set_current("oscilloscope", 8).unwrap();

        let mut gateway = MockBackendClient::new();
        gateway.expect_send().returning(|_, _, _| FetchOutcome {
            ok: true,
            status: Some(200),
            data: Some(json!({
                "updated_count": 1,
                "skipped_ids": [],
                "original_request": {
                    "id": 7,
                    "request_id": "REQ0007",
                    "student_name": "Ada Lovelace",
                    "items": [
                        {"id": 5, "item_name": "Oscilloscope", "item_key": "oscilloscope",
                         "quantity": 2, "status": "borrowed"},
                        {"id": 6, "item_name": "Prism", "item_key": "prism",
                         "quantity": 1, "status": "borrowed"}
                    ]
                }
            })),
            error: None,
        });

        let svc = service(gateway, &store);
        let notice = svc.return_item(&RequestRef::Id(7), 5).await.unwrap();
        assert_eq!(notice.severity, crate::models::enums::Severity::Success);

        let history = store.requests.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].items.len(), 1);
        assert_eq!(history[0].items[0].id, Some(5));
        assert_eq!(history[0].items[0].status, ItemStatus::Returned);
        assert_eq!(store.stock.current("oscilloscope"), 10);
    }

    #[tokio::test]
    async fn returned_items_cannot_be_reapproved() {
        let (_tmp, store) = store();
        let mut entry = pending_entry(7, 5, 2);
        entry.items[0].status = ItemStatus::Returned;
        store.requests.save_queue(&[entry]).unwrap();

        let svc = service(offline(), &store);
        let batch = svc
            .apply(
                Decision::Approve,
                vec![ItemAction {
                    request: RequestRef::Id(7),
                    item_id: Some(5),
                    item_index: 0,
                    quantity: 1,
                }],
            )
            .await
            .unwrap();

        assert!(batch.outcomes.is_empty());
        assert_eq!(batch.notice.severity, crate::models::enums::Severity::Error);
    }

    #[tokio::test]
    async fn unresolvable_code_passes_through_verbatim() {
        let (_tmp, store) = store();
        let svc = service(offline(), &store);

        let resolved = svc
            .resolve_request_id(&RequestRef::Code("ABC123".into()))
            .await;
        assert_eq!(resolved, ResolvedId::Unresolved("ABC123".into()));
        assert_eq!(resolved.to_string(), "ABC123");
    }

    #[tokio::test]
    async fn code_resolves_through_cached_queue() {
        let (_tmp, store) = store();
        store.requests.save_queue(&[pending_entry(42, 5, 1)]).unwrap();

        let svc = service(offline(), &store);
        let resolved = svc
            .resolve_request_id(&RequestRef::Code("REQ0042".into()))
            .await;
        assert_eq!(resolved, ResolvedId::Numeric(42));
    }

    #[tokio::test]
    async fn remark_without_item_id_is_reported_not_skipped() {
        let (_tmp, store) = store();
        let svc = service(MockBackendClient::new(), &store);

        let err = svc
            .save_remark(
                &RequestRef::Id(7),
                None,
                Remark::new(Some(crate::models::enums::RemarkType::Damaged), "bent"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn remark_with_zero_updated_count_is_an_error() {
        let (_tmp, store) = store();
        let mut gateway = MockBackendClient::new();
        gateway.expect_send().returning(|_, _, _| FetchOutcome {
            ok: true,
            status: Some(200),
            data: Some(json!({"updated_count": 0, "skipped_ids": [5]})),
            error: None,
        });

        let svc = service(gateway, &store);
        let notice = svc
            .save_remark(
                &RequestRef::Id(7),
                Some(5),
                Remark::new(None, "left in rain"),
            )
            .await
            .unwrap();
        assert_eq!(notice.severity, crate::models::enums::Severity::Error);
    }

    #[tokio::test]
    async fn offline_remark_falls_back_to_local_map() {
        let (_tmp, store) = store();
        let svc = service(offline(), &store);

        let notice = svc
            .save_remark(
                &RequestRef::Id(7),
                Some(5),
                Remark::new(Some(crate::models::enums::RemarkType::MissingParts), "no probe"),
            )
            .await
            .unwrap();
        assert_eq!(notice.severity, crate::models::enums::Severity::Warning);
        assert!(store.remarks.for_item(5).is_some());
    }
}
