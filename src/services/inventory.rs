//! Inventory service: catalog CRUD, stock baselines, spreadsheet export

use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    gateway::{BackendClient, FilePart, FormPayload},
    models::{
        enums::ItemStatus,
        inventory::{InventoryItem, ItemDetails, NewInventoryItem},
        notice::Notice,
    },
    store::CacheStore,
};

#[derive(Clone)]
pub struct InventoryService {
    gateway: Arc<dyn BackendClient>,
    store: CacheStore,
}

impl InventoryService {
    pub fn new(gateway: Arc<dyn BackendClient>, store: CacheStore) -> Self {
        Self { gateway, store }
    }

    /// Fetch the inventory, refreshing the local snapshot and seeding the
    /// per-item stock counters on success. Falls back to the snapshot.
    pub async fn list(&self) -> Vec<InventoryItem> {
        let outcome = self.gateway.send(Method::GET, "/api/inventory/", None).await;

        if let Some(items) = outcome.parse::<Vec<InventoryItem>>() {
            if let Err(e) = self.store.stock.save_inventory_snapshot(&items) {
                tracing::warn!(error = %e, "failed to write inventory snapshot");
            }
            for item in &items {
                let key = item.stock_key();
                if let Err(e) = self.store.stock.seed(&key, item.stock) {
                    tracing::warn!(item = %key, error = %e, "failed to seed stock counters");
                }
                if !item.cabinet.is_empty() && self.store.stock.cabinet(&key).is_empty() {
                    let _ = self.store.stock.set_cabinet(&key, &item.cabinet);
                }
            }
            return items;
        }

        tracing::warn!("inventory unavailable remotely, using cached snapshot");
        self.store.stock.inventory_snapshot()
    }

    /// Create an inventory record (multipart, optionally with an image).
    pub async fn create(&self, item: NewInventoryItem) -> AppResult<Notice> {
        item.validate()?;

        let mut form = FormPayload::default()
            .text("item_key", item.item_key.clone())
            .text("name", item.name.clone())
            .text("category", item.category.clone())
            .text("stock", item.stock.to_string())
            .text("cabinet", item.cabinet.clone())
            .text("description", item.description.clone())
            .text("type", item.item_type.clone())
            .text("use", item.usage.clone());
        if let Some(image) = &item.image {
            form = form.file(FilePart {
                field: "image".into(),
                filename: image.filename.clone(),
                content_type: image.content_type.clone(),
                data: image.data.clone(),
            });
        }

        let outcome = self.gateway.send_form("/api/inventory/", form).await;
        if outcome.ok {
            self.store.stock.seed(&item.item_key, item.stock)?;
            return Ok(Notice::success("Item added to inventory."));
        }

        tracing::warn!(item = %item.item_key, "backend unavailable, adding item to local snapshot");
        let mut snapshot = self.store.stock.inventory_snapshot();
        snapshot.push(item.to_local_item());
        self.store.stock.save_inventory_snapshot(&snapshot)?;
        self.store.stock.seed(&item.item_key, item.stock)?;
        Ok(Notice::warning("Item saved locally (offline mode)."))
    }

    /// Update an item's editable details. The local mirror under
    /// `item_details_<key>` is written on both paths so the cards render
    /// offline.
    pub async fn update_details(
        &self,
        id: Option<i64>,
        item_key: &str,
        mut details: ItemDetails,
    ) -> AppResult<Notice> {
        details.updated_at = Some(Utc::now().to_rfc3339());

        let mut backend_ok = false;
        if let Some(id) = id {
            let body = serde_json::to_value(&details)
                .map_err(|e| AppError::Internal(format!("details serialize failed: {e}")))?;
            let outcome = self
                .gateway
                .send(Method::PATCH, &format!("/api/inventory/{id}/"), Some(body))
                .await;
            backend_ok = outcome.ok;
        }

        self.store.stock.set_details(item_key, &details)?;
        if !details.cabinet.is_empty() {
            self.store.stock.set_cabinet(item_key, &details.cabinet)?;
        }

        if backend_ok {
            Ok(Notice::success("Item details saved to server."))
        } else {
            Ok(Notice::warning("Item details saved locally (offline mode)."))
        }
    }

    /// Delete an inventory record. No local compensation: removing stock
    /// only on this machine would desynchronize every other view.
    pub async fn delete(&self, id: i64) -> AppResult<Notice> {
        let outcome = self
            .gateway
            .send(Method::DELETE, &format!("/api/inventory/{id}/"), None)
            .await;

        if !outcome.ok {
            return Ok(Notice::error("Delete failed: backend unavailable."));
        }

        let mut snapshot = self.store.stock.inventory_snapshot();
        snapshot.retain(|i| i.id != Some(id));
        self.store.stock.save_inventory_snapshot(&snapshot)?;
        Ok(Notice::success("Item deleted."))
    }

    /// Set the original (baseline) stock count, by record id when known,
    /// else by inventory key. The local baseline is updated on both paths.
    pub async fn set_original_stock(
        &self,
        id: Option<i64>,
        item_key: &str,
        value: i64,
    ) -> AppResult<Notice> {
        if value < 0 {
            return Err(AppError::Validation("stock cannot be negative".into()));
        }

        let outcome = match id {
            Some(id) => {
                self.gateway
                    .send(
                        Method::POST,
                        &format!("/api/inventory/{id}/set_stock/"),
                        Some(json!({ "stock": value })),
                    )
                    .await
            }
            None => {
                self.gateway
                    .send(
                        Method::POST,
                        "/api/inventory/set_stock_by_key/",
                        Some(json!({ "item_key": item_key, "stock": value })),
                    )
                    .await
            }
        };

        self.store.stock.set_original(item_key, value)?;

        if outcome.ok {
            Ok(Notice::success("Original stock updated on server."))
        } else {
            Ok(Notice::warning("Failed to update on server. Saved locally only."))
        }
    }

    /// Download the inventory spreadsheet export.
    pub async fn export_xlsx(&self) -> AppResult<Vec<u8>> {
        self.gateway.download("/api/inventory/export_xlsx/").await
    }

    /// Units of one item currently out on loan, summed from the cached
    /// borrowed queue entries.
    pub fn active_loan_units(&self, item_key: &str) -> u32 {
        let norm = |s: &str| s.trim().to_lowercase();
        let needle = norm(item_key);
        self.store
            .requests
            .queue()
            .iter()
            .filter(|r| r.derived_status() == ItemStatus::Borrowed)
            .flat_map(|r| r.items.iter())
            .filter(|i| i.status.is_active() && norm(i.stock_key()) == needle)
            .map(|i| i.quantity)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FetchOutcome, MockBackendClient};
    use crate::models::request::{BorrowRequest, RequestItem, RequestRef};

    fn store() -> (tempfile::TempDir, CacheStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn list_seeds_stock_counters_once() {
        let mut gateway = MockBackendClient::new();
        gateway.expect_send().returning(|_, _, _| FetchOutcome {
            ok: true,
            status: Some(200),
            data: Some(serde_json::json!([
                {"id": 1, "item_key": "prism", "name": "Prism", "stock": 4, "cabinet": "C2"}
            ])),
            error: None,
        });

        let (_tmp, store) = store();
        let svc = InventoryService::new(Arc::new(gateway), store.clone());

        let items = svc.list().await;
        assert_eq!(items.len(), 1);
        assert_eq!(store.stock.current("prism"), 4);
        assert_eq!(store.stock.original("prism"), 4);
        assert_eq!(store.stock.cabinet("prism"), "C2");

        // local adjustments survive a refresh
        store.stock.set_current("prism", 1).unwrap();
        svc.list().await;
        assert_eq!(store.stock.current("prism"), 1);
    }

    #[tokio::test]
    async fn list_falls_back_to_snapshot() {
        let (_tmp, store) = store();
        store
            .stock
            .save_inventory_snapshot(&[InventoryItem {
                item_key: "prism".into(),
                name: "Prism".into(),
                stock: 4,
                ..Default::default()
            }])
            .unwrap();

        let mut gateway = MockBackendClient::new();
        gateway
            .expect_send()
            .returning(|_, _, _| FetchOutcome::failure("connection refused"));

        let svc = InventoryService::new(Arc::new(gateway), store);
        let items = svc.list().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Prism");
    }

    #[tokio::test]
    async fn active_loan_units_sums_borrowed_entries() {
        let (_tmp, store) = store();
        store
            .requests
            .save_queue(&[BorrowRequest {
                id: Some(RequestRef::Id(1)),
                status: ItemStatus::Borrowed,
                items: vec![
                    RequestItem {
                        item_key: Some("Prism".into()),
                        quantity: 2,
                        status: ItemStatus::Borrowed,
                        ..Default::default()
                    },
                    RequestItem {
                        item_key: Some("caliper".into()),
                        quantity: 1,
                        status: ItemStatus::Borrowed,
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }])
            .unwrap();

        let svc = InventoryService::new(Arc::new(MockBackendClient::new()), store);
        assert_eq!(svc.active_loan_units("prism"), 2);
        assert_eq!(svc.active_loan_units("caliper"), 1);
        assert_eq!(svc.active_loan_units("scale"), 0);
    }

    #[tokio::test]
    async fn offline_create_appends_to_snapshot() {
        let (_tmp, store) = store();
        let mut gateway = MockBackendClient::new();
        gateway
            .expect_send_form()
            .returning(|_, _| FetchOutcome::failure("connection refused"));

        let svc = InventoryService::new(Arc::new(gateway), store.clone());
        let notice = svc
            .create(NewInventoryItem {
                item_key: "scale".into(),
                name: "Digital Scale".into(),
                category: "Measurement".into(),
                stock: 6,
                cabinet: String::new(),
                description: String::new(),
                item_type: String::new(),
                usage: String::new(),
                image: None,
            })
            .await
            .unwrap();

        assert_eq!(notice.severity, crate::models::enums::Severity::Warning);
        assert_eq!(store.stock.inventory_snapshot().len(), 1);
        assert_eq!(store.stock.current("scale"), 6);
    }
}
