//! Per-item stock ledger and inventory snapshot

use crate::error::AppResult;
use crate::models::inventory::{InventoryItem, ItemDetails};

use super::{keys, CacheDir};

#[derive(Clone)]
pub struct StockCache {
    dir: CacheDir,
}

impl StockCache {
    pub fn new(dir: CacheDir) -> Self {
        Self { dir }
    }

    pub fn current(&self, item_key: &str) -> i64 {
        self.dir.read(&keys::stock(item_key))
    }

    pub fn original(&self, item_key: &str) -> i64 {
        self.dir.read(&keys::stock_original(item_key))
    }

    pub fn set_current(&self, item_key: &str, value: i64) -> AppResult<()> {
        self.dir.write(&keys::stock(item_key), &value)
    }

    pub fn set_original(&self, item_key: &str, value: i64) -> AppResult<()> {
        self.dir.write(&keys::stock_original(item_key), &value)
    }

    /// Initialize both counters from a backend snapshot. The original
    /// (baseline) count is written once and then left alone.
    pub fn seed(&self, item_key: &str, stock: i64) -> AppResult<()> {
        if !self.dir.contains(&keys::stock(item_key)) {
            self.set_current(item_key, stock)?;
        }
        if !self.dir.contains(&keys::stock_original(item_key)) {
            self.set_original(item_key, stock)?;
        }
        Ok(())
    }

    /// Reserve units for a cart selection. Never goes below zero.
    pub async fn reserve(&self, item_key: &str, qty: u32) -> AppResult<i64> {
        self.dir
            .mutate(&keys::stock(item_key), |cur: &mut i64| {
                *cur = (*cur - qty as i64).max(0);
                *cur
            })
            .await
    }

    /// Put reserved units back into the current count: rejecting a pending
    /// item, or removing a cart line.
    ///
    /// Deliberately unclamped: repeated reject cycles can push the current
    /// count past the original baseline (see DESIGN.md); only the
    /// return-path restoration clamps.
    pub async fn release(&self, item_key: &str, qty: u32) -> AppResult<i64> {
        self.dir
            .mutate(&keys::stock(item_key), |cur: &mut i64| {
                *cur += qty as i64;
                *cur
            })
            .await
    }

    /// Restore the units of a returned item, clamped to the baseline.
    pub async fn restore_for_return(&self, item_key: &str, qty: u32) -> AppResult<i64> {
        let original = self.original(item_key);
        self.dir
            .mutate(&keys::stock(item_key), |cur: &mut i64| {
                *cur += qty as i64;
                if original > 0 && *cur > original {
                    *cur = original;
                }
                *cur
            })
            .await
    }

    pub fn cabinet(&self, item_key: &str) -> String {
        self.dir.read(&keys::cabinet(item_key))
    }

    pub fn set_cabinet(&self, item_key: &str, cabinet: &str) -> AppResult<()> {
        self.dir.write(&keys::cabinet(item_key), &cabinet)
    }

    pub fn details(&self, item_key: &str) -> ItemDetails {
        self.dir.read(&keys::item_details(item_key))
    }

    pub fn set_details(&self, item_key: &str, details: &ItemDetails) -> AppResult<()> {
        self.dir.write(&keys::item_details(item_key), details)
    }

    pub fn inventory_snapshot(&self) -> Vec<InventoryItem> {
        self.dir.read(keys::ADMIN_INVENTORY)
    }

    pub fn save_inventory_snapshot(&self, items: &[InventoryItem]) -> AppResult<()> {
        self.dir.write(keys::ADMIN_INVENTORY, &items)
    }
}
