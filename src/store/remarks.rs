//! Cached remark map
//!
//! Keyed `req_<id>` for request-level remarks and `item_<id>` for item-level
//! ones, matching the legacy cache layout the badge views read.

use indexmap::IndexMap;

use crate::error::AppResult;
use crate::models::remark::Remark;
use crate::models::request::RequestRef;

use super::{keys, CacheDir};

#[derive(Clone)]
pub struct RemarksCache {
    dir: CacheDir,
}

impl RemarksCache {
    pub fn new(dir: CacheDir) -> Self {
        Self { dir }
    }

    pub fn request_key(rf: &RequestRef) -> String {
        format!("req_{rf}")
    }

    pub fn item_key(item_id: i64) -> String {
        format!("item_{item_id}")
    }

    pub fn all(&self) -> IndexMap<String, Remark> {
        self.dir.read(keys::REMARKS)
    }

    pub fn for_request(&self, rf: &RequestRef) -> Option<Remark> {
        self.all().shift_remove(&Self::request_key(rf))
    }

    pub fn for_item(&self, item_id: i64) -> Option<Remark> {
        self.all().shift_remove(&Self::item_key(item_id))
    }

    pub async fn set(&self, key: String, remark: Remark) -> AppResult<()> {
        self.dir
            .mutate(keys::REMARKS, |map: &mut IndexMap<String, Remark>| {
                map.insert(key, remark);
            })
            .await
    }
}
