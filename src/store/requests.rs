//! Typed facade over the cached request queue and history

use crate::error::AppResult;
use crate::models::request::{BorrowRequest, RequestRef};

use super::{keys, CacheDir};

#[derive(Clone)]
pub struct RequestsCache {
    dir: CacheDir,
}

impl RequestsCache {
    pub fn new(dir: CacheDir) -> Self {
        Self { dir }
    }

    pub fn queue(&self) -> Vec<BorrowRequest> {
        self.dir.read(keys::REQUEST_QUEUE)
    }

    pub fn save_queue(&self, queue: &[BorrowRequest]) -> AppResult<()> {
        self.dir.write(keys::REQUEST_QUEUE, &queue)
    }

    pub fn history(&self) -> Vec<BorrowRequest> {
        self.dir.read(keys::HISTORY)
    }

    pub fn find_in_queue(&self, rf: &RequestRef) -> Option<BorrowRequest> {
        self.queue().into_iter().find(|r| r.matches(rf))
    }

    /// Search queue then history, the way the detail views do.
    pub fn find_anywhere(&self, rf: &RequestRef) -> Option<BorrowRequest> {
        self.find_in_queue(rf)
            .or_else(|| self.history().into_iter().find(|r| r.matches(rf)))
    }

    /// Mutate the queue under the store lock.
    pub async fn mutate_queue<R>(
        &self,
        f: impl FnOnce(&mut Vec<BorrowRequest>) -> R,
    ) -> AppResult<R> {
        self.dir.mutate(keys::REQUEST_QUEUE, f).await
    }

    /// Append an archived entry to history.
    pub async fn push_history(&self, entry: BorrowRequest) -> AppResult<()> {
        self.dir
            .mutate(keys::HISTORY, |h: &mut Vec<BorrowRequest>| h.push(entry))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::ItemStatus;
    use crate::models::request::RequestItem;

    fn entry(id: RequestRef, code: &str, status: ItemStatus) -> BorrowRequest {
        BorrowRequest {
            id: Some(id),
            request_id: Some(code.to_string()),
            status,
            items: vec![RequestItem { status, ..Default::default() }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn find_matches_by_id_and_code() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = RequestsCache::new(CacheDir::open(tmp.path()).unwrap());

        cache
            .save_queue(&[
                entry(RequestRef::Id(42), "LYOQNPL", ItemStatus::Pending),
                entry(RequestRef::Code("L9Z2K1A".into()), "L9Z2K1A", ItemStatus::Borrowed),
            ])
            .unwrap();

        assert!(cache.find_in_queue(&RequestRef::Id(42)).is_some());
        assert!(cache.find_in_queue(&RequestRef::Code("LYOQNPL".into())).is_some());
        assert!(cache.find_in_queue(&RequestRef::Code("L9Z2K1A".into())).is_some());
        assert!(cache.find_in_queue(&RequestRef::Id(999)).is_none());
    }

    #[tokio::test]
    async fn history_is_searched_after_queue() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = RequestsCache::new(CacheDir::open(tmp.path()).unwrap());

        cache
            .push_history(entry(RequestRef::Id(8), "DONE123", ItemStatus::Returned))
            .await
            .unwrap();

        assert!(cache.find_in_queue(&RequestRef::Id(8)).is_none());
        assert!(cache.find_anywhere(&RequestRef::Id(8)).is_some());
    }
}
