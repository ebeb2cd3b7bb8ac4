//! Dashboard statistics service

use indexmap::IndexMap;

use crate::models::enums::ItemStatus;
use crate::services::requests::RequestsService;

/// Aggregate counts shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardStats {
    /// Requests with at least one pending item.
    pub pending_requests: usize,
    /// Item lines currently out on loan.
    pub active_loans: usize,
    /// Archived (returned) requests.
    pub returned_total: usize,
    pub frequent_items: Vec<FrequentItem>,
}

/// One bar of the most-borrowed-items chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequentItem {
    pub name: String,
    pub units: u64,
}

#[derive(Clone)]
pub struct StatsService {
    requests: RequestsService,
}

impl StatsService {
    pub fn new(requests: RequestsService) -> Self {
        Self { requests }
    }

    /// Compute the dashboard aggregates. Each underlying view already
    /// degrades to the cache, so this works offline too.
    pub async fn dashboard(&self, frequent_limit: usize) -> DashboardStats {
        let pending = self.requests.pending_requests().await;
        let active = self.requests.active_loans().await;
        let history = self.requests.history().await;

        let active_loans = active
            .iter()
            .flat_map(|r| r.items.iter())
            .filter(|i| i.status != ItemStatus::Returned)
            .count();

        let frequent_items = rank_items(active.iter().chain(history.iter()), frequent_limit);

        DashboardStats {
            pending_requests: pending.len(),
            active_loans,
            returned_total: history.len(),
            frequent_items,
        }
    }
}

/// Rank items by total borrowed units across the given requests.
fn rank_items<'a>(
    requests: impl Iterator<Item = &'a crate::models::request::BorrowRequest>,
    limit: usize,
) -> Vec<FrequentItem> {
    let mut totals: IndexMap<String, u64> = IndexMap::new();
    for request in requests {
        for item in &request.items {
            if item.name.is_empty() {
                continue;
            }
            *totals.entry(item.name.clone()).or_insert(0) += item.quantity as u64;
        }
    }

    let mut ranked: Vec<FrequentItem> = totals
        .into_iter()
        .map(|(name, units)| FrequentItem { name, units })
        .collect();
    ranked.sort_by(|a, b| b.units.cmp(&a.units).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::{BorrowRequest, RequestItem};

    fn request_with(items: Vec<(&str, u32)>) -> BorrowRequest {
        BorrowRequest {
            items: items
                .into_iter()
                .map(|(name, qty)| RequestItem {
                    name: name.into(),
                    quantity: qty,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn ranking_sums_units_and_sorts_descending() {
        let records = vec![
            request_with(vec![("Prism", 2), ("Caliper", 1)]),
            request_with(vec![("Prism", 1), ("Scale", 3)]),
        ];
        let ranked = rank_items(records.iter(), 10);
        assert_eq!(ranked[0], FrequentItem { name: "Prism".into(), units: 3 });
        assert_eq!(ranked[1], FrequentItem { name: "Scale".into(), units: 3 });
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn ranking_respects_limit_and_skips_unnamed() {
        let records = vec![request_with(vec![("Prism", 1), ("", 9), ("Scale", 2)])];
        let ranked = rank_items(records.iter(), 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "Scale");
    }
}
