//! Shared domain enums

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

// ---------------------------------------------------------------------------
// ItemStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of one item line within a borrow request.
///
/// Unrecognized, null or absent wire values deserialize to `Pending`,
/// matching the defaulting the backend contract allows for partially-filled
/// records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum ItemStatus {
    #[default]
    Pending,
    Approved,
    Borrowed,
    Rejected,
    Returned,
}

impl From<String> for ItemStatus {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" => ItemStatus::Approved,
            "borrowed" => ItemStatus::Borrowed,
            "rejected" => ItemStatus::Rejected,
            "returned" => ItemStatus::Returned,
            _ => ItemStatus::Pending,
        }
    }
}

impl From<Option<String>> for ItemStatus {
    fn from(s: Option<String>) -> Self {
        s.map(ItemStatus::from).unwrap_or_default()
    }
}

impl ItemStatus {
    /// The explicit transition table. Everything not listed is illegal;
    /// `Rejected` and `Returned` are terminal.
    pub fn can_transition(self, to: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, to),
            (Pending, Approved)
                | (Pending, Borrowed)
                | (Pending, Rejected)
                | (Approved, Borrowed)
                | (Approved, Returned)
                | (Borrowed, Returned)
        )
    }

    /// Validate a transition, returning the new status or a typed error.
    pub fn transition(self, to: ItemStatus) -> AppResult<ItemStatus> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(AppError::IllegalTransition { from: self, to })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Rejected | ItemStatus::Returned)
    }

    /// Whether the item counts as an active loan (approved or borrowed).
    pub fn is_active(self) -> bool {
        matches!(self, ItemStatus::Approved | ItemStatus::Borrowed)
    }

    /// Wire tag as sent to the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
            ItemStatus::Borrowed => "borrowed",
            ItemStatus::Rejected => "rejected",
            ItemStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RemarkType
// ---------------------------------------------------------------------------

/// Admin remark categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemarkType {
    Damaged,
    MissingParts,
    LateReturn,
    WrongItem,
    Other,
}

impl RemarkType {
    /// Human-readable label shown on remark badges.
    pub fn label(self) -> &'static str {
        match self {
            RemarkType::Damaged => "Damaged",
            RemarkType::MissingParts => "Missing Parts",
            RemarkType::LateReturn => "Late Return",
            RemarkType::WrongItem => "Wrong Item",
            RemarkType::Other => "Other",
        }
    }
}

impl std::fmt::Display for RemarkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Classification of a mutating operation's outcome: `Success` means the
/// change persisted remotely, `Warning` means it only persisted in the local
/// cache, `Error` means nothing persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_edges() {
        use ItemStatus::*;
        assert!(Pending.can_transition(Approved));
        assert!(Pending.can_transition(Borrowed));
        assert!(Pending.can_transition(Rejected));
        assert!(Approved.can_transition(Borrowed));
        assert!(Borrowed.can_transition(Returned));
    }

    #[test]
    fn terminal_statuses_have_no_edges() {
        use ItemStatus::*;
        for to in [Pending, Approved, Borrowed, Rejected, Returned] {
            assert!(!Returned.can_transition(to), "returned -> {to} must be illegal");
            assert!(!Rejected.can_transition(to), "rejected -> {to} must be illegal");
        }
    }

    #[test]
    fn no_edge_back_to_pending() {
        use ItemStatus::*;
        for from in [Approved, Borrowed, Rejected, Returned] {
            assert!(!from.can_transition(Pending));
        }
    }

    #[test]
    fn illegal_transition_is_typed() {
        let err = ItemStatus::Returned.transition(ItemStatus::Pending).unwrap_err();
        assert!(matches!(
            err,
            AppError::IllegalTransition { from: ItemStatus::Returned, to: ItemStatus::Pending }
        ));
    }

    #[test]
    fn unknown_wire_status_defaults_to_pending() {
        let status: ItemStatus = serde_json::from_str("\"weird\"").unwrap();
        assert_eq!(status, ItemStatus::Pending);
        let status: ItemStatus = serde_json::from_str("\"borrowed\"").unwrap();
        assert_eq!(status, ItemStatus::Borrowed);
    }

    #[test]
    fn explicit_null_status_defaults_to_pending() {
        let status: ItemStatus = serde_json::from_str("null").unwrap();
        assert_eq!(status, ItemStatus::Pending);
    }

    #[test]
    fn remark_type_round_trip() {
        let json = serde_json::to_string(&RemarkType::MissingParts).unwrap();
        assert_eq!(json, "\"missing-parts\"");
        let back: RemarkType = serde_json::from_str("\"late-return\"").unwrap();
        assert_eq!(back, RemarkType::LateReturn);
    }
}
