//! Borrow request model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::enums::{ItemStatus, RemarkType};

/// A request identifier as it appears in the wild: either the numeric
/// database id or the public short code shown to students.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestRef {
    Id(i64),
    Code(String),
}

impl RequestRef {
    /// Parse free-form input: all-digit strings become numeric ids.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse::<i64>() {
                return RequestRef::Id(n);
            }
        }
        RequestRef::Code(trimmed.to_string())
    }

    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            RequestRef::Id(n) => Some(*n),
            RequestRef::Code(_) => None,
        }
    }
}

impl std::fmt::Display for RequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestRef::Id(n) => write!(f, "{}", n),
            RequestRef::Code(c) => write!(f, "{}", c),
        }
    }
}

impl From<i64> for RequestRef {
    fn from(n: i64) -> Self {
        RequestRef::Id(n)
    }
}

impl From<&str> for RequestRef {
    fn from(s: &str) -> Self {
        RequestRef::parse(s)
    }
}

/// One item line within a borrow request.
///
/// The serde aliases are the field-mapping table for every backend and
/// legacy-cache spelling of the same datum; unknown/missing fields fall back
/// to defaults rather than failing the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RequestItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, alias = "item_name")]
    pub name: String,
    #[serde(default, alias = "itemKey")]
    pub item_key: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, alias = "item_image")]
    pub image: Option<String>,
    #[serde(default, alias = "item_description", alias = "item_desc")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, alias = "remark")]
    pub admin_remark: Option<String>,
    #[serde(default)]
    pub remark_type: Option<RemarkType>,
    #[serde(default)]
    pub remark_created_at: Option<DateTime<Utc>>,
}

fn default_quantity() -> u32 {
    1
}

impl RequestItem {
    /// Key used for stock bookkeeping: the inventory key, or the display
    /// name when the key is missing (legacy entries).
    pub fn stock_key(&self) -> &str {
        self.item_key.as_deref().filter(|k| !k.is_empty()).unwrap_or(&self.name)
    }
}

/// A student's borrow request with its nested item lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BorrowRequest {
    #[serde(default)]
    pub id: Option<RequestRef>,
    #[serde(default, alias = "requestId")]
    pub request_id: Option<String>,
    #[serde(default, alias = "studentName", alias = "full_name", alias = "fullname")]
    pub student_name: String,
    #[serde(default, alias = "studentID", alias = "studentId", alias = "id_number")]
    pub student_id: String,
    #[serde(default, alias = "student_email")]
    pub email: String,
    #[serde(default, alias = "studentPhone", alias = "phone", alias = "contact")]
    pub student_phone: String,
    #[serde(default, alias = "department", alias = "studentDepartment")]
    pub student_department: String,
    #[serde(default, alias = "teacherName")]
    pub teacher_name: String,
    #[serde(default)]
    pub teacher_email: String,
    #[serde(default)]
    pub teacher_phone: String,
    #[serde(default, alias = "reason")]
    pub purpose: String,
    #[serde(default, alias = "borrowDate")]
    pub borrow_date: String,
    #[serde(default, alias = "returnDate")]
    pub return_date: String,
    /// Stored status tag. Advisory only: the displayed status is derived
    /// from the items (see [`BorrowRequest::derived_status`]).
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub items: Vec<RequestItem>,
    #[serde(default)]
    pub admin_remark: Option<String>,
    #[serde(default)]
    pub remark_type: Option<RemarkType>,
    #[serde(default)]
    pub remark_created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "actualReturnDate")]
    pub actual_return_date: Option<String>,
}

impl BorrowRequest {
    /// The public-facing identifier, falling back through the same chain the
    /// views use: short code first, then the numeric id.
    pub fn public_code(&self) -> String {
        self.request_id
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| self.id.as_ref().map(|i| i.to_string()))
            .unwrap_or_default()
    }

    /// Best-effort contact address: the email field, or an address a legacy
    /// record stored in the name field.
    pub fn contact_email(&self) -> String {
        let direct = crate::util::sanitize_email(&self.email);
        if !direct.is_empty() {
            return direct;
        }
        crate::util::sanitize_email(&self.student_name)
    }

    /// Whether this record is addressed by the given reference (numeric id
    /// or short code, compared as the views compare them).
    pub fn matches(&self, rf: &RequestRef) -> bool {
        let needle = rf.to_string();
        self.id.as_ref().map(|i| i.to_string() == needle).unwrap_or(false)
            || self.request_id.as_deref() == Some(needle.as_str())
    }

    pub fn pending_items(&self) -> impl Iterator<Item = &RequestItem> {
        self.items.iter().filter(|i| i.status == ItemStatus::Pending)
    }

    pub fn active_items(&self) -> impl Iterator<Item = &RequestItem> {
        self.items.iter().filter(|i| i.status.is_active())
    }

    pub fn unreturned_items(&self) -> impl Iterator<Item = &RequestItem> {
        self.items.iter().filter(|i| i.status != ItemStatus::Returned)
    }

    pub fn has_pending_items(&self) -> bool {
        self.pending_items().next().is_some()
    }

    /// Displayed status, computed from the items rather than trusting the
    /// stored tag: any active item makes the request borrowed, otherwise any
    /// pending item keeps it pending, otherwise fully-returned or
    /// fully-rejected wins.
    pub fn derived_status(&self) -> ItemStatus {
        if self.items.is_empty() {
            return self.status;
        }
        if self.items.iter().any(|i| i.status.is_active()) {
            ItemStatus::Borrowed
        } else if self.items.iter().any(|i| i.status == ItemStatus::Pending) {
            ItemStatus::Pending
        } else if self.items.iter().all(|i| i.status == ItemStatus::Rejected) {
            ItemStatus::Rejected
        } else {
            ItemStatus::Returned
        }
    }

    /// Narrow the record to its pending items (the "pending" page view).
    /// Returns `None` when nothing is pending.
    pub fn pending_view(&self) -> Option<BorrowRequest> {
        let items: Vec<RequestItem> = self.pending_items().cloned().collect();
        if items.is_empty() {
            return None;
        }
        let mut view = self.clone();
        view.status = ItemStatus::Pending;
        view.items = items;
        Some(view)
    }
}

/// New-request payload built from a cart checkout.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBorrowRequest {
    #[validate(length(min = 1, message = "request code is required"))]
    pub request_id: String,
    #[validate(length(min = 1, message = "student name is required"))]
    pub student_name: String,
    #[validate(length(min = 1, message = "student id is required"))]
    pub student_id: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub student_phone: String,
    #[serde(default)]
    pub department: String,
    #[validate(length(min = 1, message = "teacher name is required"))]
    pub teacher_name: String,
    #[serde(default)]
    pub teacher_email: String,
    #[serde(default)]
    pub teacher_phone: String,
    #[serde(default)]
    pub purpose: String,
    pub borrow_date: String,
    pub return_date: String,
    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<NewRequestItem>,
    pub status: ItemStatus,
}

/// One item line of a new request, in the backend's field names.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewRequestItem {
    #[validate(length(min = 1, message = "item name is required"))]
    pub item_name: String,
    pub item_key: Option<String>,
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: u32,
    pub item_image: Option<String>,
}

impl CreateBorrowRequest {
    /// View of the payload as a cache-queue entry for the offline fallback.
    pub fn to_local_entry(&self) -> BorrowRequest {
        BorrowRequest {
            id: Some(RequestRef::Code(self.request_id.clone())),
            request_id: Some(self.request_id.clone()),
            student_name: self.student_name.clone(),
            student_id: self.student_id.clone(),
            email: self.email.clone(),
            student_phone: self.student_phone.clone(),
            student_department: self.department.clone(),
            teacher_name: self.teacher_name.clone(),
            teacher_email: self.teacher_email.clone(),
            teacher_phone: self.teacher_phone.clone(),
            purpose: self.purpose.clone(),
            borrow_date: self.borrow_date.clone(),
            return_date: self.return_date.clone(),
            status: ItemStatus::Pending,
            items: self
                .items
                .iter()
                .map(|i| RequestItem {
                    id: None,
                    name: i.item_name.clone(),
                    item_key: i.item_key.clone(),
                    quantity: i.quantity,
                    image: i.item_image.clone(),
                    description: None,
                    status: ItemStatus::Pending,
                    admin_remark: None,
                    remark_type: None,
                    remark_created_at: None,
                })
                .collect(),
            ..Default::default()
        }
    }
}
