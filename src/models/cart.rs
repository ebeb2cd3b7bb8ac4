//! Student cart: the selection that becomes a borrow request at checkout

use serde::{Deserialize, Serialize};

use super::request::{CreateBorrowRequest, NewRequestItem};
use crate::models::enums::ItemStatus;
use crate::util::generate_request_code;

/// One selected inventory item and how many units of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub item_key: String,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
}

/// An owned, session-scoped cart (no module-level globals).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit, merging with an existing line for the same item key.
    pub fn add(&mut self, item_key: impl Into<String>, name: impl Into<String>, image: Option<String>) {
        let item_key = item_key.into();
        if let Some(existing) = self.items.iter_mut().find(|i| i.item_key == item_key) {
            existing.quantity += 1;
            return;
        }
        self.items.push(CartItem {
            item_key,
            name: name.into(),
            image,
            quantity: 1,
        });
    }

    /// Remove one unit from the line at `index`, dropping the line when it
    /// reaches zero. Returns the item key so the caller can release the
    /// reserved unit back to stock.
    pub fn remove_one(&mut self, index: usize) -> Option<String> {
        let item = self.items.get_mut(index)?;
        let key = item.item_key.clone();
        if item.quantity > 1 {
            item.quantity -= 1;
        } else {
            self.items.remove(index);
        }
        Some(key)
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// The checkout form the student fills in alongside the cart.
#[derive(Debug, Clone, Default)]
pub struct CheckoutForm {
    pub student_name: String,
    pub student_id: String,
    pub email: String,
    pub student_phone: String,
    pub department: String,
    pub teacher_name: String,
    pub teacher_email: String,
    pub teacher_phone: String,
    pub purpose: String,
    pub borrow_date: String,
    pub return_date: String,
}

impl CheckoutForm {
    /// Build the request payload: a fresh public short code, all items
    /// pending.
    pub fn into_request(self, cart: &Cart) -> CreateBorrowRequest {
        CreateBorrowRequest {
            request_id: generate_request_code(),
            student_name: self.student_name,
            student_id: self.student_id,
            email: self.email,
            student_phone: self.student_phone,
            department: self.department,
            teacher_name: self.teacher_name,
            teacher_email: self.teacher_email,
            teacher_phone: self.teacher_phone,
            purpose: self.purpose,
            borrow_date: self.borrow_date,
            return_date: self.return_date,
            items: cart
                .items()
                .iter()
                .map(|i| NewRequestItem {
                    item_name: i.name.clone(),
                    item_key: Some(i.item_key.clone()),
                    quantity: i.quantity,
                    item_image: i.image.clone(),
                })
                .collect(),
            status: ItemStatus::Pending,
        }
    }
}
