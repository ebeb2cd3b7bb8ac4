//! Data models for the PhyLab client

pub mod cart;
pub mod enums;
pub mod inventory;
pub mod notice;
pub mod remark;
pub mod request;
pub mod review;

// Re-export commonly used types
pub use cart::{Cart, CartItem, CheckoutForm};
pub use enums::{ItemStatus, RemarkType, Severity};
pub use inventory::{ImageFile, InventoryItem, ItemDetails, NewInventoryItem};
pub use notice::Notice;
pub use remark::Remark;
pub use request::{BorrowRequest, CreateBorrowRequest, NewRequestItem, RequestItem, RequestRef};
pub use review::{NewReview, Review};
