//! Domain models returned by repositories and serialized by handlers.
//!
//! These are validated domain types, separate from the private `*Row` types
//! in `crate::db`.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod community;
pub mod order;
pub mod review;
pub mod support;
pub mod user;
pub mod wishlist;

pub use address::Address;
pub use cart::{CartItem, CartSummary, CartView};
pub use catalog::{Category, LowStockEntry, Product, ProductDetail, ProductVariant};
pub use community::{Comment, LikeStatus, Post, PostDetail};
pub use order::{Order, OrderDetail, OrderItem, TrackingEvent, TrackingInfo};
pub use review::{Review, ReviewAuthor};
pub use support::{Ticket, TicketDetail, TicketMessage};
pub use user::{User, UserStats};
pub use wishlist::{ViewedProduct, WishlistItem};
