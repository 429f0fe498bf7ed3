//! Data models for MedCart entities.
//!
//! This module contains all the data structures used to represent
//! storefront data including:
//!
//! - `Product`: catalog entries with category, price, and stock
//! - `Order`, `OrderItem`, `OrderStatus`: orders and their status lifecycle
//! - `User`, `Role`, `Address`: accounts and shipping details
//! - `Seller`, `SellerStatus`: seller accounts and the approval queue

pub mod order;
pub mod product;
pub mod seller;
pub mod user;

pub use order::{NewOrder, Order, OrderItem, OrderStatus, PaymentMethod};
pub use product::{NewProduct, Product, ProductPatch};
pub use seller::{Seller, SellerStatus};
pub use user::{Address, Role, User, UserPatch};
