//! Core domain types for Bramble.

pub mod cart;
pub mod id;
pub mod money;
pub mod order;
pub mod product;
pub mod status;

pub use cart::{Cart, CartAdvisory, CartId, CartItem};
pub use id::*;
pub use money::{CurrencyCode, Money};
pub use order::{Address, NewOrder, NewOrderItem, Order, OrderItem};
pub use product::Product;
pub use status::{InvalidTransition, OrderStatus};
