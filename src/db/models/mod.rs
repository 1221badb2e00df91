//! Database models split into domain-specific modules.

pub mod coupon;
pub mod order;
pub mod product;
pub mod report;
pub mod user;

pub use coupon::*;
pub use order::*;
pub use product::*;
pub use report::*;
pub use user::*;
