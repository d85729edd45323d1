//! Database models split into domain-specific modules.

pub mod booking;
pub mod contact;
pub mod portfolio;
pub mod stats;
pub mod user;

pub use booking::*;
pub use contact::*;
pub use portfolio::*;
pub use stats::*;
pub use user::*;
