//! Repository implementations for database operations

pub mod activity;
pub mod market;
pub mod position;
pub mod trader;

pub use activity::*;
pub use market::*;
pub use position::*;
pub use trader::*;
