//! Request handlers.

pub mod account;
pub mod admin;
pub mod clips;
pub mod health;
pub mod jobs;

pub use health::*;
