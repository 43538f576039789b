pub mod action;
pub mod config;
pub mod daemon;
pub mod interactive;
pub mod judge;
pub mod platform;
pub mod rebuild;
pub mod serdable;
pub mod stress;
pub mod style;
pub mod testing;

pub use crate::config::Config;
