//! Core module
//!
//! Contains the event bus and manager configuration

mod config;
mod events;

pub use config::ManagerConfig;
pub use events::{AssetEvent, AssetEventKind, BindingId, EventBus, Handler, UnknownEventKind};
