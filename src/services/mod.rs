//! Services behind the admin API
//!
//! - [`AppRegistry`]: app credential CRUD over the shared config file
//! - [`EventPublisher`]: signed test events sent to Soketi

pub mod app_registry;
pub mod events;

pub use app_registry::{App, AppChange, AppPatch, AppRegistry, NewApp, APPS_POINTER};
pub use events::{EventPublisher, TestEvent, TestEventRequest};
