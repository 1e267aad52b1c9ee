pub mod api;
pub mod config;
pub mod crud;
pub mod dto;
pub mod error;
pub mod ffi;
pub mod model;
pub mod store;
pub mod sync;

pub use api::{CanvasApi, RemoteSource};
pub use config::Config;
pub use error::SyncError;
pub use store::Store;
pub use sync::{BranchFailure, FailureScope, SyncClient, SyncReport};
