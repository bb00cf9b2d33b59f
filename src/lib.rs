//! App launcher and account directory: a SQLite catalogue of apps and
//! accounts, a folder-grouped listing over it, and the HTTP/CLI surfaces.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
mod error;
pub mod folder;
pub mod http;
pub mod listing;
pub mod logging;
pub mod migrate;
pub mod state;
pub mod time;

pub use config::Config;
pub use error::{
    is_foreign_key_violation, is_unique_violation, AppError, AppResult, ErrorKind,
    AUTH_DISABLED_CODE, CONFLICT_CODE, NOT_FOUND_CODE, UNAUTHORIZED_CODE, VALIDATION_CODE,
};
pub use listing::{grouped_listing, FolderListing};
pub use logging::init_logging;
pub use state::AppState;

/// Commit the binary was built from, or `unknown`.
pub const GIT_HASH: &str = env!("ACCOUNTDECK_GIT_HASH");
