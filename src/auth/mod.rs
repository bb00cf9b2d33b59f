//! Optional login for the management endpoints.

pub mod password;
pub mod session;
pub mod users;

pub use password::{hash_password, verify_password, HashFormatError};
pub use session::{Session, SessionStore};
pub use users::{authenticate, create_user, find_user_by_username, User};
