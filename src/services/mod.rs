pub mod auth;
pub mod catalog;
pub mod catalog_sync;
pub mod email;
pub mod jwt;
pub mod password_reset;
pub mod reset_token;

pub use auth::AuthService;
pub use catalog::ProductInput;
pub use email::{EmailResolver, EmailService};
pub use jwt::JwtService;
pub use password_reset::PasswordResetService;
pub use reset_token::{ResetTokenLifecycle, SystemClock};
