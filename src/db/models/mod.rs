//! Database models split into separate files.
//! Every type is re-exported at `crate::db::models` (and `crate::db`).

pub mod auth_token;
pub mod setting;
pub mod user;

pub use self::auth_token::*;
pub use self::setting::*;
pub use self::user::*;
