pub mod access_policy;
pub mod auth;
pub mod email;
pub mod init;
pub mod password_policy;
pub mod settings;
pub mod users;
