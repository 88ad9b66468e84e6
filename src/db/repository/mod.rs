pub mod auth_tokens;
pub mod settings;
pub mod user;

pub use auth_tokens::AuthTokenRepository;
pub use settings::SettingRepository;
pub use user::UserRepository;
