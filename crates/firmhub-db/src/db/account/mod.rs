mod refresh_token;
mod user;

pub use refresh_token::{RefreshTokenRepository, Rotation};
pub use user::UserRepository;
