//! Data models for the application, organized by domain.

mod answer;
mod firm;
mod media;
mod message;
mod question;
mod subscription;
mod taxonomy;
mod user;

pub use answer::*;
pub use firm::*;
pub use media::*;
pub use message::*;
pub use question::*;
pub use subscription::*;
pub use taxonomy::*;
pub use user::*;
