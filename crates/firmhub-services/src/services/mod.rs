pub mod clamav;
#[cfg(feature = "email")]
pub mod email;
pub mod stripe;
pub mod token_store;
