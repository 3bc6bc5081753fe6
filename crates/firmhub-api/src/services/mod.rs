//! Orchestration between handlers and repositories. Handlers stay thin; these functions
//! can be exercised without HTTP.

pub mod accounts;
pub mod answers;
pub mod billing;
pub mod firms;
pub mod media;
