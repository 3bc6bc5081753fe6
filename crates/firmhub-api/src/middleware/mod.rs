pub mod audit;
pub mod language;

pub use firmhub_infra::{get_request_id, request_id_middleware, security_headers_middleware};
pub use language::{language_middleware, RequestLanguage};
