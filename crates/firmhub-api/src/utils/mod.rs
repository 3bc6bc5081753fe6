pub mod client_ip;
pub mod pagination;
pub mod upload;
