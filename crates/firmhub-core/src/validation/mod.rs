//! Validation modules

pub mod answers;
pub mod ordering;
pub mod questions;
pub mod schema;

pub use answers::{missing_required_questions, validate_answers};
pub use ordering::{check_contiguous, order_error, validate_reorder};
pub use questions::validate_question_input;
pub use schema::{compile_schema, schema_violations};
