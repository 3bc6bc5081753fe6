mod answer;
mod firm;
mod media;
mod question;
mod taxonomy;

pub use answer::AnswerRepository;
pub use firm::FirmRepository;
pub use media::{MediaRepository, NewMedia};
pub use question::QuestionRepository;
pub use taxonomy::TaxonomyRepository;
