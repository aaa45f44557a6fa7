//! Stateless table repositories. Each method takes a `&Connection`, so the
//! caller decides the transaction scope.

pub mod characters;
pub mod history;
pub mod points;

pub use characters::CharacterRepo;
pub use history::HistoryRepo;
pub use points::PointRepo;
