pub mod conduct;
pub mod core;
pub mod seating;
pub mod settings;
pub mod students;
