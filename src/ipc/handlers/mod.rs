pub mod analytics;
pub mod classes;
pub mod core;
pub mod exams;
pub mod export;
pub mod import;
pub mod maintenance;
pub mod scores;
pub mod students;
