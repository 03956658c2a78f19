pub mod clock;
pub mod entities;
pub mod heuristics;
pub mod inspector;
pub mod sanitizer;
pub mod use_cases;
