pub mod aligner;
pub mod config;
pub mod document;
pub mod element_finder;
pub mod engine;
pub mod extractors;
pub mod highlight;
pub mod models;
pub mod selector;
pub mod utils;

// Re-export commonly used types
pub use aligner::{ChildMatchAligner, ChildReference};
pub use config::AppConfig;
pub use document::{ElementDescription, Fragment, LiveDocument};
pub use element_finder::{MatchResolver, MatchResult, ReferenceShape};
pub use engine::ScrapingEngine;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
