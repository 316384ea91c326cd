// Library interface for testing

// Declare all modules
pub mod config;
pub mod constants;
pub mod corpus;
pub mod edits;
pub mod export;
pub mod highlight;
pub mod serve;
pub mod slot;
pub mod view;

pub use edits::{AnnotationKind, EditEntry, EditError, EditMap, EditStore};
pub use highlight::render;
