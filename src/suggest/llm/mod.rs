pub mod assess;
pub mod client;
pub mod fix;
pub mod models;
pub mod parse;
pub mod prompts;

pub use assess::Assessor;
pub use client::{CompletionBackend, HttpBackend};
pub use fix::Applier;
pub use models::{ModelSettings, Provider, Usage};
pub use parse::{extract_code_block, parse_suggestions, ExtractedContent, SchemaError};
