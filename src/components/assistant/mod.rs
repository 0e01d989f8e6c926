pub mod dispatcher;
pub mod extractor;
pub mod llm;
pub mod models;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use extractor::IntentExtractor;
pub use llm::{GeminiModel, LanguageModel};
pub use models::{Intent, IntentAction, ModelIntent};
