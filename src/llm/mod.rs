pub mod client;
pub mod config;

pub use client::{GeminiClient, LanguageModel, OllamaClient, build_model};
pub use config::{LlmConfig, LlmProvider};
