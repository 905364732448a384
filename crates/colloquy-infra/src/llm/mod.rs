//! Generation backend implementations.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
