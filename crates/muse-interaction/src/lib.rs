//! Remote generation backend: prompt templates and the OpenAI-compatible client.

pub mod openai_api_backend;
pub mod prompts;

pub use openai_api_backend::OpenAIApiBackend;
pub use prompts::PromptTemplates;
