mod adapter;

pub use adapter::{OpenAiAdapter, OpenAiConfig, DEFAULT_OPENAI_BASE};
