//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）及提供方工厂

pub mod mock;
pub mod openai;
pub mod providers;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use providers::{create_llm_from_config, Provider};
pub use traits::{LlmClient, LlmError, TokenStream};
