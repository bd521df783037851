//! 模型提供方工厂（均为 OpenAI 兼容格式）
//!
//! - openai:   gpt-4o，`OPENAI_API_KEY`
//! - gemini:   gemini-1.5-flash，`GEMINI_API_KEY`，走 Google 的 OpenAI 兼容端点
//! - deepseek: deepseek-r1-distill-llama-70b，`GROQ_API_KEY`，经 Groq 提供

use std::sync::Arc;

use crate::config::LlmSection;
use crate::llm::{LlmClient, LlmError, OpenAiClient};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// 支持的提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
    DeepSeek,
}

impl Provider {
    /// 按名称解析（大小写不敏感）
    pub fn parse(name: &str) -> Result<Self, LlmError> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "gemini" => Ok(Provider::Gemini),
            "deepseek" => Ok(Provider::DeepSeek),
            _ => Err(LlmError::UnsupportedProvider(name.to_string())),
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Gemini => "gemini-1.5-flash",
            Provider::DeepSeek => "deepseek-r1-distill-llama-70b",
        }
    }

    pub fn api_key_env(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::DeepSeek => "GROQ_API_KEY",
        }
    }

    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => None,
            Provider::Gemini => Some(GEMINI_BASE_URL),
            Provider::DeepSeek => Some(GROQ_BASE_URL),
        }
    }
}

/// 根据 [llm] 配置创建客户端
///
/// API Key 优先取配置，其次取提供方对应的环境变量；都没有时报错而不是使用占位 Key。
pub fn create_llm_from_config(cfg: &LlmSection) -> Result<Arc<dyn LlmClient>, LlmError> {
    let provider = Provider::parse(&cfg.provider)?;
    let api_key = cfg
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(provider.api_key_env()).ok())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| LlmError::MissingApiKey(provider.api_key_env().to_string()))?;

    let model = cfg.model.as_deref().unwrap_or(provider.default_model());
    let base_url = cfg.base_url.as_deref().or(provider.default_base_url());

    tracing::info!(?provider, model, "LLM client created");
    Ok(Arc::new(
        OpenAiClient::new(base_url, model, &api_key).with_temperature(cfg.temperature),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Provider::parse("OpenAI").unwrap(), Provider::OpenAi);
        assert_eq!(Provider::parse(" gemini ").unwrap(), Provider::Gemini);
        assert_eq!(Provider::parse("DEEPSEEK").unwrap(), Provider::DeepSeek);
    }

    #[test]
    fn test_unsupported_provider() {
        let err = Provider::parse("claude").unwrap_err();
        assert_eq!(err, LlmError::UnsupportedProvider("claude".to_string()));
    }

    #[test]
    fn test_provider_defaults() {
        assert_eq!(Provider::DeepSeek.default_model(), "deepseek-r1-distill-llama-70b");
        assert_eq!(Provider::DeepSeek.default_base_url(), Some(GROQ_BASE_URL));
        assert_eq!(Provider::OpenAi.default_base_url(), None);
        assert_eq!(Provider::Gemini.api_key_env(), "GEMINI_API_KEY");
    }

    #[test]
    fn test_explicit_key_builds_client() {
        let cfg = LlmSection {
            provider: "openai".to_string(),
            api_key: Some("sk-test".to_string()),
            ..LlmSection::default()
        };
        let client = create_llm_from_config(&cfg).unwrap();
        assert!(client.supports_streaming());
    }
}
