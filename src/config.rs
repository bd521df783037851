//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ORCHESTRA__*` 覆盖（双下划线表示嵌套，如 `ORCHESTRA__LLM__PROVIDER=gemini`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、系统提示词、对话轮数上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 覆盖默认的编排系统提示词
    pub system_prompt: Option<String>,
    /// 对话历史保留轮数；0 表示不限
    pub max_context_turns: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            system_prompt: None,
            max_context_turns: 20,
        }
    }
}

/// [llm] 段：提供方、模型、端点与温度
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai / gemini / deepseek
    pub provider: String,
    /// 未设置时使用提供方默认模型
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 未设置时读取提供方对应的环境变量
    pub api_key: Option<String>,
    pub temperature: f32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            base_url: None,
            api_key: None,
            temperature: 0.7,
        }
    }
}

/// [agent] 段：是否启用工具、ReAct 步数上限、流式分段大小
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub use_tools: bool,
    /// 单次查询最多调用模型的次数
    pub max_iterations: usize,
    /// 每个 responseChunk 的字符数
    pub chunk_chars: usize,
    /// 事件通道容量
    pub stream_buffer: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            use_tools: true,
            max_iterations: 15,
            chunk_chars: 6,
            stream_buffer: 64,
        }
    }
}

/// [tools] 段：工具调用超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// 从 config 目录加载配置，环境变量 ORCHESTRA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ORCHESTRA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ORCHESTRA")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
