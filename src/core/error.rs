//! Agent 错误类型
//!
//! 工具与解析层面的错误在 ReAct 循环内被吸收为 Observation 文本；
//! 只有 LLM 调用失败、取消与构造期错误会以 AgentError 形式上抛给调用方。

use thiserror::Error;

use crate::llm::LlmError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 模型调用失败：对当前查询是致命的
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    /// 违反对话状态不变量（如 system 消息不在首位）
    #[error("Invalid conversation state: {0}")]
    InvalidConversation(String),

    #[error("Cancelled")]
    Cancelled,

    /// 管线内部 panic（模型客户端等），对当前查询是致命的
    #[error("Internal panic: {0}")]
    Panicked(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::ConfigError(e.to_string())
    }
}

impl AgentError {
    /// 把 catch_unwind 得到的 panic 负载转成可读文本
    pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    }

    /// 可在循环内转为 Observation 继续执行的错误
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::ToolExecutionFailed(_)
                | AgentError::ToolTimeout(_)
                | AgentError::UnknownTool(_)
        )
    }
}
