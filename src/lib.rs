//! Orchestra - 对话式编排智能体
//!
//! 模块划分：
//! - **agent**: 编排会话（同步 / 流式查询入口）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / 提供方工厂 / Mock）
//! - **memory**: 对话状态
//! - **observability**: 日志初始化
//! - **prompts**: 系统提示词与查询模板
//! - **react**: ReAct 主循环、轨迹解析、流式事件转译
//! - **tools**: 工具注册表与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompts;
pub mod react;
pub mod tools;

pub use agent::{AgentResponse, Session, SessionOptions};
pub use crate::core::AgentError;
