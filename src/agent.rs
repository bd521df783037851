//! 编排会话（Session）
//!
//! 一个 Session 独占一份对话状态，持有模型、工具执行器与管线配置：
//! process_query 走同步路径返回完整结果，respond_stream / stream_query 走流式路径。
//! 工具模式下：ReAct 循环 -> 轨迹解析 -> 写入 assistant -> 转译事件；
//! 直连模式下：模型直接回复（支持增量输出时逐片转发）。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{AgentSection, AppConfig};
use crate::core::AgentError;
use crate::llm::{create_llm_from_config, LlmClient};
use crate::memory::{ConversationState, Message};
use crate::prompts::{load_prompt, render_template, DEFAULT_SYSTEM_PROMPT};
use crate::react::{
    parse_trace, react_loop, EventStream, FunctionCall, LoopOutcome, ParsedOutput, ReactSession,
    StopReason, StreamTranspiler, DEFAULT_MAX_ITERATIONS,
};
use crate::tools::{ToolExecutor, ToolRegistry};

/// 同步调用的返回：`{response, thinking?, functionCalls?}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_calls: Option<Vec<FunctionCall>>,
}

impl AgentResponse {
    fn plain(response: String) -> Self {
        Self {
            response,
            thinking: None,
            function_calls: None,
        }
    }
}

impl From<ParsedOutput> for AgentResponse {
    fn from(parsed: ParsedOutput) -> Self {
        Self {
            response: parsed.response,
            thinking: Some(parsed.thinking),
            function_calls: Some(parsed.function_calls),
        }
    }
}

/// 管线配置
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub use_tools: bool,
    pub max_iterations: usize,
    pub chunk_chars: usize,
    pub stream_buffer: usize,
    pub tool_timeout_secs: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            use_tools: true,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            chunk_chars: crate::react::transpiler::DEFAULT_CHUNK_CHARS,
            stream_buffer: 64,
            tool_timeout_secs: 30,
        }
    }
}

impl From<&AgentSection> for SessionOptions {
    fn from(agent: &AgentSection) -> Self {
        Self {
            use_tools: agent.use_tools,
            max_iterations: agent.max_iterations,
            chunk_chars: agent.chunk_chars,
            stream_buffer: agent.stream_buffer,
            ..Self::default()
        }
    }
}

/// 单个编排会话
pub struct Session {
    id: String,
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    conversation: ConversationState,
    options: SessionOptions,
    /// 只作用于发给模型的问题文本，历史中保存原始查询
    query_template: Option<String>,
}

impl Session {
    /// system_prompt 为 None 时使用默认编排提示词
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        system_prompt: Option<&str>,
    ) -> Self {
        Self::with_options(llm, registry, system_prompt, SessionOptions::default())
    }

    pub fn with_options(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        system_prompt: Option<&str>,
        options: SessionOptions,
    ) -> Self {
        let id = format!("session_{}", uuid::Uuid::new_v4());
        tracing::debug!(session = %id, use_tools = options.use_tools, "session created");
        Self {
            id,
            llm,
            executor: ToolExecutor::new(registry, options.tool_timeout_secs),
            conversation: ConversationState::with_system(
                system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT),
            ),
            options,
            query_template: None,
        }
    }

    /// 按配置创建：模型来自 [llm]，系统提示词来自 [app] 或 config/prompts/system.txt
    pub fn from_config(cfg: &AppConfig, registry: Arc<ToolRegistry>) -> Result<Self, AgentError> {
        let llm = create_llm_from_config(&cfg.llm)?;
        Ok(Self::from_config_with_llm(cfg, llm, registry))
    }

    /// 按配置创建，但使用外部提供的模型（测试中注入 Mock）
    pub fn from_config_with_llm(
        cfg: &AppConfig,
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        let system_prompt = cfg
            .app
            .system_prompt
            .clone()
            .unwrap_or_else(|| load_prompt("system", DEFAULT_SYSTEM_PROMPT));
        let options = SessionOptions {
            tool_timeout_secs: cfg.tools.tool_timeout_secs,
            ..SessionOptions::from(&cfg.agent)
        };
        Self::with_options(llm, registry, Some(&system_prompt), options)
            .with_max_context_turns(cfg.app.max_context_turns)
    }

    /// 对话窗口轮数；0 表示不限
    pub fn with_max_context_turns(mut self, max_turns: usize) -> Self {
        self.conversation = self.conversation.with_max_turns(max_turns);
        self
    }

    /// 设置查询模板（含 `{user_query}` 占位符）
    pub fn with_query_template(mut self, template: impl Into<String>) -> Self {
        self.query_template = Some(template.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn history(&self) -> Vec<Message> {
        self.conversation.history()
    }

    /// 清空对话（保留 system）
    pub fn reset(&mut self) {
        self.conversation.reset();
        tracing::info!(session = %self.id, "conversation reset");
    }

    /// 同步路径：返回完整的结构化或纯文本结果
    pub async fn process_query(&mut self, query: &str) -> Result<AgentResponse, AgentError> {
        let started = Instant::now();
        tracing::info!(session = %self.id, use_tools = self.options.use_tools, "query received");
        self.conversation.append_user(query);
        let model_query = self.model_query(query);

        let response = if self.options.use_tools {
            let outcome = self.run_react(&model_query, CancellationToken::new()).await?;
            let parsed = parse_trace(&outcome.trace);
            self.conversation.append_assistant(parsed.response.clone());
            AgentResponse::from(parsed)
        } else {
            let messages = self.model_messages(&model_query);
            let text = self.llm.complete(&messages).await?;
            self.conversation.append_assistant(text.clone());
            AgentResponse::plain(text)
        };

        tracing::info!(
            session = %self.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query answered"
        );
        Ok(response)
    }

    /// 流式路径：事件写入 out，保证以恰好一个 complete 或 error 结束
    ///
    /// 消费者断开返回 Cancelled（不再发送任何事件）；已写入的 user / assistant 消息保留。
    pub async fn respond_stream(
        &mut self,
        query: &str,
        out: &mut StreamTranspiler,
    ) -> Result<(), AgentError> {
        let result = self.stream_inner(query, out).await;
        match &result {
            Ok(()) => tracing::info!(session = %self.id, "stream completed"),
            Err(AgentError::Cancelled) => {
                tracing::info!(session = %self.id, "stream cancelled by consumer")
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "stream failed");
                out.fail(e).await;
            }
        }
        result
    }

    /// 把会话移入后台任务执行一次流式查询；任务结束后交还 Session
    ///
    /// 管线内 panic 会被捕获并以一个 error 事件结束流，Session 照常交还。
    pub fn stream_query(self, query: impl Into<String>) -> (EventStream, JoinHandle<Session>) {
        let query = query.into();
        let (mut out, events) =
            StreamTranspiler::channel(self.options.chunk_chars, self.options.stream_buffer);
        let handle = tokio::spawn(async move {
            let mut session = self;
            let run = AssertUnwindSafe(session.respond_stream(&query, &mut out))
                .catch_unwind()
                .await;
            if let Err(payload) = run {
                let err = AgentError::Panicked(AgentError::panic_message(payload.as_ref()));
                tracing::error!(session = %session.id, error = %err, "stream pipeline panicked");
                out.fail(&err).await;
            }
            session
        });
        (events, handle)
    }

    async fn stream_inner(
        &mut self,
        query: &str,
        out: &mut StreamTranspiler,
    ) -> Result<(), AgentError> {
        tracing::info!(session = %self.id, use_tools = self.options.use_tools, "stream query received");
        self.conversation.append_user(query);
        let model_query = self.model_query(query);

        if self.options.use_tools {
            let outcome = self.run_react(&model_query, out.cancel_token()).await?;
            let parsed = parse_trace(&outcome.trace);
            self.conversation.append_assistant(parsed.response.clone());
            return out.structured(&parsed, outcome.iterations).await;
        }

        let messages = self.model_messages(&model_query);
        if self.llm.supports_streaming() {
            let tokens = self.llm.complete_stream(&messages).await?;
            let text = out.tokens(tokens).await?;
            self.conversation.append_assistant(text);
            Ok(())
        } else {
            let text = self.llm.complete(&messages).await?;
            if out.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            self.conversation.append_assistant(text.clone());
            out.plain(&text).await
        }
    }

    async fn run_react(
        &self,
        question: &str,
        cancel_token: CancellationToken,
    ) -> Result<LoopOutcome, AgentError> {
        // 本次问题已在历史末尾，ReAct Prompt 中另行给出
        let messages = self.conversation.messages();
        let context = &messages[..messages.len().saturating_sub(1)];
        let react = ReactSession::new(self.llm.as_ref(), &self.executor, cancel_token)
            .with_max_iterations(self.options.max_iterations);
        let outcome = react_loop(&react, context, question).await?;
        if outcome.stop == StopReason::IterationLimit {
            tracing::warn!(session = %self.id, iterations = outcome.iterations, "answer built from partial trace");
        }
        tracing::debug!(
            session = %self.id,
            iterations = outcome.iterations,
            tool_calls = outcome.tool_calls,
            "react finished"
        );
        Ok(outcome)
    }

    fn model_query(&self, query: &str) -> String {
        match &self.query_template {
            Some(template) => render_template(template, query),
            None => query.to_string(),
        }
    }

    /// 直连模式发给模型的消息：历史副本，最后一条 user 换成模板化后的文本
    fn model_messages(&self, model_query: &str) -> Vec<Message> {
        let mut messages = self.conversation.history();
        if let Some(last) = messages.last_mut() {
            last.content = model_query.to_string();
        }
        messages
    }
}
