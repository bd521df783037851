//! ReAct 主循环
//!
//! Think -> Act (Tool) -> Observe -> 下一轮 Think；每一轮调用一次模型，最多 max_iterations 次。
//! 未知工具、工具失败、格式错误都写成 Observation 继续；只有模型调用失败与取消会中止。

use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::react::parser::clean_name;
use crate::react::prompt::{
    render_react_prompt, ACTION, ACTION_INPUT, ALL_MARKERS, FINAL_ANSWER, OBSERVATION, THOUGHT,
};
use crate::tools::{ToolExecutor, ToolInput};

/// 默认的单次查询最大模型调用次数
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

/// 循环结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 模型给出了 Final Answer
    FinalAnswer,
    /// 达到步数上限，返回的是部分轨迹
    IterationLimit,
}

/// 一次 ReAct 运行的结果
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// 原始轨迹：scratchpad + 最后一步
    pub trace: String,
    /// 实际调用模型的次数
    pub iterations: usize,
    /// 实际执行（或尝试执行）的工具调用次数
    pub tool_calls: usize,
    pub stop: StopReason,
}

/// 单步模型输出的判定
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Action { tool: String, input: String, text: String },
    Final { text: String },
    Invalid { text: String, reason: &'static str },
}

/// ReAct 会话配置
pub struct ReactSession<'a> {
    /// 模型（必需）
    pub llm: &'a dyn LlmClient,
    /// 工具执行器（必需）
    pub executor: &'a ToolExecutor,
    /// 取消令牌（必需）
    pub cancel_token: CancellationToken,
    pub max_iterations: usize,
}

impl<'a> ReactSession<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        executor: &'a ToolExecutor,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            llm,
            executor,
            cancel_token,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// 设置步数上限（至少 1）
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    fn check_cancelled(&self) -> Result<(), AgentError> {
        if self.cancel_token.is_cancelled() {
            Err(AgentError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// 执行 ReAct 循环
///
/// context 为 system + 之前的对话（不含本次问题）；question 是本次提给模型的问题文本。
pub async fn react_loop(
    session: &ReactSession<'_>,
    context: &[Message],
    question: &str,
) -> Result<LoopOutcome, AgentError> {
    let registry = session.executor.registry();
    let tools = registry.describe();
    let mut scratchpad = String::new();
    let mut tool_calls = 0;

    for iteration in 1..=session.max_iterations {
        session.check_cancelled()?;

        let mut messages = context.to_vec();
        messages.push(Message::user(render_react_prompt(&tools, question, &scratchpad)));
        let output = session.llm.complete(&messages).await?;
        // 取消后到达的结果直接丢弃
        session.check_cancelled()?;

        match parse_step(&output) {
            Step::Final { text } => {
                tracing::debug!(iteration, "react final answer");
                scratchpad.push_str(&text);
                return Ok(LoopOutcome {
                    trace: scratchpad,
                    iterations: iteration,
                    tool_calls,
                    stop: StopReason::FinalAnswer,
                });
            }
            Step::Action { tool, input, text } => {
                tracing::debug!(iteration, tool = %tool, "react action");
                tool_calls += 1;
                let observation = if registry.contains(&tool) {
                    match session.executor.execute(&tool, ToolInput::parse(&input)).await {
                        Ok(out) => out,
                        Err(e) => {
                            tracing::warn!(tool = %tool, error = %e, "tool failed, recorded as observation");
                            format!("Error: {e}")
                        }
                    }
                } else {
                    let names: Vec<String> = registry.names().into_iter().collect();
                    tracing::warn!(tool = %tool, "model requested unknown tool");
                    format!("{tool} is not a valid tool, try one of [{}].", names.join(", "))
                };
                session.check_cancelled()?;
                push_step(&mut scratchpad, &text, &observation);
            }
            Step::Invalid { text, reason } => {
                tracing::debug!(iteration, reason, "react step has invalid format");
                push_step(&mut scratchpad, &text, reason);
            }
        }
    }

    tracing::warn!(
        max_iterations = session.max_iterations,
        "react loop stopped at iteration limit"
    );
    Ok(LoopOutcome {
        trace: scratchpad,
        iterations: session.max_iterations,
        tool_calls,
        stop: StopReason::IterationLimit,
    })
}

fn push_step(scratchpad: &mut String, text: &str, observation: &str) {
    scratchpad.push_str(text.trim_end());
    scratchpad.push('\n');
    scratchpad.push_str(OBSERVATION);
    scratchpad.push(' ');
    scratchpad.push_str(observation.trim());
    scratchpad.push('\n');
}

/// 判定单步输出：Action 在 Final Answer 之前则执行 Action，否则 Final；都没有则为格式错误
fn parse_step(output: &str) -> Step {
    let mut text = output.trim().to_string();
    if !ALL_MARKERS.iter().any(|m| text.starts_with(m)) {
        text = format!("{THOUGHT} {text}");
    }
    // Action 之后模型自己编造的 Observation 及之后内容不予记录
    if let Some(pos) = text.find(OBSERVATION) {
        if text[..pos].contains(ACTION) {
            text.truncate(pos);
        }
    }

    let action_pos = text.find(ACTION);
    let final_pos = text.find(FINAL_ANSWER);

    match (action_pos, final_pos) {
        (Some(a), f) if f.map_or(true, |f| a < f) => {
            if let Some(f) = f {
                text.truncate(f);
            }
            let after_action = &text[a + ACTION.len()..];
            let Some(input_rel) = after_action.find(ACTION_INPUT) else {
                return Step::Invalid {
                    text,
                    reason: "Invalid Format: Missing 'Action Input:' after 'Action:'",
                };
            };
            let tool = clean_name(&after_action[..input_rel]);
            let input_start = input_rel + ACTION_INPUT.len();
            let input_area = &after_action[input_start..];
            let input_end = ALL_MARKERS
                .iter()
                .filter_map(|m| input_area.find(m))
                .min()
                .unwrap_or(input_area.len());
            let input = input_area[..input_end].trim().to_string();
            Step::Action { tool, input, text }
        }
        (_, Some(_)) => Step::Final { text },
        _ => Step::Invalid {
            text,
            reason: "Invalid Format: Missing 'Action:' after 'Thought:'",
        },
    }
}
