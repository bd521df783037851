//! ReAct 文本协议：标记常量与 Prompt 渲染
//!
//! 模型每一步输出 `Thought: ... Action: <tool> Action Input: <input>`，
//! 或 `Thought: ... Final Answer: <answer>`；循环把工具结果写回为 `Observation: ...`。

use crate::tools::ToolDescription;

pub const THOUGHT: &str = "Thought:";
pub const ACTION: &str = "Action:";
pub const ACTION_INPUT: &str = "Action Input:";
pub const OBSERVATION: &str = "Observation:";
pub const FINAL_ANSWER: &str = "Final Answer:";

/// 所有标记；用于确定 Action Input 的结束位置
pub const ALL_MARKERS: [&str; 5] = [THOUGHT, ACTION, ACTION_INPUT, OBSERVATION, FINAL_ANSWER];

/// 渲染一次模型调用的 ReAct Prompt：工具目录 + 格式说明 + 问题 + scratchpad
pub fn render_react_prompt(tools: &[ToolDescription], question: &str, scratchpad: &str) -> String {
    let catalogue = if tools.is_empty() {
        "(no tools available)".to_string()
    } else {
        tools
            .iter()
            .map(|t| format!("{}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let names = tools
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Answer the following question as best you can. You have access to the following tools:\n\n\
         {catalogue}\n\n\
         Use the following format:\n\n\
         Question: the input question you must answer\n\
         {THOUGHT} you should always think about what to do\n\
         {ACTION} the action to take, should be one of [{names}]\n\
         {ACTION_INPUT} the input to the action, a JSON object or plain text\n\
         {OBSERVATION} the result of the action\n\
         ... (this Thought/Action/Action Input/Observation can repeat N times)\n\
         {THOUGHT} I now know the final answer\n\
         {FINAL_ANSWER} the final answer to the original input question\n\n\
         Only write one Action per reply and never write the Observation yourself.\n\n\
         Begin!\n\n\
         Question: {question}\n\
         {scratchpad}"
    )
}
