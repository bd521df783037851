//! 轨迹解析：把一次 ReAct 运行的原始文本拆成 thinking / response / function_calls
//!
//! 单次前向扫描，歧义时以最后一次出现为准；永不失败，最差退化为「整段文本即回复」。

use serde::Serialize;
use serde_json::{Map, Value};

use crate::react::prompt::{ACTION, ACTION_INPUT, ALL_MARKERS, FINAL_ANSWER, THOUGHT};
use crate::tools::ToolInput;

/// 一次工具调用（按出现顺序）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// 结构化输出
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedOutput {
    pub thinking: String,
    pub response: String,
    pub function_calls: Vec<FunctionCall>,
}

/// 解析原始轨迹
pub fn parse_trace(raw: &str) -> ParsedOutput {
    ParsedOutput {
        thinking: extract_thinking(raw),
        response: extract_response(raw),
        function_calls: extract_function_calls(raw),
    }
}

/// 最后一个 Final Answer 之后的文本；没有则整段原文
fn extract_response(raw: &str) -> String {
    match raw.rfind(FINAL_ANSWER) {
        Some(pos) => raw[pos + FINAL_ANSWER.len()..].trim().to_string(),
        None => raw.to_string(),
    }
}

/// 最后一个 Thought 之后的文本，截断到其后的第一个 Action，否则截断到 Final Answer
fn extract_thinking(raw: &str) -> String {
    let Some(pos) = raw.rfind(THOUGHT) else {
        return String::new();
    };
    let after = &raw[pos + THOUGHT.len()..];
    let end = after
        .find(ACTION)
        .or_else(|| after.find(FINAL_ANSWER))
        .unwrap_or(after.len());
    after[..end].trim().to_string()
}

/// 按文档顺序提取每一对 Action / Action Input
fn extract_function_calls(raw: &str) -> Vec<FunctionCall> {
    let mut calls = Vec::new();
    let mut cursor = 0;

    while let Some(found) = raw[cursor..].find(ACTION) {
        let name_start = cursor + found + ACTION.len();
        let rest = &raw[name_start..];

        // 名称到 Action Input 为止；若先遇到下一个 Action 则这一对不完整
        let Some(input_marker) = rest.find(ACTION_INPUT) else {
            break;
        };
        if rest[..input_marker].contains(ACTION) {
            cursor = name_start;
            continue;
        }

        let input_start = name_start + input_marker + ACTION_INPUT.len();
        let input_end = input_start + next_marker(&raw[input_start..]).unwrap_or(raw.len() - input_start);
        cursor = input_end;

        let name = clean_name(&rest[..input_marker]);
        if name.is_empty() {
            continue;
        }
        calls.push(FunctionCall {
            name,
            arguments: ToolInput::parse(&raw[input_start..input_end]).into_arguments(),
        });
    }
    calls
}

/// 最近的任意标记位置
fn next_marker(text: &str) -> Option<usize> {
    ALL_MARKERS.iter().filter_map(|m| text.find(m)).min()
}

pub(crate) fn clean_name(text: &str) -> String {
    text.trim().trim_matches('`').trim().to_string()
}
