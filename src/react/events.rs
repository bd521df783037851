//! 流式事件：供传输层逐条序列化（NDJSON / SSE）
//!
//! 线上格式为 `{"type": "...", "payload": ...}`；每条流以且仅以一个 complete 或 error 结束。

use serde::{Deserialize, Serialize};

use crate::react::FunctionCall;

/// complete 事件携带的汇总信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSummary {
    /// ReAct 模型调用次数；直接回复为 0
    pub iterations: usize,
    pub function_calls: usize,
    pub chunks: usize,
}

/// 单条流式事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum StreamEvent {
    /// 推理过程（可能为空字符串）
    Thinking(String),
    /// 一次工具调用
    FunctionCall(FunctionCall),
    /// 最终回复的一段
    ResponseChunk(String),
    /// 正常结束
    Complete(CompleteSummary),
    /// 失败结束
    Error(String),
}

impl StreamEvent {
    /// 事件类型名（SSE event 字段等场景使用）
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking(_) => "thinking",
            Self::FunctionCall(_) => "functionCall",
            Self::ResponseChunk(_) => "responseChunk",
            Self::Complete(_) => "complete",
            Self::Error(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[test]
    fn test_wire_format() {
        let chunk = serde_json::to_value(StreamEvent::ResponseChunk("Hello".into())).unwrap();
        assert_eq!(chunk, json!({"type": "responseChunk", "payload": "Hello"}));

        let mut arguments = Map::new();
        arguments.insert("city".into(), json!("Paris"));
        let call = serde_json::to_value(StreamEvent::FunctionCall(FunctionCall {
            name: "weather".into(),
            arguments,
        }))
        .unwrap();
        assert_eq!(
            call,
            json!({"type": "functionCall", "payload": {"name": "weather", "arguments": {"city": "Paris"}}})
        );

        let done = serde_json::to_value(StreamEvent::Complete(CompleteSummary {
            iterations: 2,
            function_calls: 1,
            chunks: 3,
        }))
        .unwrap();
        assert_eq!(
            done,
            json!({"type": "complete", "payload": {"iterations": 2, "functionCalls": 1, "chunks": 3}})
        );
    }

    #[test]
    fn test_event_type_matches_tag() {
        let events = [
            StreamEvent::Thinking(String::new()),
            StreamEvent::ResponseChunk("x".into()),
            StreamEvent::Complete(CompleteSummary::default()),
            StreamEvent::Error("boom".into()),
        ];
        for ev in events {
            let value = serde_json::to_value(&ev).unwrap();
            assert_eq!(value["type"], ev.event_type());
        }
        assert!(StreamEvent::Error("x".into()).is_terminal());
        assert!(!StreamEvent::Thinking("x".into()).is_terminal());
    }
}
