//! Echo 工具（测试与本地演示用）

use async_trait::async_trait;

use crate::tools::{Tool, ToolInput};

/// Echo 工具：回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back (for testing). Input: {\"text\": \"message\"} or plain text"
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, String> {
        let text = input
            .get_str("text")
            .or_else(|| input.get_str("input"))
            .unwrap_or("(empty)");
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_structured_and_text() {
        let out = EchoTool.invoke(ToolInput::parse(r#"{"text": "hi"}"#)).await.unwrap();
        assert_eq!(out, "hi");
        let out = EchoTool.invoke(ToolInput::parse("plain")).await.unwrap();
        assert_eq!(out, "plain");
        let out = EchoTool.invoke(ToolInput::parse(r#"{"other": 1}"#)).await.unwrap();
        assert_eq!(out, "(empty)");
    }
}
