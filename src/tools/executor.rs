//! 工具执行器
//!
//! 持有只读 ToolRegistry 与全局超时，execute(tool_name, input) 在超时内调用工具，
//! 未知工具 / 失败 / 超时转为 AgentError；每次调用输出结构化审计日志（JSON）。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{ToolInput, ToolRegistry};

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 执行指定工具；未知返回 UnknownTool，超时返回 ToolTimeout，工具返回 Err 则转为 ToolExecutionFailed
    pub async fn execute(&self, tool_name: &str, input: ToolInput) -> Result<String, AgentError> {
        let tool = self
            .registry
            .lookup(tool_name)
            .ok_or_else(|| AgentError::UnknownTool(tool_name.to_string()))?;

        let start = Instant::now();
        let input_preview = input_preview(&input);
        // 工具 panic 与普通失败同样处理，不能带崩整个会话
        let result = timeout(
            self.timeout,
            AssertUnwindSafe(tool.invoke(input)).catch_unwind(),
        )
        .await
        .map(|invoked| {
            invoked.unwrap_or_else(|payload| {
                Err(format!("tool panicked: {}", AgentError::panic_message(payload.as_ref())))
            })
        });

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "input_preview": input_preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(e)),
            Err(_) => Err(AgentError::ToolTimeout(tool_name.to_string())),
        }
    }
}

fn input_preview(input: &ToolInput) -> String {
    let s = serde_json::to_string(input).unwrap_or_default();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, Tool};
    use async_trait::async_trait;

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        async fn invoke(&self, _input: ToolInput) -> Result<String, String> {
            Err("service unavailable".to_string())
        }
    }

    struct Exploding;

    #[async_trait]
    impl Tool for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn description(&self) -> &str {
            "panics"
        }

        async fn invoke(&self, _input: ToolInput) -> Result<String, String> {
            panic!("weather api exploded")
        }
    }

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        async fn invoke(&self, _input: ToolInput) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("late".to_string())
        }
    }

    fn executor() -> ToolExecutor {
        let registry = ToolRegistry::builder()
            .register(EchoTool)
            .register(Failing)
            .register(Slow)
            .register(Exploding)
            .build()
            .unwrap();
        ToolExecutor::new(Arc::new(registry), 1)
    }

    #[tokio::test]
    async fn test_execute_ok() {
        let out = executor()
            .execute("echo", ToolInput::Text("hello".into()))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_execute_unknown_and_failure() {
        let exec = executor();
        let err = exec.execute("fly", ToolInput::Text(String::new())).await;
        assert!(matches!(err, Err(AgentError::UnknownTool(name)) if name == "fly"));
        let err = exec.execute("failing", ToolInput::Text(String::new())).await;
        assert!(matches!(err, Err(AgentError::ToolExecutionFailed(msg)) if msg == "service unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_timeout() {
        let err = executor().execute("slow", ToolInput::Text(String::new())).await;
        assert!(matches!(err, Err(AgentError::ToolTimeout(name)) if name == "slow"));
    }

    #[tokio::test]
    async fn test_execute_panic_becomes_failure() {
        let exec = executor();
        let err = exec.execute("exploding", ToolInput::Text(String::new())).await;
        assert!(matches!(
            err,
            Err(AgentError::ToolExecutionFailed(msg)) if msg == "tool panicked: weather api exploded"
        ));
        // 执行器在 panic 之后仍然可用
        let out = exec.execute("echo", ToolInput::Text("still here".into())).await.unwrap();
        assert_eq!(out, "still here");
    }
}
