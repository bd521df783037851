//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本依次返回预设回复，并记录每次调用收到的消息，便于断言调用次数与 Prompt 内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{LlmClient, LlmError, TokenStream};
use crate::memory::Message;

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<String>,
    last: Option<String>,
    calls: usize,
    received: Vec<Vec<Message>>,
}

/// Mock 客户端：脚本回放 / 固定失败 / 流式分片
#[derive(Debug, Default)]
pub struct MockLlmClient {
    state: Mutex<MockState>,
    /// 脚本耗尽后是否重复最后一条回复
    repeat_last: bool,
    /// 设置后 complete 永远失败
    failure: Option<LlmError>,
    /// 设置后支持增量输出，complete_stream 依次吐出这些片段
    fragments: Option<Vec<String>>,
}

impl MockLlmClient {
    /// 依次返回 responses，耗尽后报错
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Mutex::new(MockState {
                script: responses.into_iter().map(Into::into).collect(),
                ..MockState::default()
            }),
            ..Self::default()
        }
    }

    /// 每次都返回同一条回复
    pub fn repeating(response: impl Into<String>) -> Self {
        let mut mock = Self::scripted([response]);
        mock.repeat_last = true;
        mock
    }

    /// 每次调用都失败
    pub fn failing(error: LlmError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// 支持增量输出：complete_stream 逐个吐出 fragments，complete 返回拼接结果
    pub fn streaming<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: Some(fragments.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// 已发生的模型调用次数（complete 与 complete_stream 都计入）
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// 每次调用收到的完整消息列表
    pub fn received(&self) -> Vec<Vec<Message>> {
        self.lock().received.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, messages: &[Message]) {
        let mut state = self.lock();
        state.calls += 1;
        state.received.push(messages.to_vec());
    }

    fn next_reply(&self) -> Result<String, LlmError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if let Some(fragments) = &self.fragments {
            return Ok(fragments.concat());
        }
        let mut state = self.lock();
        match state.script.pop_front() {
            Some(reply) => {
                state.last = Some(reply.clone());
                Ok(reply)
            }
            None if self.repeat_last => state
                .last
                .clone()
                .ok_or_else(|| LlmError::ApiError("mock script is empty".to_string())),
            None => Err(LlmError::ApiError("mock script exhausted".to_string())),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.record(messages);
        self.next_reply()
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        self.record(messages);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let items: Vec<Result<String, LlmError>> = match &self.fragments {
            Some(fragments) => fragments.iter().cloned().map(Ok).collect(),
            None => vec![self.next_reply()],
        };
        Ok(Box::pin(stream::iter(items)))
    }

    fn supports_streaming(&self) -> bool {
        self.fragments.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_scripted_replays_in_order_then_errors() {
        let mock = MockLlmClient::scripted(["one", "two"]);
        assert_eq!(mock.complete(&[]).await.unwrap(), "one");
        assert_eq!(mock.complete(&[]).await.unwrap(), "two");
        assert!(mock.complete(&[]).await.is_err());
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_repeating_never_runs_out() {
        let mock = MockLlmClient::repeating("again");
        for _ in 0..5 {
            assert_eq!(mock.complete(&[]).await.unwrap(), "again");
        }
    }

    #[tokio::test]
    async fn test_streaming_yields_fragments() {
        let mock = MockLlmClient::streaming(["Hel", "lo"]);
        assert!(mock.supports_streaming());
        let stream = mock.complete_stream(&[Message::user("hi")]).await.unwrap();
        let parts: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(parts, vec!["Hel", "lo"]);
        assert_eq!(mock.received()[0][0].content, "hi");
    }
}
