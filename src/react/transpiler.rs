//! 流式转译：把结构化输出或纯文本回复转成有序的 StreamEvent 序列
//!
//! 只负责顺序与完整性：所有 responseChunk 按发送顺序拼接即为完整回复，
//! 每条流以恰好一个 complete 或 error 结束。消费者断开后停止发送并触发取消令牌。

use std::pin::Pin;

use futures_util::{stream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::TokenStream;
use crate::react::events::{CompleteSummary, StreamEvent};
use crate::react::ParsedOutput;

/// 默认每段字符数
pub const DEFAULT_CHUNK_CHARS: usize = 6;

/// 消费端：有限、不可重启，拉取到 complete / error 后结束
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// 按字符数切分，保证拼接后与原文逐字节一致；空文本不产生分段
pub fn chunk_text(text: &str, chunk_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// 结构化输出对应的事件（不含终止事件）：thinking -> functionCall* -> responseChunk*
pub fn structured_events(parsed: &ParsedOutput, chunk_chars: usize) -> Vec<StreamEvent> {
    let mut events = Vec::with_capacity(1 + parsed.function_calls.len());
    events.push(StreamEvent::Thinking(parsed.thinking.clone()));
    events.extend(parsed.function_calls.iter().cloned().map(StreamEvent::FunctionCall));
    events.extend(
        chunk_text(&parsed.response, chunk_chars)
            .into_iter()
            .map(StreamEvent::ResponseChunk),
    );
    events
}

/// 发送端
pub struct StreamTranspiler {
    tx: mpsc::Sender<StreamEvent>,
    chunk_chars: usize,
    chunks: usize,
    finished: bool,
    cancel_token: CancellationToken,
    watcher: JoinHandle<()>,
}

impl StreamTranspiler {
    /// 创建一对发送端 / 事件流；需在 tokio runtime 内调用（会启动断线监视任务）
    pub fn channel(chunk_chars: usize, buffer: usize) -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel::<StreamEvent>(buffer.max(1));
        let cancel_token = CancellationToken::new();

        let watch_tx = tx.clone();
        let token = cancel_token.clone();
        let watcher = tokio::spawn(async move {
            watch_tx.closed().await;
            token.cancel();
        });

        let events = stream::unfold((rx, false), |(mut rx, done)| async move {
            if done {
                return None;
            }
            let event = rx.recv().await?;
            let terminal = event.is_terminal();
            Some((event, (rx, terminal)))
        });

        let transpiler = Self {
            tx,
            chunk_chars: chunk_chars.max(1),
            chunks: 0,
            finished: false,
            cancel_token,
            watcher,
        };
        (transpiler, Box::pin(events))
    }

    /// 消费者断开时被取消的令牌，交给 ReAct 循环
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 发送结构化输出并以 complete 结束
    pub async fn structured(
        &mut self,
        parsed: &ParsedOutput,
        iterations: usize,
    ) -> Result<(), AgentError> {
        for event in structured_events(parsed, self.chunk_chars) {
            self.send(event).await?;
        }
        self.complete(iterations, parsed.function_calls.len()).await
    }

    /// 发送一次性得到的纯文本回复（分段）并以 complete 结束
    pub async fn plain(&mut self, text: &str) -> Result<(), AgentError> {
        for chunk in chunk_text(text, self.chunk_chars) {
            self.send(StreamEvent::ResponseChunk(chunk)).await?;
        }
        self.complete(0, 0).await
    }

    /// 逐个转发模型增量 Token（不缓冲），成功后发送 complete 并返回完整文本
    ///
    /// Token 流出错时返回 Err 且不发送终止事件，由调用方 fail。
    pub async fn tokens(&mut self, mut tokens: TokenStream) -> Result<String, AgentError> {
        let mut full = String::new();
        while let Some(token) = tokens.next().await {
            let token = token?;
            if token.is_empty() {
                continue;
            }
            full.push_str(&token);
            self.send(StreamEvent::ResponseChunk(token)).await?;
        }
        self.complete(0, 0).await?;
        Ok(full)
    }

    /// 以 error 结束；已结束或已断开时不再发送
    pub async fn fail(&mut self, error: &AgentError) {
        if self.finished {
            return;
        }
        let _ = self.send(StreamEvent::Error(error.to_string())).await;
    }

    async fn complete(&mut self, iterations: usize, function_calls: usize) -> Result<(), AgentError> {
        let summary = CompleteSummary {
            iterations,
            function_calls,
            chunks: self.chunks,
        };
        self.send(StreamEvent::Complete(summary)).await
    }

    async fn send(&mut self, event: StreamEvent) -> Result<(), AgentError> {
        if self.finished {
            tracing::debug!(event = event.event_type(), "stream already finished, event dropped");
            return Ok(());
        }
        let terminal = event.is_terminal();
        let is_chunk = matches!(event, StreamEvent::ResponseChunk(_));
        if self.tx.send(event).await.is_err() {
            self.finished = true;
            self.cancel_token.cancel();
            tracing::info!("stream consumer disconnected");
            return Err(AgentError::Cancelled);
        }
        if is_chunk {
            self.chunks += 1;
        }
        self.finished = terminal;
        Ok(())
    }
}

impl Drop for StreamTranspiler {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::react::{parse_trace, FunctionCall};
    use serde_json::Map;

    fn chunks_of(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ResponseChunk(c) => Some(c.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_chunk_text_hello_world() {
        assert_eq!(chunk_text("Hello world", 5), vec!["Hello", " worl", "d"]);
        assert!(chunk_text("", 5).is_empty());
    }

    #[test]
    fn test_chunk_text_preserves_multibyte() {
        let text = "天气晴朗，18°C 🌤 in Paris";
        for size in 1..8 {
            assert_eq!(chunk_text(text, size).concat(), text);
        }
    }

    #[test]
    fn test_structured_events_order() {
        let parsed = ParsedOutput {
            thinking: String::new(),
            response: "abcdefg".into(),
            function_calls: vec![
                FunctionCall { name: "a".into(), arguments: Map::new() },
                FunctionCall { name: "b".into(), arguments: Map::new() },
            ],
        };
        let events = structured_events(&parsed, 3);
        assert_eq!(events[0], StreamEvent::Thinking(String::new()));
        assert!(matches!(&events[1], StreamEvent::FunctionCall(c) if c.name == "a"));
        assert!(matches!(&events[2], StreamEvent::FunctionCall(c) if c.name == "b"));
        assert_eq!(chunks_of(&events), "abcdefg");
        assert_eq!(events.len(), 6);
    }

    #[tokio::test]
    async fn test_plain_hello_world_then_complete() {
        let (mut tx, rx) = StreamTranspiler::channel(5, 16);
        tx.plain("Hello world").await.unwrap();
        let events: Vec<StreamEvent> = rx.collect().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::ResponseChunk("Hello".into()),
                StreamEvent::ResponseChunk(" worl".into()),
                StreamEvent::ResponseChunk("d".into()),
                StreamEvent::Complete(CompleteSummary { iterations: 0, function_calls: 0, chunks: 3 }),
            ]
        );
    }

    #[tokio::test]
    async fn test_structured_stream_reconstructs_response() {
        let parsed = parse_trace(
            "Thought: check\nAction: weather\nAction Input: {\"city\":\"Paris\"}\nObservation: 18C\nThought: done\nFinal Answer: It is 18C in Paris.",
        );
        let (mut tx, rx) = StreamTranspiler::channel(4, 64);
        tx.structured(&parsed, 2).await.unwrap();
        let events: Vec<StreamEvent> = rx.collect().await;
        assert_eq!(events[0], StreamEvent::Thinking("done".into()));
        assert_eq!(chunks_of(&events), "It is 18C in Paris.");
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(matches!(events.last(), Some(StreamEvent::Complete(s)) if s.iterations == 2 && s.function_calls == 1));
    }

    #[tokio::test]
    async fn test_tokens_forwarded_as_they_arrive() {
        let tokens: TokenStream = Box::pin(stream::iter(vec![
            Ok("Hel".to_string()),
            Ok(String::new()),
            Ok("lo".to_string()),
        ]));
        let (mut tx, rx) = StreamTranspiler::channel(6, 16);
        let full = tx.tokens(tokens).await.unwrap();
        assert_eq!(full, "Hello");
        let events: Vec<StreamEvent> = rx.collect().await;
        assert_eq!(events[0], StreamEvent::ResponseChunk("Hel".into()));
        assert_eq!(events[1], StreamEvent::ResponseChunk("lo".into()));
        assert!(matches!(events[2], StreamEvent::Complete(_)));
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_token_error_yields_single_error_event() {
        let tokens: TokenStream = Box::pin(stream::iter(vec![
            Ok("partial".to_string()),
            Err(LlmError::Stream("reset".into())),
        ]));
        let (mut tx, rx) = StreamTranspiler::channel(6, 16);
        let err = tx.tokens(tokens).await.unwrap_err();
        tx.fail(&err).await;
        tx.fail(&err).await;
        let events: Vec<StreamEvent> = rx.collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], StreamEvent::Error(msg) if msg.contains("reset")));
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Complete(_))));
    }

    #[tokio::test]
    async fn test_nothing_after_terminal() {
        let (mut tx, rx) = StreamTranspiler::channel(6, 16);
        tx.plain("hi").await.unwrap();
        tx.fail(&AgentError::Cancelled).await;
        assert!(tx.plain("again").await.is_ok());
        drop(tx);
        let events: Vec<StreamEvent> = rx.collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], StreamEvent::Complete(_)));
    }

    #[tokio::test]
    async fn test_disconnect_cancels() {
        let (mut tx, rx) = StreamTranspiler::channel(1, 1);
        let token = tx.cancel_token();
        drop(rx);
        let err = tx.plain("abc").await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert!(token.is_cancelled());
    }
}
