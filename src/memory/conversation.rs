//! 短期记忆：对话状态
//!
//! 一个会话独占一份有序的消息历史。system 消息至多一条且只能在首位；
//! 可选的轮数窗口只丢弃最旧的非 system 消息，不会改变已有消息的相对顺序。

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 单条消息（一个 Turn）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 对话状态：有序 Turn 序列 + 可选轮数窗口
#[derive(Clone, Debug, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    /// 保留的最大轮数（每轮 user + assistant）；None 表示不限
    max_turns: Option<usize>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以 system 提示词开始的对话
    pub fn with_system(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            max_turns: None,
        }
    }

    /// 设置轮数窗口；0 表示不限
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = (max_turns > 0).then_some(max_turns);
        self.prune();
        self
    }

    /// 追加 system 消息：只允许一次，且必须在任何其他消息之前
    pub fn append_system(&mut self, content: impl Into<String>) -> Result<(), AgentError> {
        if !self.messages.is_empty() {
            return Err(AgentError::InvalidConversation(
                "system turn must be the first and only system turn".to_string(),
            ));
        }
        self.messages.push(Message::system(content));
        Ok(())
    }

    pub fn append_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
        self.prune();
    }

    pub fn append_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
        self.prune();
    }

    /// 有序历史的副本；调用方修改副本不影响会话
    pub fn history(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// 清空除 system 以外的所有消息（幂等）
    pub fn reset(&mut self) {
        self.messages.retain(|m| m.role == Role::System);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 超出 max_turns*2 条非 system 消息时丢弃最旧的部分；不留下开头孤立的 assistant
    fn prune(&mut self) {
        let Some(max_turns) = self.max_turns else {
            return;
        };
        let offset = usize::from(self.system_prompt().is_some());
        let keep = max_turns * 2;
        let turns = self.messages.len() - offset;
        if turns <= keep {
            return;
        }
        let mut end = offset + (turns - keep);
        while self
            .messages
            .get(end)
            .is_some_and(|m| m.role == Role::Assistant)
        {
            end += 1;
        }
        self.messages.drain(offset..end);
    }
}
