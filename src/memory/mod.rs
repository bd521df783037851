//! 记忆层：会话内对话状态

pub mod conversation;

pub use conversation::{ConversationState, Message, Role};
