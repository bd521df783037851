//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / invoke），由 ToolRegistry 按名查找。
//! 注册表在构造后只读，通过 Arc 在会话内共享，因此天然线程安全。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::AgentError;

/// 工具输入：结构化键值或单个原始字符串
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolInput {
    Structured(Map<String, Value>),
    Text(String),
}

impl ToolInput {
    /// 若文本是 JSON 对象（允许包在 ``` 代码块里）则解析为键值，否则原样作为字符串；从不失败
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match serde_json::from_str::<Value>(strip_code_fence(trimmed)) {
            Ok(Value::Object(map)) => ToolInput::Structured(map),
            _ => ToolInput::Text(trimmed.to_string()),
        }
    }

    /// 取某个字符串字段；Text 输入视为唯一字段
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self {
            ToolInput::Structured(map) => map.get(key).and_then(Value::as_str),
            ToolInput::Text(text) => Some(text.as_str()),
        }
    }

    /// 转为函数调用参数：原始字符串包成 {"input": raw}
    pub fn into_arguments(self) -> Map<String, Value> {
        match self {
            ToolInput::Structured(map) => map,
            ToolInput::Text(text) => {
                let mut map = Map::new();
                map.insert("input".to_string(), Value::String(text));
                map
            }
        }
    }
}

/// 去掉 ```json ... ``` 包裹
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// 工具 trait：名称、描述（供 LLM 理解）、异步执行
///
/// 正常的失败应返回 Err(描述)，由 ReAct 循环写成 Observation 后继续。
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（Action 行中使用的名字）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 执行工具
    async fn invoke(&self, input: ToolInput) -> Result<String, String>;
}

/// 注入 Prompt 的工具描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
}

/// 工具注册表：保持注册顺序，名称唯一
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// 从固定列表构造；重名返回 DuplicateTool
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self, AgentError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            if index.insert(tool.name().to_string(), i).is_some() {
                return Err(AgentError::DuplicateTool(tool.name().to_string()));
            }
        }
        Ok(Self { tools, index })
    }

    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 按注册顺序返回 (name, description)，用于生成 Prompt 中的工具目录
    pub fn describe(&self) -> Vec<ToolDescription> {
        self.tools
            .iter()
            .map(|tool| ToolDescription {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
            })
            .collect()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.index.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// 构造期使用的可变 builder
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn register_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn build(self) -> Result<ToolRegistry, AgentError> {
        ToolRegistry::new(self.tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "named test tool"
        }

        async fn invoke(&self, _input: ToolInput) -> Result<String, String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_describe_keeps_registration_order() {
        let registry = ToolRegistry::builder()
            .register(Named("weather"))
            .register(Named("time"))
            .register(Named("city_facts"))
            .build()
            .unwrap();
        let names: Vec<String> = registry.describe().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["weather", "time", "city_facts"]);
        assert_eq!(registry.names().len(), 3);
        assert!(registry.lookup("time").is_some());
        assert!(registry.lookup("fly").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ToolRegistry::builder()
            .register(EchoTool)
            .register(EchoTool)
            .build();
        assert!(matches!(result, Err(AgentError::DuplicateTool(name)) if name == "echo"));
    }

    #[test]
    fn test_tool_input_parse() {
        let structured = ToolInput::parse(r#" {"city": "Paris"} "#);
        assert_eq!(structured.get_str("city"), Some("Paris"));

        let fenced = ToolInput::parse("```json\n{\"city\": \"Rome\"}\n```");
        assert_eq!(fenced.get_str("city"), Some("Rome"));

        assert_eq!(ToolInput::parse(" Paris \n"), ToolInput::Text("Paris".to_string()));
        assert_eq!(ToolInput::parse("[1, 2]"), ToolInput::Text("[1, 2]".to_string()));
        assert_eq!(ToolInput::parse("{broken"), ToolInput::Text("{broken".to_string()));
    }

    #[test]
    fn test_text_input_wraps_as_single_field() {
        let args = ToolInput::Text("Paris".to_string()).into_arguments();
        assert_eq!(args.get("input"), Some(&Value::String("Paris".to_string())));
        assert_eq!(args.len(), 1);
    }
}
