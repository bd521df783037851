//! 认知层：ReAct 主循环、轨迹解析、流式事件与转译

pub mod events;
pub mod loop_;
pub mod parser;
pub mod prompt;
pub mod transpiler;

pub use events::{CompleteSummary, StreamEvent};
pub use loop_::{react_loop, LoopOutcome, ReactSession, StopReason, DEFAULT_MAX_ITERATIONS};
pub use parser::{parse_trace, FunctionCall, ParsedOutput};
pub use transpiler::{chunk_text, structured_events, EventStream, StreamTranspiler};
