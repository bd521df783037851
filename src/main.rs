//! Orchestra CLI
//!
//! 从 stdin 逐行读取查询，流式结果以 NDJSON 写到 stdout（每行一个事件）。
//! 命令：`/reset` 清空对话，`/history` 打印历史，`/sync <query>` 走同步路径输出完整 JSON。
//! 可选参数：配置文件路径。

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use futures_util::StreamExt;
use orchestra::config::load_config;
use orchestra::observability;
use orchestra::tools::{EchoTool, ToolRegistry};
use orchestra::Session;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    let registry = ToolRegistry::builder()
        .register(EchoTool)
        .build()
        .context("Failed to build tool registry")?;
    let mut session =
        Session::from_config(&cfg, Arc::new(registry)).context("Failed to create session")?;
    tracing::info!(session = %session.id(), provider = %cfg.llm.provider, "orchestra ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "/reset" {
            session.reset();
            continue;
        }
        if line == "/history" {
            print_json(&session.history())?;
            continue;
        }
        if let Some(query) = line.strip_prefix("/sync ") {
            match session.process_query(query.trim()).await {
                Ok(response) => print_json(&response)?,
                Err(e) => print_json(&serde_json::json!({ "error": e.to_string() }))?,
            }
            continue;
        }

        let (mut events, handle) = session.stream_query(line);
        while let Some(event) = events.next().await {
            print_json(&event)?;
        }
        session = handle.await.context("Session task failed")?;
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, value).context("Failed to serialize output")?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}
