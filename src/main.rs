//! Mnemo - 记忆增强对话智能体
//!
//! 入口：初始化日志与配置，构建 LLM 客户端与搜索采集器，进入 REPL 主循环。

use std::sync::Arc;

use anyhow::Context;
use mnemo::agent::Agent;
use mnemo::config::{load_config, AppConfig};
use mnemo::llm::create_llm_from_config;
use mnemo::repl::Repl;
use mnemo::search::{SearchProvider, WebSearchCollector};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, using defaults");
        AppConfig::default()
    });

    std::fs::create_dir_all(&cfg.history.dir).context("Failed to create history dir")?;

    let llm = create_llm_from_config(&cfg);
    let search: Arc<dyn SearchProvider> = Arc::new(WebSearchCollector::new(
        cfg.search.endpoint.clone(),
        cfg.search.api_key.clone(),
        cfg.search.timeout_secs,
    ));

    let agent = Agent::new(llm, search.clone());
    Repl::new(agent, search, cfg.history.dir.clone())
        .run()
        .await
        .context("REPL failed")?;

    Ok(())
}
