//! Mnemo - Rust 记忆增强对话智能体
//!
//! 模块划分：
//! - **agent**: 两阶段增强应答控制器（记忆/搜索请求 → 收集数据 → 一轮补充调用）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、应答类型与容错解析
//! - **memory**: 多会话历史存储、摘要与 JSON 持久化
//! - **repl**: 命令行交互循环（/stats、/switch、/save 等）
//! - **search**: 联网搜索采集器（搜索引擎 API + 网页抓取）

pub mod agent;
pub mod config;
pub mod llm;
pub mod memory;
pub mod repl;
pub mod search;
