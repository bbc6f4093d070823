//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）、应答类型与容错解析

pub mod mock;
pub mod openai;
pub mod parser;
pub mod reply;
pub mod traits;

use std::sync::Arc;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use parser::parse_reply;
pub use reply::{FallbackReply, LlmReply, ParsedReply};
pub use traits::{LlmClient, LlmError, Message, Role};

use crate::config::AppConfig;

/// 根据配置创建 LLM 客户端（provider: openai / mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    match cfg.llm.provider.as_str() {
        "mock" => Arc::new(MockLlmClient::new()),
        _ => {
            let api_key = cfg
                .llm
                .api_key
                .clone()
                .or_else(|| std::env::var("MNEMO_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("HF_TOKEN").ok());
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                api_key.as_deref(),
            ))
        }
    }
}
