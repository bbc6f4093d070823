//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 默认把最后一条 User 消息回显为 schema 形状的 JSON；测试可预置应答队列、
//! 注入失败，并读取每次调用收到的完整 prompt 文本。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::traits::{LlmClient, LlmError, Message, Role};

/// Mock 客户端：按队列出队预置应答，队列为空时回显最后一条用户消息
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    fail_with: Option<String>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置应答队列，按调用顺序出队
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// 每次调用都返回给定错误
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// 第 n 次调用收到的 prompt（所有消息按 "role: content" 拼接）
    pub fn prompt(&self, n: usize) -> Option<String> {
        self.prompts.lock().ok()?.get(n).cloned()
    }

    fn record(&self, messages: &[Message]) {
        let rendered = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                format!("{}: {}", role, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n");
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(rendered);
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.record(messages);

        if let Some(err) = &self.fail_with {
            return Err(LlmError::Api(err.clone()));
        }

        if let Some(reply) = self.replies.lock().ok().and_then(|mut q| q.pop_front()) {
            return Ok(reply);
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(serde_json::json!({
            "main_response": format!("Echo from Mock: {}", last_user),
            "memory_request": null,
            "search_request": null,
            "summarize_answer_prompt_in_100_words": "Echoed the user input",
            "summarize_question_prompt_in_100_words": last_user,
        })
        .to_string())
    }
}
