//! 增强应答控制器
//!
//! 两阶段协议：第一次调用附带会话摘要；若解析出的应答请求记忆明细或
//! 联网搜索，收集数据后进行且仅进行一轮补充调用，并在结果上标记
//! used_memory / used_search。任何模型调用失败都转换为错误应答返回，
//! 不向调用方抛出。

use std::sync::Arc;

use crate::llm::{parse_reply, LlmClient, LlmError, LlmReply, Message};
use crate::memory::HistoryStore;
use crate::search::{SearchProvider, SearchResult};

/// 第一阶段系统指令：严格 JSON schema，允许模型用 NEED_MEMORY / NEED_SEARCH 请求数据
pub const SYSTEM_PROMPT: &str = r#"
You are an AI assistant with access to a memory system AND web search capability. You MUST respond in **strict JSON format** only.

CRITICAL: Your response must be VALID JSON that can be parsed directly. Do not include any text before or after the JSON object.

MEMORY ACCESS RULES:
- You will receive a "memory_summary" containing recent conversations
- If you need detailed information from older conversations, you can request specific memory indices
- To request memory access, include in your main_response: "NEED_MEMORY: [index1, index2, ...]"
- Available memory indices will be shown in the memory_summary

WEB SEARCH RULES:
- If you need current information, real-time data, or information not in your training, you can request web search
- To request web search, include in your main_response: "NEED_SEARCH: search_query_here"
- You can request both memory access AND web search in the same response
- Web search will provide you with current information from multiple sources

Follow this exact JSON schema:

{
  "main_response": "your response here, include NEED_MEMORY: [indices] and/or NEED_SEARCH: query if needed",
  "memory_request": ["index1", "index2"] or null,
  "search_request": "search_query" or null,
  "summarize_answer_prompt_in_100_words": "summarize your answer in 100 words",
  "summarize_question_prompt_in_100_words": "summarize the user's question in 100 words"
}

CRITICAL RULES:
1. ONLY return valid JSON - nothing else
2. Do not include markdown formatting, code blocks, or explanations outside JSON
3. If you don't need memory access, set "memory_request" to null
4. If you don't need web search, set "search_request" to null
5. If you need specific memories, list the indices in "memory_request" array
6. If you need web search, provide a clear search query in "search_request"
7. Always provide a complete response in "main_response"
8. Escape all quotes and special characters properly in JSON strings
"#;

/// 补充轮把「可以继续请求」的条款替换为「用已给数据作答」
fn followup_prompt() -> String {
    SYSTEM_PROMPT.replace(
        "include NEED_MEMORY: [indices] and/or NEED_SEARCH: query if needed",
        "provide your final answer using the additional information provided",
    )
}

/// 增强应答控制器：持有 LLM 客户端与搜索数据源，历史存储由调用方注入
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchProvider>,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, search: Arc<dyn SearchProvider>) -> Self {
        Self { llm, search }
    }

    /// 两阶段增强应答；失败时返回错误应答而非 Err
    pub async fn respond(&self, store: &HistoryStore, thread: &str, user_msg: &str) -> LlmReply {
        match self.try_respond(store, thread, user_msg).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(thread = %thread, error = %e, "model call failed");
                LlmReply::error_reply(user_msg, &e.to_string())
            }
        }
    }

    async fn try_respond(
        &self,
        store: &HistoryStore,
        thread: &str,
        user_msg: &str,
    ) -> Result<LlmReply, LlmError> {
        // 第一阶段：摘要 + 问题
        let digest = store.summary(thread);
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(format!("Memory Summary:\n{}", digest)),
            Message::user(format!("Current Question: {}", user_msg)),
        ];
        let raw = self.llm.complete(&messages).await?;
        let first = parse_reply(&raw);

        let memory_ids: Vec<String> = first
            .memory_request()
            .map(|ids| ids.to_vec())
            .unwrap_or_default();
        let search_query = first.search_request().map(str::to_string);

        // 无请求：第一阶段结果即最终结果
        if memory_ids.is_empty() && search_query.is_none() {
            return Ok(first);
        }

        // 补充轮：原问题 + 摘要 + 请求到的数据，指示模型给出最终回答
        let mut followup = vec![
            Message::system(followup_prompt()),
            Message::user(format!("Original Question: {}", user_msg)),
            Message::user(format!("Memory Summary: {}", digest)),
        ];

        let used_memory = !memory_ids.is_empty();
        if used_memory {
            tracing::info!(thread = %thread, indices = ?memory_ids, "model requested memory access");
            let detailed = store.detailed(thread, &memory_ids);
            let rendered = serde_json::to_string_pretty(&detailed).unwrap_or_default();
            followup.push(Message::user(format!("Detailed Memories: {}", rendered)));
        }

        let used_search = search_query.is_some();
        if let Some(query) = &search_query {
            tracing::info!(thread = %thread, query = %query, "model requested web search");
            let results = self.search.search(query).await;
            followup.push(Message::user(format!(
                "Web Search Results: {}",
                render_search_results(&results)
            )));
        }

        followup.push(Message::user(
            "Now provide your complete final answer based on all available information.",
        ));

        let raw = self.llm.complete(&followup).await?;
        let mut reply = parse_reply(&raw);
        reply.set_usage(used_memory, used_search);
        Ok(reply)
    }

    /// 简单应答：仅携带最近 4 轮上下文，单次调用，无增强
    pub async fn respond_simple(
        &self,
        store: &HistoryStore,
        thread: &str,
        user_msg: &str,
    ) -> LlmReply {
        let recent = store.recent(thread, 4);
        let context = serde_json::to_string(&recent).unwrap_or_default();
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(context),
            Message::user(user_msg),
        ];
        match self.llm.complete(&messages).await {
            Ok(raw) => parse_reply(&raw),
            Err(e) => {
                tracing::error!(thread = %thread, error = %e, "model call failed");
                LlmReply::error_reply(user_msg, &e.to_string())
            }
        }
    }
}

/// 搜索结果序列化为编号文本块
fn render_search_results(results: &[SearchResult]) -> String {
    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "\nSource {}: {}\nURL: {}\nContent: {}\n",
            i + 1,
            result.title,
            result.url,
            result.content
        ));
    }
    out
}
