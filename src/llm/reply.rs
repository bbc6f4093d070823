//! 模型应答类型
//!
//! 模型被要求按固定 JSON schema 输出；ParsedReply 对应成功解析的结构，
//! FallbackReply 保留无法解析时的原始文本与错误信息。调用方按枚举匹配，
//! 不做字段探测。序列化形状与持久化文件中的 llm 字段一致。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 成功解析的模型应答（含错误应答：error 字段非空、请求字段为 null）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedReply {
    pub main_response: String,

    /// 模型请求的历史 turn-id 列表；数字与字符串形式均接受，非数组视为缺省
    #[serde(default, deserialize_with = "de_id_list")]
    pub memory_request: Option<Vec<String>>,

    #[serde(default)]
    pub search_request: Option<String>,

    #[serde(default, rename = "summarize_answer_prompt_in_100_words")]
    pub summarize_answer: Option<String>,

    #[serde(default, rename = "summarize_question_prompt_in_100_words")]
    pub summarize_question: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_memory: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_search: Option<bool>,
}

/// 解析失败时的回退信封：原始文本整体作为应答，请求字段恒为 null
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FallbackReply {
    pub main_response: String,

    #[serde(default)]
    pub memory_request: Option<Vec<String>>,

    #[serde(default)]
    pub search_request: Option<String>,

    #[serde(rename = "summarize_answer_prompt_in_100_words")]
    pub summarize_answer: String,

    #[serde(rename = "summarize_question_prompt_in_100_words")]
    pub summarize_question: String,

    pub parsing_error: String,
    pub raw_content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_memory: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_search: Option<bool>,
}

/// 模型应答：解析成功 / 回退信封
///
/// untagged 且 Fallback 在前：只有回退信封带 parsing_error + raw_content，
/// 正常应答不会误入 Fallback 分支。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LlmReply {
    Fallback(FallbackReply),
    Parsed(ParsedReply),
}

impl LlmReply {
    /// 应答正文（回退信封即原始文本）
    pub fn main_text(&self) -> &str {
        match self {
            LlmReply::Parsed(r) => &r.main_response,
            LlmReply::Fallback(r) => &r.main_response,
        }
    }

    /// 模型请求的记忆 id 列表；空列表视为无请求
    pub fn memory_request(&self) -> Option<&[String]> {
        match self {
            LlmReply::Parsed(r) => match r.memory_request.as_deref() {
                Some(ids) if !ids.is_empty() => Some(ids),
                _ => None,
            },
            LlmReply::Fallback(_) => None,
        }
    }

    /// 模型请求的搜索词；空白字符串视为无请求
    pub fn search_request(&self) -> Option<&str> {
        match self {
            LlmReply::Parsed(r) => match r.search_request.as_deref().map(str::trim) {
                Some(q) if !q.is_empty() => Some(q),
                _ => None,
            },
            LlmReply::Fallback(_) => None,
        }
    }

    /// 补充轮结束后标记本轮实际用到的数据来源
    pub fn set_usage(&mut self, used_memory: bool, used_search: bool) {
        match self {
            LlmReply::Parsed(r) => {
                r.used_memory = Some(used_memory);
                r.used_search = Some(used_search);
            }
            LlmReply::Fallback(r) => {
                r.used_memory = Some(used_memory);
                r.used_search = Some(used_search);
            }
        }
    }

    pub fn used_memory(&self) -> bool {
        match self {
            LlmReply::Parsed(r) => r.used_memory.unwrap_or(false),
            LlmReply::Fallback(r) => r.used_memory.unwrap_or(false),
        }
    }

    pub fn used_search(&self) -> bool {
        match self {
            LlmReply::Parsed(r) => r.used_search.unwrap_or(false),
            LlmReply::Fallback(r) => r.used_search.unwrap_or(false),
        }
    }

    pub fn parsing_error(&self) -> Option<&str> {
        match self {
            LlmReply::Fallback(r) => Some(&r.parsing_error),
            LlmReply::Parsed(_) => None,
        }
    }

    /// 将模型调用失败转换为错误应答：错误信息作为正文，请求字段为 null
    pub fn error_reply(user_msg: &str, err: &str) -> Self {
        let question: String = user_msg.chars().take(100).collect();
        LlmReply::Parsed(ParsedReply {
            main_response: format!("Error occurred: {}", err),
            memory_request: None,
            search_request: None,
            summarize_answer: Some(format!("Error in AI communication: {}", err)),
            summarize_question: Some(format!("User query that caused error: {}", question)),
            error: Some(err.to_string()),
            used_memory: None,
            used_search: None,
        })
    }
}

/// memory_request 容错反序列化：数组内数字转字符串，非数组（含单个字符串）视为缺省
fn de_id_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let ids = match value {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    };
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_request_accepts_numbers_and_strings() {
        let reply: ParsedReply =
            serde_json::from_str(r#"{"main_response": "hi", "memory_request": [1, "2"]}"#).unwrap();
        assert_eq!(
            reply.memory_request,
            Some(vec!["1".to_string(), "2".to_string()])
        );
    }

    #[test]
    fn test_memory_request_non_array_treated_as_absent() {
        // 模型偶尔会把单个 id 写成字符串而非数组
        let reply: ParsedReply =
            serde_json::from_str(r#"{"main_response": "hi", "memory_request": "3"}"#).unwrap();
        assert_eq!(reply.memory_request, None);
    }

    #[test]
    fn test_untagged_roundtrip_keeps_variant() {
        let parsed = LlmReply::Parsed(ParsedReply {
            main_response: "ok".to_string(),
            memory_request: None,
            search_request: None,
            summarize_answer: Some("a".to_string()),
            summarize_question: Some("q".to_string()),
            error: None,
            used_memory: None,
            used_search: None,
        });
        let json = serde_json::to_string(&parsed).unwrap();
        let back: LlmReply = serde_json::from_str(&json).unwrap();
        assert_eq!(back, parsed);

        let fallback = LlmReply::Fallback(FallbackReply {
            main_response: "raw".to_string(),
            memory_request: None,
            search_request: None,
            summarize_answer: "Failed to parse JSON response from AI model".to_string(),
            summarize_question: "User query that resulted in unparseable response".to_string(),
            parsing_error: "expected value".to_string(),
            raw_content: "raw".to_string(),
            used_memory: None,
            used_search: None,
        });
        let json = serde_json::to_string(&fallback).unwrap();
        let back: LlmReply = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fallback);
    }

    #[test]
    fn test_blank_search_request_is_no_request() {
        let reply: ParsedReply =
            serde_json::from_str(r#"{"main_response": "hi", "search_request": "  "}"#).unwrap();
        assert_eq!(LlmReply::Parsed(reply).search_request(), None);
    }

    #[test]
    fn test_error_reply_truncates_question() {
        let long = "问".repeat(150);
        let reply = LlmReply::error_reply(&long, "timeout");
        match reply {
            LlmReply::Parsed(r) => {
                assert_eq!(r.error.as_deref(), Some("timeout"));
                let q = r.summarize_question.unwrap();
                assert!(q.chars().count() <= "User query that caused error: ".chars().count() + 100);
            }
            _ => panic!("expected parsed reply"),
        }
    }
}
