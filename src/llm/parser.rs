//! 容错 JSON 解析：模型应答的三段式提取
//!
//! 依次尝试：严格解析 → 去围栏后按最外层大括号截取 → 回退信封。
//! 三个策略都是纯函数，parse_reply 永不失败。

use crate::llm::reply::{FallbackReply, LlmReply, ParsedReply};

/// 解析模型原始文本为应答；任何输入都能得到一个 LlmReply
pub fn parse_reply(text: &str) -> LlmReply {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return LlmReply::Fallback(fallback_envelope(trimmed, "empty or invalid content"));
    }

    let first_err = match strict_parse(trimmed) {
        Ok(reply) => return LlmReply::Parsed(reply),
        Err(e) => e.to_string(),
    };

    if let Some(candidate) = extract_braced(trimmed) {
        if let Ok(reply) = strict_parse(&candidate) {
            return LlmReply::Parsed(reply);
        }
    }

    LlmReply::Fallback(fallback_envelope(trimmed, &first_err))
}

/// 策略一：整段文本按 schema 严格解析
fn strict_parse(text: &str) -> Result<ParsedReply, serde_json::Error> {
    serde_json::from_str(text)
}

/// 策略二：去掉首尾围栏行后，截取首个 `{` 到最后一个 `}` 的子串
fn extract_braced(text: &str) -> Option<String> {
    let body = strip_code_fence(text);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(body[start..=end].to_string())
}

/// 以 ``` 开头时丢弃首尾两行（```json ... ``` 围栏），否则原样返回
fn strip_code_fence(text: &str) -> String {
    if !text.starts_with("```") {
        return text.to_string();
    }
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= 2 {
        return text.to_string();
    }
    lines[1..lines.len() - 1].join("\n")
}

/// 策略三：原始文本整体作为应答正文，记录解析错误
fn fallback_envelope(raw: &str, err: &str) -> FallbackReply {
    FallbackReply {
        main_response: raw.to_string(),
        memory_request: None,
        search_request: None,
        summarize_answer: "Failed to parse JSON response from AI model".to_string(),
        summarize_question: "User query that resulted in unparseable response".to_string(),
        parsing_error: err.to_string(),
        raw_content: raw.to_string(),
        used_memory: None,
        used_search: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = r#"{"main_response":"hi","memory_request":null,"search_request":null}"#;

    #[test]
    fn test_strict_parse() {
        let reply = parse_reply(PLAIN);
        assert_eq!(reply.main_text(), "hi");
        assert!(reply.parsing_error().is_none());
        assert_eq!(reply.memory_request(), None);
        assert_eq!(reply.search_request(), None);
    }

    #[test]
    fn test_fenced_block_parse() {
        let fenced = format!("```json\n{}\n```", PLAIN);
        let reply = parse_reply(&fenced);
        assert_eq!(reply.main_text(), "hi");
        assert!(reply.parsing_error().is_none());
        // 与直接解析结果一致
        assert_eq!(reply, parse_reply(PLAIN));
    }

    #[test]
    fn test_surrounding_prose_parse() {
        let wrapped = format!("Here is the result:\n{}\nHope this helps.", PLAIN);
        let reply = parse_reply(&wrapped);
        assert_eq!(reply.main_text(), "hi");
        assert!(reply.parsing_error().is_none());
    }

    #[test]
    fn test_plain_text_falls_back() {
        let reply = parse_reply("just text");
        assert_eq!(reply.main_text(), "just text");
        assert!(reply.parsing_error().is_some());
        assert_eq!(reply.memory_request(), None);
        assert_eq!(reply.search_request(), None);
    }

    #[test]
    fn test_empty_input_falls_back() {
        let reply = parse_reply("   ");
        assert!(reply.parsing_error().is_some());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("no fence"), "no fence");
        // 只有围栏行、没有内容时不截取
        assert_eq!(strip_code_fence("```\n```"), "```\n```");
    }

    #[test]
    fn test_extract_braced() {
        assert_eq!(extract_braced("x {\"a\":1} y"), Some("{\"a\":1}".to_string()));
        assert_eq!(extract_braced("no braces"), None);
        assert_eq!(extract_braced("} {"), None);
    }

    #[test]
    fn test_requests_survive_parse() {
        let text = r#"{"main_response":"NEED_SEARCH: rust","memory_request":["1","2"],"search_request":"rust"}"#;
        let reply = parse_reply(text);
        assert_eq!(
            reply.memory_request(),
            Some(&["1".to_string(), "2".to_string()][..])
        );
        assert_eq!(reply.search_request(), Some("rust"));
    }
}
