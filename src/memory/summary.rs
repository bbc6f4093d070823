//! 会话摘要：交给模型的记忆上下文
//!
//! summary 生成两段式摘要：每轮一行索引（用户消息前 100 字符），
//! 再附最近 5 轮的完整用户消息与应答正文前 200 字符。
//! detailed 按模型请求的 id 取整轮内容，缺失或非数字的 id 静默跳过。

use std::collections::BTreeMap;

use crate::memory::store::{HistoryStore, Turn};

/// 摘要中每轮索引行保留的用户消息长度
const INDEX_CHARS: usize = 100;
/// 最近上下文保留的应答正文长度
const RECENT_RESPONSE_CHARS: usize = 200;
/// 最近上下文轮数
const RECENT_TURNS: usize = 5;

impl HistoryStore {
    /// 生成线程摘要；空线程返回固定句子
    pub fn summary(&self, name: &str) -> String {
        if self.turn_count(name) == 0 {
            return "No previous conversations available.".to_string();
        }

        let mut out = format!("Available Memory Indices for '{}':\n", name);
        for (id, turn) in self.turns(name) {
            out.push_str(&format!(
                "Index {}: User asked about: {}\n",
                id,
                truncate_chars(&turn.user, INDEX_CHARS)
            ));
        }

        out.push_str("\nRecent Context:\n");
        let recent: Vec<(&u64, &Turn)> = {
            let mut turns: Vec<_> = self.turns(name).collect();
            let skip = turns.len().saturating_sub(RECENT_TURNS);
            turns.drain(..skip);
            turns
        };
        for (id, turn) in recent {
            out.push_str(&format!("[{}] User: {}\n", id, turn.user));
            let response: String = turn
                .llm
                .main_text()
                .chars()
                .take(RECENT_RESPONSE_CHARS)
                .collect();
            out.push_str(&format!("[{}] AI: {}...\n", id, response));
        }

        out
    }

    /// 按请求 id 取整轮内容；未知或非数字 id 不报错，直接省略
    pub fn detailed(&self, name: &str, ids: &[String]) -> BTreeMap<u64, Turn> {
        ids.iter()
            .filter_map(|raw| raw.trim().parse::<u64>().ok())
            .filter_map(|id| self.turn(name, id).map(|turn| (id, turn.clone())))
            .collect()
    }

    /// 最近 n 轮（简单应答路径的上下文）
    pub fn recent(&self, name: &str, n: usize) -> BTreeMap<u64, Turn> {
        let turns: Vec<_> = self.turns(name).collect();
        let skip = turns.len().saturating_sub(n);
        turns[skip..]
            .iter()
            .map(|(id, turn)| (**id, (*turn).clone()))
            .collect()
    }
}

/// 按字符数截断，超出时追加 ...
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::parse_reply;

    fn reply(text: &str) -> crate::llm::LlmReply {
        parse_reply(&format!(r#"{{"main_response": "{}"}}"#, text))
    }

    #[test]
    fn test_empty_thread_summary() {
        let store = HistoryStore::new();
        assert_eq!(
            store.summary("default"),
            "No previous conversations available."
        );
    }

    #[test]
    fn test_summary_lists_all_indices_and_recent_five() {
        let mut store = HistoryStore::new();
        for i in 1..=7 {
            store.append_turn("t", format!("question {}", i), reply("answer"));
        }
        let summary = store.summary("t");
        for i in 1..=7 {
            assert!(summary.contains(&format!("Index {}: User asked about: question {}", i, i)));
        }
        // 最近上下文只含最后 5 轮
        assert!(summary.contains("[3] User: question 3"));
        assert!(summary.contains("[7] User: question 7"));
        assert!(!summary.contains("[2] User: question 2"));
    }

    #[test]
    fn test_summary_truncates_long_user_message() {
        let mut store = HistoryStore::new();
        let long = "啊".repeat(150);
        store.append_turn("t", long.clone(), reply("a"));
        let summary = store.summary("t");
        let expected: String = long.chars().take(100).collect();
        assert!(summary.contains(&format!("User asked about: {}...", expected)));
    }

    #[test]
    fn test_detailed_omits_missing_and_non_numeric_ids() {
        let mut store = HistoryStore::new();
        store.append_turn("t", "q1", reply("a1"));
        store.append_turn("t", "q2", reply("a2"));
        let got = store.detailed(
            "t",
            &[
                "1".to_string(),
                "42".to_string(),
                "abc".to_string(),
                "2".to_string(),
            ],
        );
        assert_eq!(got.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(got[&1].user, "q1");
    }

    #[test]
    fn test_recent_keeps_last_n() {
        let mut store = HistoryStore::new();
        for i in 1..=6 {
            store.append_turn("t", format!("q{}", i), reply("a"));
        }
        let recent = store.recent("t", 4);
        assert_eq!(recent.keys().copied().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
    }
}
