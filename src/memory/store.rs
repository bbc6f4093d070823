//! 多会话历史存储
//!
//! 以名字索引的若干会话线程，每个线程是 turn-id → Turn 的有序映射；
//! id 由线程独立计数器单调递增分配（从 1 开始），恢复后从最大 id 续接，
//! 同一线程内 id 不复用。存储作为显式上下文对象由调用方持有并注入，
//! 不依赖进程级全局状态。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::llm::LlmReply;

/// 一轮对话：用户消息 + 模型应答，写入后不再修改
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub llm: LlmReply,
}

/// 单个会话线程：有序 turn 映射与独立计数器
#[derive(Clone, Debug, Default)]
pub struct Thread {
    pub(crate) turns: BTreeMap<u64, Turn>,
    pub(crate) counter: u64,
}

/// 多会话历史存储与当前线程指针
#[derive(Debug)]
pub struct HistoryStore {
    pub(crate) threads: BTreeMap<String, Thread>,
    active: String,
}

pub const DEFAULT_THREAD: &str = "default";

impl HistoryStore {
    pub fn new() -> Self {
        let mut store = Self {
            threads: BTreeMap::new(),
            active: DEFAULT_THREAD.to_string(),
        };
        store.create(DEFAULT_THREAD);
        store
    }

    /// 幂等创建：确保线程与计数器存在
    pub fn create(&mut self, name: &str) {
        self.threads.entry(name.to_string()).or_default();
    }

    /// 切换当前线程，不存在则创建
    pub fn switch_active(&mut self, name: &str) {
        self.create(name);
        self.active = name.to_string();
        tracing::info!(history = %name, "switched active history");
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    /// 追加一轮对话，返回新分配的 turn-id（严格递增，从 1 开始）
    pub fn append_turn(&mut self, name: &str, user: impl Into<String>, llm: LlmReply) -> u64 {
        let thread = self.threads.entry(name.to_string()).or_default();
        thread.counter += 1;
        let id = thread.counter;
        thread.turns.insert(
            id,
            Turn {
                user: user.into(),
                llm,
            },
        );
        id
    }

    /// 清空线程内容并重置计数器
    pub fn clear(&mut self, name: &str) {
        if let Some(thread) = self.threads.get_mut(name) {
            thread.turns.clear();
            thread.counter = 0;
        }
    }

    pub fn turn(&self, name: &str, id: u64) -> Option<&Turn> {
        self.threads.get(name).and_then(|t| t.turns.get(&id))
    }

    pub fn turn_count(&self, name: &str) -> usize {
        self.threads.get(name).map(|t| t.turns.len()).unwrap_or(0)
    }

    /// 线程内现存的 turn-id（升序）
    pub fn ids(&self, name: &str) -> Vec<u64> {
        self.threads
            .get(name)
            .map(|t| t.turns.keys().copied().collect())
            .unwrap_or_default()
    }

    /// 按 id 升序遍历线程内的所有轮次
    pub fn turns(&self, name: &str) -> impl Iterator<Item = (&u64, &Turn)> + '_ {
        self.threads
            .get(name)
            .map(|t| t.turns.iter())
            .into_iter()
            .flatten()
    }

    /// 所有线程名及其轮数（名字升序）
    pub fn thread_names(&self) -> Vec<(String, usize)> {
        self.threads
            .iter()
            .map(|(name, t)| (name.clone(), t.turns.len()))
            .collect()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::parse_reply;

    fn reply(text: &str) -> LlmReply {
        parse_reply(&format!(r#"{{"main_response": "{}"}}"#, text))
    }

    #[test]
    fn test_ids_strictly_increasing_from_one() {
        let mut store = HistoryStore::new();
        let mut last = 0;
        for i in 0..10 {
            let id = store.append_turn("t", format!("q{}", i), reply("a"));
            assert!(id > last);
            last = id;
        }
        assert_eq!(store.ids("t"), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_create_is_idempotent() {
        let mut store = HistoryStore::new();
        store.create("t");
        store.append_turn("t", "q", reply("a"));
        store.create("t");
        assert_eq!(store.turn_count("t"), 1);
    }

    #[test]
    fn test_switch_creates_and_points() {
        let mut store = HistoryStore::new();
        assert_eq!(store.active(), DEFAULT_THREAD);
        store.switch_active("work");
        assert_eq!(store.active(), "work");
        assert_eq!(store.turn_count("work"), 0);
    }

    #[test]
    fn test_clear_resets_counter() {
        let mut store = HistoryStore::new();
        store.append_turn("t", "q1", reply("a"));
        store.append_turn("t", "q2", reply("a"));
        store.clear("t");
        assert_eq!(store.turn_count("t"), 0);
        assert_eq!(store.append_turn("t", "q3", reply("a")), 1);
    }

    #[test]
    fn test_turn_lookup() {
        let mut store = HistoryStore::new();
        let id = store.append_turn("t", "hello", reply("world"));
        let turn = store.turn("t", id).unwrap();
        assert_eq!(turn.user, "hello");
        assert_eq!(turn.llm.main_text(), "world");
        assert!(store.turn("t", 99).is_none());
    }
}
