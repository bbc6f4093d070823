//! 端到端对话流程集成测试
//!
//! 用 Mock LLM 与搜索桩跑完整路径：应答 → 追加历史 → 持久化 → 装载续写。

use std::sync::Arc;

use async_trait::async_trait;
use mnemo::agent::Agent;
use mnemo::llm::MockLlmClient;
use mnemo::memory::HistoryStore;
use mnemo::search::{SearchProvider, SearchResult};
use tempfile::TempDir;

struct NoSearch;

#[async_trait]
impl SearchProvider for NoSearch {
    async fn search(&self, _query: &str) -> Vec<SearchResult> {
        Vec::new()
    }
}

fn plain_reply(text: &str) -> String {
    serde_json::json!({
        "main_response": text,
        "memory_request": null,
        "search_request": null,
        "summarize_answer_prompt_in_100_words": "a",
        "summarize_question_prompt_in_100_words": "q",
    })
    .to_string()
}

#[tokio::test]
async fn test_simple_path_persists_first_turn() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("demo_history.json");

    let mock = Arc::new(MockLlmClient::with_replies(vec![plain_reply("hello back")]));
    let agent = Agent::new(mock.clone(), Arc::new(NoSearch));
    let mut store = HistoryStore::new();
    store.switch_active("demo");

    let msg = "hello there";
    let reply = agent.respond_simple(&store, "demo", msg).await;
    let id = store.append_turn("demo", msg, reply);
    assert_eq!(id, 1);
    assert!(store.save("demo", &path));

    // 持久化文件中第一轮的 user 字段应为原始消息
    let data = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&data).unwrap();
    assert_eq!(value["conversations"]["1"]["user"], msg);
    assert_eq!(value["history_name"], "demo");
    assert_eq!(value["total_conversations"], 1);
}

#[tokio::test]
async fn test_restored_thread_continues_numbering() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("demo_history.json");

    let mock = Arc::new(MockLlmClient::new());
    let agent = Agent::new(mock.clone(), Arc::new(NoSearch));

    let mut store = HistoryStore::new();
    for i in 1..=3 {
        let msg = format!("question {}", i);
        let reply = agent.respond_simple(&store, "demo", &msg).await;
        store.append_turn("demo", msg, reply);
    }
    assert!(store.save("demo", &path));

    // 新进程视角：装载后续写，id 严格大于文件中的最大 id
    let mut resumed = HistoryStore::new();
    assert!(resumed.load(&path, None));
    let reply = agent.respond_simple(&resumed, "demo", "question 4").await;
    let id = resumed.append_turn("demo", "question 4", reply);
    assert_eq!(id, 4);
    assert_eq!(resumed.ids("demo"), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_augmented_turn_survives_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("demo_history.json");

    let first = serde_json::json!({
        "main_response": "NEED_SEARCH: weather",
        "memory_request": null,
        "search_request": "weather",
    })
    .to_string();
    let mock = Arc::new(MockLlmClient::with_replies(vec![
        first,
        plain_reply("sunny, 25 degrees"),
    ]));

    struct OneResult;
    #[async_trait]
    impl SearchProvider for OneResult {
        async fn search(&self, _query: &str) -> Vec<SearchResult> {
            vec![SearchResult {
                title: "Weather".to_string(),
                url: "https://weather.example".to_string(),
                content: "sunny".to_string(),
            }]
        }
    }

    let agent = Agent::new(mock.clone(), Arc::new(OneResult));
    let mut store = HistoryStore::new();

    let reply = agent.respond(&store, "demo", "weather today?").await;
    assert!(reply.used_search());
    store.append_turn("demo", "weather today?", reply);
    assert!(store.save("demo", &path));

    // 装载后 used_search 标记仍在
    let mut resumed = HistoryStore::new();
    assert!(resumed.load(&path, None));
    let turn = resumed.turn("demo", 1).unwrap();
    assert!(turn.llm.used_search());
    assert_eq!(turn.llm.main_text(), "sunny, 25 degrees");
}
