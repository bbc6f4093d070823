//! 记忆层：多会话历史存储、摘要与 JSON 持久化

pub mod persistence;
pub mod store;
pub mod summary;

pub use store::{HistoryStore, Thread, Turn};
