//! 会话历史持久化
//!
//! 线程序列化为 {history_name, conversations, total_conversations} JSON 文件；
//! 父目录自动创建。I/O 错误记录日志并以布尔值上报，不向调用方抛出。

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::memory::store::{HistoryStore, Thread, Turn};

/// 磁盘上的线程文件格式（conversations 的键为 id 的十进制字符串）
#[derive(Serialize, Deserialize)]
struct ThreadFile {
    #[serde(default)]
    history_name: String,
    #[serde(default)]
    conversations: BTreeMap<u64, Turn>,
    #[serde(default)]
    total_conversations: usize,
}

impl HistoryStore {
    /// 将线程写入文件；失败记录日志并返回 false
    pub fn save(&self, name: &str, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.try_save(name, path) {
            Ok(()) => {
                tracing::info!(history = %name, path = %path.display(), "history saved");
                true
            }
            Err(e) => {
                tracing::error!(history = %name, path = %path.display(), error = %e, "failed to save history");
                false
            }
        }
    }

    fn try_save(&self, name: &str, path: &Path) -> anyhow::Result<()> {
        let turns = self
            .threads
            .get(name)
            .map(|t| t.turns.clone())
            .unwrap_or_default();
        let file = ThreadFile {
            history_name: name.to_string(),
            total_conversations: turns.len(),
            conversations: turns,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// 从文件装载线程：安装在给定名字（缺省用文件内嵌名字）下，
    /// 计数器重置为现存最大 id（空线程为 0）。失败记录日志并返回 false
    pub fn load(&mut self, path: impl AsRef<Path>, name: Option<&str>) -> bool {
        let path = path.as_ref();
        match self.try_load(path, name) {
            Ok(installed) => {
                tracing::info!(
                    history = %installed,
                    path = %path.display(),
                    turns = self.turn_count(&installed),
                    "history loaded"
                );
                true
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to load history");
                false
            }
        }
    }

    fn try_load(&mut self, path: &Path, name: Option<&str>) -> anyhow::Result<String> {
        let data = std::fs::read_to_string(path)?;
        let file: ThreadFile = serde_json::from_str(&data)?;

        let installed = match name {
            Some(n) => n.to_string(),
            None if !file.history_name.is_empty() => file.history_name,
            None => "loaded_history".to_string(),
        };

        let counter = file.conversations.keys().max().copied().unwrap_or(0);
        self.threads.insert(
            installed.clone(),
            Thread {
                turns: file.conversations,
                counter,
            },
        );
        Ok(installed)
    }
}
