//! 交互式 REPL
//!
//! rustyline 行编辑 + 斜杠命令；普通输入作为用户消息走增强（或简单）
//! 应答路径，每轮结束后自动保存当前线程到 {name}_history.json。

use std::path::PathBuf;
use std::sync::Arc;

use rustyline::error::ReadlineError;

use crate::agent::Agent;
use crate::memory::HistoryStore;
use crate::search::SearchProvider;

pub struct Repl {
    store: HistoryStore,
    agent: Agent,
    search: Arc<dyn SearchProvider>,
    history_dir: PathBuf,
    /// false 时走简单应答路径（无记忆/搜索增强）
    enhanced: bool,
}

impl Repl {
    pub fn new(agent: Agent, search: Arc<dyn SearchProvider>, history_dir: PathBuf) -> Self {
        Self {
            store: HistoryStore::new(),
            agent,
            search,
            history_dir,
            enhanced: true,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut rl = rustyline::DefaultEditor::new()?;
        let input_history = self.history_dir.join("repl_input.txt");
        let _ = rl.load_history(&input_history);

        println!("mnemo - 记忆增强对话智能体");
        println!("输入 /help 查看命令，Ctrl+D 或 /quit 退出\n");

        loop {
            match rl.readline("you> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(&line);

                    if trimmed.starts_with('/') {
                        if self.handle_command(trimmed).await {
                            break;
                        }
                        continue;
                    }

                    self.handle_message(trimmed).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("(Ctrl+D 或 /quit 退出)");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    tracing::error!(error = %e, "readline failed");
                    break;
                }
            }
        }

        let _ = rl.save_history(&input_history);
        println!("再见");
        Ok(())
    }

    /// 处理斜杠命令；返回 true 表示退出循环
    async fn handle_command(&mut self, input: &str) -> bool {
        let mut parts = input.splitn(3, ' ');
        let cmd = parts.next().unwrap_or("");
        let arg1 = parts.next();
        let arg2 = parts.next();

        match cmd {
            "/quit" | "/exit" => return true,
            "/help" => print_help(),
            "/stats" => {
                let name = arg1.unwrap_or(self.store.active()).to_string();
                println!("'{}' 共 {} 轮", name, self.store.turn_count(&name));
                println!("现存索引: {:?}", self.store.ids(&name));
            }
            "/history" => {
                let name = arg1.unwrap_or(self.store.active()).to_string();
                if self.store.turn_count(&name) == 0 {
                    println!("'{}' 暂无历史", name);
                }
                for (id, turn) in self.store.turns(&name) {
                    println!("[{}] you: {}", id, turn.user);
                    println!("[{}] assistant: {}", id, turn.llm.main_text());
                }
            }
            "/histories" => {
                for (name, count) in self.store.thread_names() {
                    let marker = if name == self.store.active() { "👉" } else { "  " };
                    println!("{} {}: {} 轮", marker, name, count);
                }
            }
            "/switch" => match arg1 {
                Some(name) => {
                    self.store.switch_active(name);
                    println!("已切换到 '{}'", name);
                }
                None => println!("用法: /switch <name>"),
            },
            "/clear" => {
                let name = arg1.unwrap_or(self.store.active()).to_string();
                self.store.clear(&name);
                println!("已清空 '{}'", name);
            }
            "/save" => match arg1 {
                Some(file) => {
                    let name = arg2.unwrap_or(self.store.active()).to_string();
                    if self.store.save(&name, file) {
                        println!("'{}' 已保存到 {}", name, file);
                    } else {
                        println!("保存失败（详见日志）");
                    }
                }
                None => println!("用法: /save <file> [name]"),
            },
            "/load" => match arg1 {
                Some(file) => {
                    if self.store.load(file, arg2) {
                        println!("已从 {} 装载", file);
                    } else {
                        println!("装载失败（详见日志）");
                    }
                }
                None => println!("用法: /load <file> [name]"),
            },
            "/simple" => {
                self.enhanced = !self.enhanced;
                println!(
                    "模式: {}",
                    if self.enhanced {
                        "增强（记忆 + 搜索）"
                    } else {
                        "简单（仅最近上下文）"
                    }
                );
            }
            "/search" => {
                // /search 之后的整段文本作为查询词
                let query = input.strip_prefix("/search").unwrap_or("").trim();
                if query.is_empty() {
                    println!("用法: /search <query>");
                } else {
                    let results = self.search.search(query).await;
                    if results.is_empty() {
                        println!("无结果");
                    }
                    for (i, r) in results.iter().enumerate() {
                        let preview: String = r.content.chars().take(300).collect();
                        println!("\n结果 {}: {}\nURL: {}\n{}", i + 1, r.title, r.url, preview);
                    }
                }
            }
            _ => println!("未知命令 {}，/help 查看可用命令", cmd),
        }
        false
    }

    /// 普通输入：应答 → 追加历史 → 自动保存
    async fn handle_message(&mut self, msg: &str) {
        let thread = self.store.active().to_string();
        let reply = if self.enhanced {
            self.agent.respond(&self.store, &thread, msg).await
        } else {
            self.agent.respond_simple(&self.store, &thread, msg).await
        };

        println!("assistant> {}", reply.main_text());
        if reply.used_memory() {
            println!("  (使用了历史记忆)");
        }
        if reply.used_search() {
            println!("  (使用了联网搜索)");
        }

        let id = self.store.append_turn(&thread, msg, reply);
        let path = self.history_dir.join(format!("{}_history.json", thread));
        self.store.save(&thread, &path);
        tracing::debug!(thread = %thread, id, "turn recorded");
    }
}

fn print_help() {
    println!("可用命令:");
    println!("/stats [name]        - 查看线程统计");
    println!("/history [name]      - 查看对话历史");
    println!("/histories           - 列出所有线程");
    println!("/switch <name>       - 切换线程（不存在则创建）");
    println!("/clear [name]        - 清空线程");
    println!("/save <file> [name]  - 保存线程到文件");
    println!("/load <file> [name]  - 从文件装载线程");
    println!("/simple              - 切换简单/增强模式");
    println!("/search <query>      - 直接测试联网搜索");
    println!("/help                - 显示本帮助");
    println!("/quit                - 退出");
}
