//! 联网搜索采集器
//!
//! 搜索引擎 API 取前 3 条自然结果，逐页抓取正文：GET 带浏览器 UA 与超时，
//! 429/500/502/503/504 及传输错误按指数退避重试；HTML 用 html2text 提取
//! 可读文本并截断到固定长度。单页失败记日志后跳过，采集整体不失败。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 最多采集的结果条数
pub const MAX_RESULTS: usize = 3;
/// 单条结果正文的字符上限（超出截断并追加 ...）
pub const MAX_CONTENT_CHARS: usize = 2000;

const PAGE_RETRIES: u32 = 3;
const RETRY_STATUS: [u16; 5] = [429, 500, 502, 503, 504];
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0 Safari/537.36";

/// 一条搜索结果：标题、链接与截断后的页面正文
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// 搜索数据源抽象：控制器与 REPL 经此调用，测试可替换
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Vec<SearchResult>;
}

/// SerpApi 风格采集器：引擎查询 + 逐页抓取
pub struct WebSearchCollector {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl WebSearchCollector {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }

    /// 引擎查询，返回前 3 条自然结果的 (title, url)
    async fn organic_results(&self, query: &str) -> Result<Vec<(String, String)>, String> {
        let api_key = self
            .api_key
            .clone()
            .or_else(|| std::env::var("SERPAPI_API_KEY").ok())
            .ok_or_else(|| "Missing search API key".to_string())?;

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("hl", "en"),
                ("gl", "us"),
                ("num", "3"),
                ("api_key", &api_key),
            ])
            .send()
            .await
            .map_err(|e| format!("Search request failed: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("Search engine HTTP {}", resp.status()));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("Search response decode failed: {}", e))?;
        Ok(parse_organic(&body))
    }

    /// 抓取单页并提取正文；可重试状态码与传输错误按 1s/2s/4s 退避
    async fn fetch_page(&self, url: &str) -> Result<String, String> {
        let mut attempt = 0u32;
        loop {
            let outcome = self.client.get(url).send().await;
            let retryable = match &outcome {
                Ok(resp) => RETRY_STATUS.contains(&resp.status().as_u16()),
                Err(_) => true,
            };

            match outcome {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| format!("Read body: {}", e))?;
                    return Ok(page_text(&body));
                }
                Ok(resp) if !retryable => return Err(format!("HTTP {}", resp.status())),
                Err(e) if attempt >= PAGE_RETRIES => {
                    return Err(format!("Request failed: {}", e))
                }
                Ok(resp) if attempt >= PAGE_RETRIES => {
                    return Err(format!("HTTP {} after retries", resp.status()))
                }
                _ => {
                    let delay = Duration::from_secs(1 << attempt);
                    tracing::debug!(url = %url, attempt, delay_secs = delay.as_secs(), "retrying page fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl SearchProvider for WebSearchCollector {
    async fn search(&self, query: &str) -> Vec<SearchResult> {
        tracing::info!(query = %query, "web search");
        let hits = match self.organic_results(query).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!(query = %query, error = %e, "search engine query failed");
                return Vec::new();
            }
        };

        let mut results = Vec::new();
        for (title, url) in hits {
            match self.fetch_page(&url).await {
                Ok(text) => results.push(SearchResult {
                    title,
                    content: clamp_content(&text),
                    url,
                }),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "skipping unreachable result");
                }
            }
        }
        results
    }
}

/// 从引擎应答中取前 3 条自然结果
fn parse_organic(body: &Value) -> Vec<(String, String)> {
    body.get("organic_results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(MAX_RESULTS)
                .filter_map(|item| {
                    let title = item.get("title").and_then(Value::as_str)?;
                    let url = item.get("link").and_then(Value::as_str)?;
                    Some((title.to_string(), url.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// 截断到 MAX_CONTENT_CHARS 个字符，超出追加 ...
fn clamp_content(text: &str) -> String {
    if text.chars().count() > MAX_CONTENT_CHARS {
        let head: String = text.chars().take(MAX_CONTENT_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// HTML 响应提取可读正文，纯文本原样返回（压缩空白）
fn page_text(body: &str) -> String {
    // 去除 BOM，避免 HTML 检测失败
    let body = body.strip_prefix('\u{FEFF}').unwrap_or(body);
    if looks_like_html(body) {
        html_to_text(body)
    } else {
        body.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// 将 HTML 转为可读文本（去除 script/style 等）
fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => {
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        }
        _ => strip_html_tags(html),
    }
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
