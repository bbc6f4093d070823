//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MNEMO__*` 覆盖（双下划线表示嵌套，如 `MNEMO__LLM__MODEL=...`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub search: SearchSection,
    pub history: HistorySection,
}

/// [llm] 段：后端选择、端点与模型
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai（任意 OpenAI 兼容端点）/ mock（离线回显）
    pub provider: String,
    /// OpenAI 兼容端点；默认指向 HuggingFace 路由
    pub base_url: Option<String>,
    pub model: String,
    /// 未设置时依次回退 MNEMO_API_KEY / OPENAI_API_KEY / HF_TOKEN 环境变量
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: Some("https://router.huggingface.co/v1".to_string()),
            model: "openai/gpt-oss-120b".to_string(),
            api_key: None,
        }
    }
}

/// [search] 段：搜索引擎端点与抓取超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// SerpApi 风格的搜索端点
    pub endpoint: String,
    /// 未设置时回退 SERPAPI_API_KEY 环境变量
    pub api_key: Option<String>,
    /// 单次 HTTP 请求超时（秒），对搜索引擎与网页抓取均生效
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: "https://serpapi.com/search.json".to_string(),
            api_key: None,
            timeout_secs: 20,
        }
    }
}

/// [history] 段：会话自动保存目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    /// 每轮对话后 {name}_history.json 写入的目录
    pub dir: PathBuf,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("histories"),
        }
    }
}

/// 从 config 目录加载配置，环境变量 MNEMO__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MNEMO__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MNEMO")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
