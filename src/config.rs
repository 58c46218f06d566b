//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `IRIS__*` 覆盖（双下划线表示嵌套，如 `IRIS__ROUTER__CONFIDENCE_THRESHOLD=0.6`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub router: RouterSection,
    #[serde(default)]
    pub dialogue: DialogueSection,
    #[serde(default)]
    pub executor: ExecutorSection,
}

/// [app] 段：应用名与回复语言标签
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 输出语言标签（随回复一并下发给播报/渲染端）
    pub language: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            language: "en".to_string(),
        }
    }
}

/// [router] 段：置信度阈值、会话容差带、会话型意图集、自动化关键词与覆写规则
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterSection {
    /// 主阈值：confidence >= threshold 直接接受分类结果
    pub confidence_threshold: f32,
    /// 会话容差：threshold - tolerance 以内仍可接受会话型意图（寒暄等）
    pub conversational_tolerance: f32,
    /// 视为会话型（非动作）的意图标签
    pub conversational_intents: Vec<String>,
    /// 低置信兜底用的自动化关键词 -> 猜测意图
    pub automation_keywords: Vec<KeywordGuess>,
    /// 覆写规则表：先于分类器生效，按 priority 升序扫描，首个命中为准
    pub overrides: Vec<OverrideRuleEntry>,
}

/// 自动化关键词条目：utterance 含 keyword 时兜底猜测 intent
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordGuess {
    pub keyword: String,
    pub intent: String,
}

/// 覆写规则条目（大小写不敏感的子串匹配）
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideRuleEntry {
    pub pattern: String,
    pub intent: String,
    #[serde(default)]
    pub priority: u8,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            conversational_tolerance: 0.15,
            conversational_intents: default_conversational_intents(),
            automation_keywords: default_automation_keywords(),
            overrides: Vec::new(),
        }
    }
}

fn default_conversational_intents() -> Vec<String> {
    ["greeting", "smalltalk", "thanks", "goodbye", "identity", "joke"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_automation_keywords() -> Vec<KeywordGuess> {
    [
        ("open", "open_app"),
        ("launch", "open_app"),
        ("play", "play_media"),
        ("send", "send_message"),
        ("message", "send_message"),
        ("schedule", "schedule_event"),
        ("remind", "schedule_event"),
        ("search", "web_search"),
        ("remove", "reminder_remove"),
        ("delete", "reminder_remove"),
    ]
    .into_iter()
    .map(|(keyword, intent)| KeywordGuess {
        keyword: keyword.to_string(),
        intent: intent.to_string(),
    })
    .collect()
}

/// [dialogue] 段：槽位追问上限与取消短语
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialogueSection {
    /// 连续追问仍缺槽位时的最大重试轮数，超过后流程失败并复位
    pub max_slot_retries: u32,
    /// 命中即取消当前流程的短语（大小写不敏感子串）
    pub cancel_phrases: Vec<String>,
}

impl Default for DialogueSection {
    fn default() -> Self {
        Self {
            max_slot_retries: 4,
            cancel_phrases: default_cancel_phrases(),
        }
    }
}

fn default_cancel_phrases() -> Vec<String> {
    ["cancel", "never mind", "nevermind", "forget it", "stop it"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// [executor] 段：单后端重试与跨后端回退策略
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    /// 单个后端的最大尝试次数（1 表示不重试）
    pub max_attempts: u32,
    /// 首次重试前的等待（毫秒），之后按 backoff_multiplier 指数放大
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// 是否允许在后端耗尽后切换下一个后端
    pub allow_fallback: bool,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 200,
            backoff_multiplier: 2.0,
            allow_fallback: true,
        }
    }
}

/// 从 config 目录加载配置，环境变量 IRIS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 IRIS__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("IRIS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
