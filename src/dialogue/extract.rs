//! 槽位抽取与引用消解
//!
//! 抽取优先显式标记（"about …"、时间表达式），仅在被追问该槽位时才做位置式猜测。
//! 时间消解基于注入的参考时钟，便于测试确定性。

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use regex::Regex;

use crate::dialogue::state::ListedItem;

static CLOCK_RE: OnceLock<Regex> = OnceLock::new();
static HOUR24_RE: OnceLock<Regex> = OnceLock::new();
static SUBJECT_RE: OnceLock<Regex> = OnceLock::new();

fn clock_re() -> &'static Regex {
    // "3pm"、"3:30 pm"、"at 3pm"
    CLOCK_RE.get_or_init(|| Regex::new(r"\b(?:at\s+)?(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").unwrap())
}

fn hour24_re() -> &'static Regex {
    // "at 15"、"at 15:30"（无 am/pm 时按 24 小时制）
    HOUR24_RE.get_or_init(|| Regex::new(r"\bat\s+(\d{1,2})(?::(\d{2}))?\b").unwrap())
}

fn subject_re() -> &'static Regex {
    SUBJECT_RE.get_or_init(|| Regex::new(r"\b(?:about|titled|called|regarding)\s+(.+)$").unwrap())
}

const DAY_WORDS: &[(&str, i64)] = &[("tomorrow", 1), ("tonight", 0), ("today", 0)];

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

/// 从文本解析时间表达式，相对 now 消解为 RFC 3339 字符串
///
/// 日期词（tomorrow / today / 星期名）与钟点（3pm / at 15:30）可任意组合；
/// 只有日期时默认 09:00，"tonight" 默认 20:00；两者皆无则返回 None（留空重问）。
pub fn extract_when(text: &str, now: DateTime<Utc>) -> Option<String> {
    let mut day_offset: Option<i64> = None;
    let mut default_time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

    for (word, offset) in DAY_WORDS {
        if text.contains(word) {
            day_offset = Some(*offset);
            if *word == "tonight" {
                default_time = NaiveTime::from_hms_opt(20, 0, 0).unwrap();
            }
            break;
        }
    }
    if day_offset.is_none() {
        for (name, weekday) in WEEKDAYS {
            if text.contains(name) {
                let today = now.weekday().num_days_from_monday() as i64;
                let target = weekday.num_days_from_monday() as i64;
                let mut diff = target - today;
                if diff <= 0 {
                    diff += 7; // 下一个该星期几
                }
                day_offset = Some(diff);
                break;
            }
        }
    }

    let mut clock: Option<NaiveTime> = None;
    if let Some(caps) = clock_re().captures(text) {
        let mut hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        match &caps[3] {
            "pm" if hour < 12 => hour += 12,
            "am" if hour == 12 => hour = 0,
            _ => {}
        }
        clock = NaiveTime::from_hms_opt(hour, minute, 0);
    } else if let Some(caps) = hour24_re().captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        clock = NaiveTime::from_hms_opt(hour, minute, 0);
    }

    if day_offset.is_none() && clock.is_none() {
        return None;
    }

    let date = (now + Duration::days(day_offset.unwrap_or(0))).date_naive();
    let time = clock.unwrap_or(default_time);
    let resolved = date.and_time(time).and_utc();
    Some(resolved.to_rfc3339())
}

/// 显式标记的主题抽取："about budget review tomorrow" -> "budget review"
///
/// 标记之后若还跟着时间表达式，把时间部分截掉。
pub fn extract_subject(text: &str) -> Option<String> {
    let caps = subject_re().captures(text)?;
    let mut rest = caps[1].to_string();

    for (word, _) in DAY_WORDS {
        if let Some(pos) = rest.find(word) {
            rest.truncate(pos);
        }
    }
    for (name, _) in WEEKDAYS {
        if let Some(pos) = rest.find(name) {
            rest.truncate(pos);
        }
    }
    if let Some(m) = clock_re().find(&rest) {
        rest.truncate(m.start());
    }
    if let Some(m) = hour24_re().find(&rest) {
        rest.truncate(m.start());
    }

    let cleaned = rest.trim().trim_end_matches([',', '.', ' ']).to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// 位置式主题猜测：仅在被追问 subject 时使用，剔除时间词后的剩余文本
pub fn positional_subject(text: &str) -> Option<String> {
    let mut rest = text.to_string();
    if let Some(m) = clock_re().find(&rest) {
        rest.replace_range(m.range(), " ");
    }
    if let Some(m) = hour24_re().find(&rest) {
        rest.replace_range(m.range(), " ");
    }
    let cleaned: String = rest
        .split_whitespace()
        .filter(|w| {
            !DAY_WORDS.iter().any(|(d, _)| d == w) && !WEEKDAYS.iter().any(|(n, _)| n == w)
        })
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

const ORDINAL_WORDS: &[&str] = &[
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

/// 序数词或 1 起始的数字 -> 0 起始下标
pub fn parse_ordinal(token: &str) -> Option<usize> {
    if let Some(idx) = ORDINAL_WORDS.iter().position(|w| *w == token) {
        return Some(idx);
    }
    if let Ok(n) = token.parse::<usize>() {
        if n >= 1 {
            return Some(n - 1);
        }
    }
    None
}

/// 引用消解时跳过的虚词（"remove the second one" 中只有 "second" 有信息量）
const FILLER_WORDS: &[&str] = &[
    "remove", "delete", "the", "a", "an", "one", "that", "this", "please", "item", "reminder",
    "reminders", "task", "my", "it", "of", "from", "list", "no",
];

/// 在最近展示的有序列表中消解一条引用
///
/// 依次尝试：序数词 / 数字 -> 下标；标题子串（首个命中为准）。失败返回 None。
pub fn resolve_reference(text: &str, items: &[ListedItem]) -> Option<usize> {
    if items.is_empty() {
        return None;
    }

    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|t| !t.is_empty())
        .collect();

    for token in &tokens {
        if let Some(idx) = parse_ordinal(token) {
            if idx < items.len() {
                return Some(idx);
            }
        }
    }

    // 标题子串匹配：按列表顺序，首个命中为准
    let content: Vec<&String> = tokens
        .iter()
        .filter(|t| !FILLER_WORDS.contains(&t.as_str()))
        .collect();
    for (idx, item) in items.iter().enumerate() {
        let title = item.title.to_lowercase();
        if content.iter().any(|t| title.contains(t.as_str())) {
            return Some(idx);
        }
    }
    None
}
