// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求跟踪
//!
//! 每个请求携带一个 [`TraceContext`]，处理器和模块可以写入带分类的跟踪消息。
//! 输出顺序由 [`TraceMode`] 决定。

use std::time::{Duration, Instant};

use log::debug;
use serde_derive::{Deserialize, Serialize};

/// 跟踪信息的输出顺序。`Default` 等同于按时间排序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TraceMode {
    SortByTime = 0,
    SortByCategory = 1,
    #[default]
    Default = 2,
}

/// 一条跟踪记录。
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    category: String,
    message: String,
    is_warning: bool,
    /// 距离请求开始的微秒数
    elapsed_us: u128,
    #[serde(skip)]
    sequence: usize,
}

impl TraceEntry {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_warning(&self) -> bool {
        self.is_warning
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.elapsed_us as u64)
    }
}

#[derive(Debug, Clone)]
pub struct TraceContext {
    enabled: bool,
    mode: TraceMode,
    started: Instant,
    entries: Vec<TraceEntry>,
}

impl TraceContext {
    pub fn new(enabled: bool, mode: TraceMode) -> Self {
        Self {
            enabled,
            mode,
            started: Instant::now(),
            entries: vec![],
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mode(&self) -> TraceMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TraceMode) {
        self.mode = mode;
    }

    pub fn write(&mut self, category: &str, message: &str) {
        self.push(category, message, false);
    }

    pub fn warn(&mut self, category: &str, message: &str) {
        self.push(category, message, true);
    }

    fn push(&mut self, category: &str, message: &str, is_warning: bool) {
        if !self.enabled {
            return;
        }
        debug!("[trace:{}] {}", category, message);
        let sequence = self.entries.len();
        self.entries.push(TraceEntry {
            category: category.to_string(),
            message: message.to_string(),
            is_warning,
            elapsed_us: self.started.elapsed().as_micros(),
            sequence,
        });
    }

    /// 按当前模式排序后的跟踪记录。同一分类内保持写入顺序。
    pub fn entries(&self) -> Vec<&TraceEntry> {
        let mut entries: Vec<&TraceEntry> = self.entries.iter().collect();
        match self.mode {
            TraceMode::SortByCategory => {
                entries.sort_by(|a, b| a.category.cmp(&b.category).then(a.sequence.cmp(&b.sequence)))
            }
            TraceMode::SortByTime | TraceMode::Default => entries.sort_by_key(|e| e.sequence),
        }
        entries
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "mode": self.mode,
            "entries": self.entries(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_ordinals() {
        assert_eq!(TraceMode::SortByTime as u8, 0);
        assert_eq!(TraceMode::SortByCategory as u8, 1);
        assert_eq!(TraceMode::Default as u8, 2);
        assert_eq!(TraceMode::default(), TraceMode::Default);
    }

    #[test]
    fn test_sort_by_time_keeps_write_order() {
        let mut trace = TraceContext::new(true, TraceMode::SortByTime);
        trace.write("b", "first");
        trace.write("a", "second");
        let messages: Vec<&str> = trace.entries().iter().map(|e| e.message()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[test]
    fn test_sort_by_category_is_stable() {
        let mut trace = TraceContext::new(true, TraceMode::SortByCategory);
        trace.write("module", "m1");
        trace.warn("handler", "h1");
        trace.write("module", "m2");
        trace.write("handler", "h2");
        let messages: Vec<&str> = trace.entries().iter().map(|e| e.message()).collect();
        assert_eq!(messages, vec!["h1", "h2", "m1", "m2"]);
        assert!(trace.entries()[0].is_warning());
    }

    #[test]
    fn test_disabled_trace_records_nothing() {
        let mut trace = TraceContext::new(false, TraceMode::Default);
        trace.write("x", "y");
        assert!(trace.entries().is_empty());
    }

    #[test]
    fn test_json_export() {
        let mut trace = TraceContext::new(true, TraceMode::SortByCategory);
        trace.write("handler", "ok");
        let json = trace.to_json();
        assert_eq!(json["mode"], "sort_by_category");
        assert_eq!(json["entries"][0]["category"], "handler");
        assert_eq!(json["entries"][0]["is_warning"], false);
    }
}
