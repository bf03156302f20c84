// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;

use crate::{
    cache_policy::{HttpCacheRevalidation, HttpCacheability, HttpCachePolicy},
    exception::{Exception, HttpParseException},
    trace::TraceMode,
};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_www_root")]
    www_root: String,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_cache_size")]
    cache_size: usize,
    #[serde(default = "default_max_cached_file_size")]
    max_cached_file_size: u64,
    #[serde(default = "default_true")]
    compression: bool,
    #[serde(default = "default_pool_capacity")]
    pool_capacity: usize,
    #[serde(default)]
    trace: TraceConfig,
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default = "default_handlers")]
    handlers: Vec<HandlerMapping>,
    #[serde(default = "default_modules")]
    modules: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TraceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: TraceMode,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cacheability")]
    pub cacheability: HttpCacheability,
    #[serde(default = "default_revalidation")]
    pub revalidation: HttpCacheRevalidation,
    /// 秒
    #[serde(default)]
    pub max_age: Option<u64>,
}

/// 一条处理器映射：方法列表、路径模式与处理器类型。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HandlerMapping {
    pub verb: String,
    pub path: String,
    pub kind: String,
}

fn default_www_root() -> String {
    ".".to_string()
}

fn default_cache_size() -> usize {
    5
}

fn default_max_cached_file_size() -> u64 {
    1048576 // 1MB
}

fn default_true() -> bool {
    true
}

fn default_pool_capacity() -> usize {
    8
}

fn default_cacheability() -> HttpCacheability {
    HttpCacheability::Private
}

fn default_revalidation() -> HttpCacheRevalidation {
    HttpCacheRevalidation::None
}

fn default_handlers() -> Vec<HandlerMapping> {
    vec![
        HandlerMapping {
            verb: "*".to_string(),
            path: "*.toml".to_string(),
            kind: "forbidden".to_string(),
        },
        HandlerMapping {
            verb: "GET,HEAD".to_string(),
            path: "*".to_string(),
            kind: "static_file".to_string(),
        },
    ]
}

fn default_modules() -> Vec<String> {
    vec!["access_log".to_string()]
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cacheability: default_cacheability(),
            revalidation: default_revalidation(),
            max_age: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: default_www_root(),
            worker_threads: 0,
            cache_size: default_cache_size(),
            max_cached_file_size: default_max_cached_file_size(),
            compression: true,
            pool_capacity: default_pool_capacity(),
            trace: TraceConfig::default(),
            cache: CacheConfig::default(),
            handlers: default_handlers(),
            modules: default_modules(),
        }
    }

    /// 从 TOML 文件加载配置。文件无法读取时返回错误；内容无法解析时记录错误并使用默认配置。
    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename).map_err(|e| {
            error!("无法打开配置文件{}：{}", filename, e);
            Exception::ConfigFileUnreadable(filename.to_string())
        })?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val).map_err(|e| {
            error!("读取配置文件{}时出错：{}", filename, e);
            Exception::ConfigFileUnreadable(filename.to_string())
        })?;
        Ok(Self::from_str_or_default(&str_val, Some(filename)))
    }

    pub fn from_str_or_default(content: &str, file_name: Option<&str>) -> Self {
        let raw_config = match Self::parse(content, file_name) {
            Ok(c) => c,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        raw_config.normalized()
    }

    /// 解析配置文本，失败时给出出错的行号。
    pub fn parse(content: &str, file_name: Option<&str>) -> Result<Self, HttpParseException> {
        toml::from_str::<Config>(content).map_err(|e| {
            let line = e
                .span()
                .map(|span| content[..span.start.min(content.len())].matches('\n').count() + 1)
                .unwrap_or(0);
            HttpParseException::new(e.message(), file_name, line as u32)
        })
    }

    fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.cache_size == 0 {
            warn!("cache_size被设置为0，但目前尚不支持禁用缓存，因此该值将被改为5。");
            self.cache_size = 5;
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn max_cached_file_size(&self) -> u64 {
        self.max_cached_file_size
    }

    pub fn compression(&self) -> bool {
        self.compression
    }

    pub fn pool_capacity(&self) -> usize {
        self.pool_capacity
    }

    pub fn trace(&self) -> &TraceConfig {
        &self.trace
    }

    pub fn handlers(&self) -> &[HandlerMapping] {
        &self.handlers
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// 每个响应初始携带的缓存策略
    pub fn cache_policy(&self) -> HttpCachePolicy {
        let mut policy = HttpCachePolicy::new(self.cache.cacheability);
        policy
            .set_revalidation(self.cache.revalidation)
            .set_max_age(self.cache.max_age.map(std::time::Duration::from_secs));
        policy
    }
}
