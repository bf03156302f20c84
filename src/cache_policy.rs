// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 缓存控制
//!
//! `Cache-Control` 指令的词汇以及每个响应携带的缓存策略。
//!
//! `HttpCacheability` 的序数从 1 开始连续递增，必须与线路兼容地保持不变；
//! 序数大小并不表示限制强弱（`Public` 序数最大但限制最弱），因此不实现 `Ord`。

use std::{fmt, sync::Arc, time::Duration};

use serde_derive::{Deserialize, Serialize};

use crate::{context::HttpContext, pending::ExtraData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HttpCacheability {
    NoCache = 1,
    Private = 2,
    Server = 3,
    Public = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HttpCacheRevalidation {
    AllCaches = 1,
    ProxyCaches = 2,
    None = 3,
}

/// 缓存验证回调的结论。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HttpValidationStatus {
    Invalid = 1,
    IgnoreThisRequest = 2,
    Valid = 3,
}

impl HttpCacheability {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            1 => Some(HttpCacheability::NoCache),
            2 => Some(HttpCacheability::Private),
            3 => Some(HttpCacheability::Server),
            4 => Some(HttpCacheability::Public),
            _ => None,
        }
    }

    /// 发送给下游缓存的指令。`Server` 只允许源服务器缓存，对下游等同于 `no-cache`。
    pub fn directive(self) -> &'static str {
        match self {
            HttpCacheability::NoCache | HttpCacheability::Server => "no-cache",
            HttpCacheability::Private => "private",
            HttpCacheability::Public => "public",
        }
    }
}

impl HttpCacheRevalidation {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            1 => Some(HttpCacheRevalidation::AllCaches),
            2 => Some(HttpCacheRevalidation::ProxyCaches),
            3 => Some(HttpCacheRevalidation::None),
            _ => None,
        }
    }

    pub fn directive(self) -> Option<&'static str> {
        match self {
            HttpCacheRevalidation::AllCaches => Some("must-revalidate"),
            HttpCacheRevalidation::ProxyCaches => Some("proxy-revalidate"),
            HttpCacheRevalidation::None => None,
        }
    }
}

/// 缓存验证回调，判断某个请求能否使用已缓存的响应。
pub type HttpCacheValidateHandler =
    Arc<dyn Fn(&HttpContext, &ExtraData) -> HttpValidationStatus + Send + Sync>;

#[derive(Clone)]
pub struct HttpCachePolicy {
    cacheability: HttpCacheability,
    revalidation: HttpCacheRevalidation,
    max_age: Option<Duration>,
    validators: Vec<(HttpCacheValidateHandler, ExtraData)>,
}

impl HttpCachePolicy {
    pub fn new(cacheability: HttpCacheability) -> Self {
        Self {
            cacheability,
            revalidation: HttpCacheRevalidation::None,
            max_age: None,
            validators: vec![],
        }
    }

    pub fn cacheability(&self) -> HttpCacheability {
        self.cacheability
    }

    pub fn set_cacheability(&mut self, cacheability: HttpCacheability) -> &mut Self {
        self.cacheability = cacheability;
        self
    }

    pub fn revalidation(&self) -> HttpCacheRevalidation {
        self.revalidation
    }

    pub fn set_revalidation(&mut self, revalidation: HttpCacheRevalidation) -> &mut Self {
        self.revalidation = revalidation;
        self
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    pub fn set_max_age(&mut self, max_age: Option<Duration>) -> &mut Self {
        self.max_age = max_age;
        self
    }

    pub fn add_validation_callback(&mut self, handler: HttpCacheValidateHandler, data: ExtraData) {
        self.validators.push((handler, data));
    }

    /// 依次调用所有验证回调：任一回调判定无效即为无效，
    /// 其次任一回调要求忽略本次请求即为忽略，否则有效。
    pub fn validate(&self, context: &HttpContext) -> HttpValidationStatus {
        let mut status = HttpValidationStatus::Valid;
        for (handler, data) in &self.validators {
            match handler(context, data) {
                HttpValidationStatus::Invalid => return HttpValidationStatus::Invalid,
                HttpValidationStatus::IgnoreThisRequest => {
                    status = HttpValidationStatus::IgnoreThisRequest
                }
                HttpValidationStatus::Valid => {}
            }
        }
        status
    }

    /// 渲染 `Cache-Control` 标头的值。
    pub fn cache_control(&self) -> String {
        let mut directives = vec![self.cacheability.directive().to_string()];
        if let Some(d) = self.revalidation.directive() {
            directives.push(d.to_string());
        }
        // no-cache 下 max-age 没有意义
        if let (Some(age), false) = (self.max_age, self.cacheability.directive() == "no-cache") {
            directives.push(format!("max-age={}", age.as_secs()));
        }
        directives.join(", ")
    }
}

impl Default for HttpCachePolicy {
    fn default() -> Self {
        Self::new(HttpCacheability::Private)
    }
}

impl fmt::Debug for HttpCachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCachePolicy")
            .field("cacheability", &self.cacheability)
            .field("revalidation", &self.revalidation)
            .field("max_age", &self.max_age)
            .field("validators", &self.validators.len())
            .finish()
    }
}
