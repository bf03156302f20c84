// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了处理器核心在请求生命周期中可能产生的各类错误。
//!
//! ## 设计意图
//! - **基础设施错误**：`Exception` 涵盖请求解析、路径映射与配置加载过程中的失败。
//! - **HTTP 错误**：`HttpException` 携带数值状态码与描述信息，是路由失败和处理失败
//!   向宿主运行时传播的唯一形式，由宿主负责将其渲染为线路上的响应。
//! - **解析错误**：`HttpParseException` 额外记录出错的文件名和行号。

use std::{error::Error, fmt};

use crate::param::STATUS_CODES;

/// 请求解析、路径映射和配置加载过程中发生的异常类型。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行格式不正确或使用了无法识别的 HTTP 方法。
    UnSupportedRequestMethod,
    /// 客户端使用了不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求的路径格式非法或包含越权尝试（如目录遍历）。
    InvalidPath,
    /// 配置文件不存在或无法读取。
    ConfigFileUnreadable(String),
    /// 处理器映射中的路径模式无法编译。
    InvalidRoutePattern(String),
    /// 处理器映射引用了未知的处理器类型。
    UnknownHandlerKind(String),
    /// 模块列表引用了未知的模块名。
    UnknownModule(String),
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            InvalidPath => write!(f, "Invalid path (400)"),
            ConfigFileUnreadable(name) => write!(f, "Config file {} can't be read", name),
            InvalidRoutePattern(pattern) => write!(f, "Invalid route pattern: {}", pattern),
            UnknownHandlerKind(kind) => write!(f, "Unknown handler kind: {}", kind),
            UnknownModule(name) => write!(f, "Unknown module: {}", name),
        }
    }
}

impl Error for Exception {}

/// 携带 HTTP 状态码的类型化错误。
///
/// 处理器和工厂通过返回该错误来表示失败，例如 `403 Forbidden`、`405 Method Not Allowed`。
/// 核心不会对其进行重试，也不会自行决定如何写回客户端。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpException {
    status_code: u16,
    message: String,
}

impl HttpException {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// 根据状态码构造异常，未提供描述时使用标准原因短语。
    pub fn from_status_code(status_code: u16, message: Option<&str>) -> Self {
        let message = match message {
            Some(m) => m.to_string(),
            None => STATUS_CODES
                .get(&status_code)
                .map_or_else(|| format!("HTTP {}", status_code), |s| s.to_string()),
        };
        Self {
            status_code,
            message,
        }
    }

    pub fn forbidden() -> Self {
        Self::from_status_code(403, None)
    }

    pub fn not_found() -> Self {
        Self::from_status_code(404, None)
    }

    pub fn method_not_allowed() -> Self {
        Self::from_status_code(405, None)
    }

    pub fn service_unavailable() -> Self {
        Self::from_status_code(503, None)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// 4xx 范围内的错误属于客户端错误，记录日志时使用 warn 级别。
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }
}

impl fmt::Display for HttpException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status_code, self.message)
    }
}

impl Error for HttpException {}

impl From<Exception> for HttpException {
    fn from(e: Exception) -> Self {
        let code = match e {
            RequestIsNotUtf8 | InvalidPath => 400,
            UnSupportedRequestMethod => 405,
            UnsupportedHttpVersion => 505,
            _ => 500,
        };
        HttpException::new(code, e.to_string())
    }
}

/// 解析配置或模板时发生的错误，记录出错位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpParseException {
    message: String,
    file_name: Option<String>,
    line: u32,
}

impl HttpParseException {
    pub fn new(message: impl Into<String>, file_name: Option<&str>, line: u32) -> Self {
        Self {
            message: message.into(),
            file_name: file_name.map(str::to_string),
            line,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for HttpParseException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_name {
            Some(name) => write!(f, "{} ({}:{})", self.message, name, self.line),
            None => write!(f, "{} (line {})", self.message, self.line),
        }
    }
}

impl Error for HttpParseException {}

impl From<HttpParseException> for HttpException {
    fn from(e: HttpParseException) -> Self {
        HttpException::internal(e.to_string())
    }
}
