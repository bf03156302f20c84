// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求模块
//!
//! 宿主运行时交给处理器的请求视图。可以从原始字节解析得到，
//! 也可以由宿主直接构造（例如宿主已经完成了协议解析）。
//! 1. 请求行（方法、目标、版本）的解析。
//! 2. 常用标头的提取，其余标头原样保留，按名称大小写不敏感查询。

use crate::{exception::Exception, param::*};
use log::error;

/// 一个 HTTP 请求的元数据。请求体不在此结构中保存。
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 请求目标（包含查询字符串）
    path: String,
    version: HttpVersion,
    user_agent: String,
    host: Option<String>,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    accept: Option<String>,
    headers: Vec<(String, String)>,
}

impl Request {
    /// 直接构造一个请求，其余字段为空。
    pub fn new(method: HttpRequestMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            version: HttpVersion::V1_1,
            user_agent: String::new(),
            host: None,
            accept_encoding: vec![],
            accept: None,
            headers: vec![],
        }
    }

    /// 追加一个标头，同时更新对应的快捷字段。
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.apply_header(name, value);
        self
    }

    /// 从原始字节缓冲区构建 `Request`。
    ///
    /// # 错误处理
    /// 非 UTF-8 数据、无法识别的方法或不支持的版本将返回相应的 `Exception`。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        // 请求头在第一个空行处结束，之后是请求体
        let head = request_string
            .split(&[CRLF, CRLF].concat())
            .next()
            .unwrap_or_default();
        let mut request_lines = head.split(CRLF);

        // 解析请求行 (e.g., "GET /index.html HTTP/1.1")
        let request_line = request_lines.next().unwrap_or_default();
        let parts: Vec<&str> = request_line.split(' ').filter(|p| !p.is_empty()).collect();
        if parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::UnSupportedRequestMethod);
        }

        let method = match HttpRequestMethod::parse(parts[0]) {
            Some(m) => m,
            None => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, parts[0]);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version = match parts[parts.len() - 1].to_ascii_uppercase().as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            other => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, other);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 路径中可能包含空格，虽然不规范但通过 join 尝试恢复
        let path = parts[1..parts.len() - 1].join(" ");

        let mut request = Self::new(method, &path);
        request.version = version;
        for line in request_lines {
            if let Some((name, value)) = line.split_once(':') {
                request.apply_header(name.trim(), value.trim());
            }
        }
        Ok(request)
    }

    fn apply_header(&mut self, name: &str, value: &str) {
        match name.to_ascii_lowercase().as_str() {
            "user-agent" => self.user_agent = value.to_string(),
            "host" => self.host = Some(value.to_string()),
            "accept" => self.accept = Some(value.to_string()),
            "accept-encoding" => {
                // 只要包含关键词即视为支持
                self.accept_encoding.clear();
                if value.contains("gzip") {
                    self.accept_encoding.push(HttpEncoding::Gzip);
                }
                if value.contains("deflate") {
                    self.accept_encoding.push(HttpEncoding::Deflate);
                }
                if value.contains("br") {
                    self.accept_encoding.push(HttpEncoding::Br);
                }
            }
            _ => {}
        }
        self.headers.push((name.to_string(), value.to_string()));
    }
}

impl Request {
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// 获取请求目标（含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取去掉查询字符串后的路径部分
    pub fn url_path(&self) -> &str {
        match self.path.split_once('?') {
            Some((p, _)) => p,
            None => &self.path,
        }
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// 按名称（大小写不敏感）查询标头，返回第一个匹配值
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
