use crate::{
    cache_policy::HttpCachePolicy,
    context::HttpContext,
    exception::HttpException,
    param::*,
    pending::ExtraData,
    util::HtmlBuilder,
};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::{BufMut, Bytes, BytesMut};
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error, warn};

use std::{
    fmt,
    io::{self, Write},
};

/// 响应发送完毕后触发的通知，每个通知只会被调用一次。
pub type EndOfSendNotification = Box<dyn FnOnce(&HttpContext, &ExtraData) + Send + 'static>;

/// 处理器通过上下文写入的响应。
pub struct HttpResponse {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_encoding: Option<HttpEncoding>,
    date: DateTime<Utc>,
    server_name: String,
    headers: Vec<(String, String)>,
    body: BytesMut,
    suppress_body: bool,
    cache: HttpCachePolicy,
    end_of_send: Vec<(EndOfSendNotification, ExtraData)>,
}

impl HttpResponse {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_encoding: None,
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            headers: vec![],
            body: BytesMut::new(),
            suppress_body: false,
            cache: HttpCachePolicy::default(),
            end_of_send: vec![],
        }
    }

    /// 复制状态行、头部与缓存策略，不带正文和发送完毕通知。
    pub fn detached_copy(&self) -> Self {
        Self {
            version: self.version,
            status_code: self.status_code,
            information: self.information.clone(),
            content_type: self.content_type.clone(),
            content_encoding: self.content_encoding,
            date: self.date,
            server_name: self.server_name.clone(),
            headers: self.headers.clone(),
            body: BytesMut::new(),
            suppress_body: self.suppress_body,
            cache: self.cache.clone(),
            end_of_send: vec![],
        }
    }

    pub fn set_status(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                warn!("未登记的状态码：{}", code);
                "Unknown".to_string()
            }
        };
        self
    }

    pub fn set_content_type(&mut self, content_type: &str) -> &mut Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// 设置标头，已存在的同名标头会被替换。
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn write(&mut self, text: &str) {
        self.body.put_slice(text.as_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.body.put_slice(bytes);
    }

    /// 清空已写入的正文与内容相关标头，保留缓存策略和发送通知。
    pub fn clear(&mut self) {
        self.body.clear();
        self.content_type = None;
        self.content_encoding = None;
        self.headers.clear();
    }

    /// HEAD 请求只发送标头，但 Content-Length 仍按正文计算。
    pub fn suppress_body(&mut self, suppress: bool) {
        self.suppress_body = suppress;
    }

    /// 把 `HttpException` 渲染为错误页面，覆盖此前写入的内容。
    pub fn write_exception(&mut self, exception: &HttpException) {
        self.clear();
        self.set_status(exception.status_code());
        let page = HtmlBuilder::from_status_code(exception.status_code(), Some(exception.message()));
        self.write(&page.build());
        self.content_type = Some("text/html;charset=utf-8".to_string());
        if exception.status_code() == 405 {
            self.set_header("Allow", "GET, HEAD");
        }
    }

    /// 根据客户端支持的编码压缩正文，已压缩的媒体类型保持原样。
    pub fn compress_body(&mut self, accept_encoding: &[HttpEncoding], id: u128) {
        if self.content_encoding.is_some() || self.body.is_empty() {
            return;
        }
        if let Some(mime) = &self.content_type {
            if should_skip_compression(mime) {
                debug!("[ID{}]文件类型: {}, 跳过压缩", id, mime);
                return;
            }
        }
        let encoding = match decide_encoding(accept_encoding) {
            Some(e) => e,
            None => {
                debug!("[ID{}]不进行压缩", id);
                return;
            }
        };
        match compress(&self.body, encoding) {
            Ok(compressed) => {
                self.body = BytesMut::from(&compressed[..]);
                self.content_encoding = Some(encoding);
            }
            Err(e) => error!("[ID{}]压缩正文失败: {}，返回未压缩内容", id, e),
        }
    }

    pub(crate) fn take_end_of_send(&mut self) -> Vec<(EndOfSendNotification, ExtraData)> {
        std::mem::take(&mut self.end_of_send)
    }

    pub fn add_end_of_send_notification(&mut self, notification: EndOfSendNotification, data: ExtraData) {
        self.end_of_send.push((notification, data));
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut header = String::new();
        header.push_str(&format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        ));
        if let Some(t) = &self.content_type {
            header.push_str(&["Content-Type: ", t.as_str(), CRLF].concat());
        }
        if let Some(e) = self.content_encoding {
            header.push_str(&format!("Content-Encoding: {}{}", e, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", self.body.len(), CRLF));
        header.push_str(&["Date: ", format_date(&self.date).as_str(), CRLF].concat());
        header.push_str(&["Server: ", self.server_name.as_str(), CRLF].concat());
        header.push_str(&["Cache-Control: ", self.cache.cache_control().as_str(), CRLF].concat());
        for (name, value) in &self.headers {
            header.push_str(&[name.as_str(), ": ", value.as_str(), CRLF].concat());
        }
        header.push_str(CRLF);

        let body: &[u8] = if self.suppress_body { b"" } else { &self.body };
        [header.as_bytes(), body].concat()
    }
}

impl HttpResponse {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.body)
    }

    pub fn cache(&self) -> &HttpCachePolicy {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut HttpCachePolicy {
        &mut self.cache
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status_code", &self.status_code)
            .field("content_type", &self.content_type)
            .field("content_encoding", &self.content_encoding)
            .field("body_len", &self.body.len())
            .field("cache", &self.cache)
            .finish()
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

pub(crate) fn compress(data: &[u8], mode: HttpEncoding) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let compressed = match mode {
        HttpEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()?
        }
        HttpEncoding::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()?
        }
        HttpEncoding::Br => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            output
        }
    };

    let ratio = if original_size > 0 {
        ((original_size as i64 - compressed.len() as i64) as f64 / original_size as f64) * 100.0
    } else {
        0.0
    };
    debug!(
        "压缩完成: {}, 原始大小: {} bytes, 压缩后: {} bytes, 压缩率: {:.1}%",
        mode,
        original_size,
        compressed.len(),
        ratio
    );
    Ok(compressed)
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/x-icon",
        "video/",
        "audio/",
        "application/zip",
        "application/x-7z-compressed",
        "application/gzip",
        "font/woff",
        "font/woff2",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

// 优先级：gzip > deflate > br
fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    [HttpEncoding::Gzip, HttpEncoding::Deflate, HttpEncoding::Br]
        .into_iter()
        .find(|e| accept_encoding.contains(e))
}
