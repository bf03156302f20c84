// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求上下文
//!
//! 一次请求从宿主进入、经过模块和处理器、再写回宿主期间共享的状态。
//! 处理器通过修改上下文中的响应来产生输出。

use std::{collections::HashMap, io::Write};

use chrono::{DateTime, Local};
use log::debug;

use crate::{
    request::Request,
    response::HttpResponse,
    trace::{TraceContext, TraceMode},
};

#[derive(Debug)]
pub struct HttpContext {
    id: u128,
    timestamp: DateTime<Local>,
    request: Request,
    response: HttpResponse,
    /// 模块与处理器之间传递数据的请求级存储
    items: HashMap<String, String>,
    trace: TraceContext,
}

impl HttpContext {
    pub fn new(request: Request, id: u128) -> Self {
        Self::with_trace(request, id, TraceContext::new(false, TraceMode::Default))
    }

    pub fn with_trace(request: Request, id: u128, trace: TraceContext) -> Self {
        Self {
            id,
            timestamp: Local::now(),
            request,
            response: HttpResponse::new(),
            items: HashMap::new(),
            trace,
        }
    }

    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut HttpResponse {
        &mut self.response
    }

    pub fn item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: &str) {
        self.items.insert(key.to_string(), value.to_string());
    }

    pub fn trace(&self) -> &TraceContext {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut TraceContext {
        &mut self.trace
    }

    /// 处理器接管上下文前留下的副本：请求、请求级存储、跟踪记录与响应头部。
    pub fn snapshot(&self) -> Self {
        Self {
            id: self.id,
            timestamp: self.timestamp,
            request: self.request.clone(),
            response: self.response.detached_copy(),
            items: self.items.clone(),
            trace: self.trace.clone(),
        }
    }

    /// 把响应写入宿主提供的输出，随后依次触发发送完毕通知。
    ///
    /// 通知在第一次发送时被取出，再次发送不会重复触发。
    pub fn send_to<W: Write>(&mut self, writer: &mut W) -> std::io::Result<usize> {
        let bytes = self.response.as_bytes();
        writer.write_all(&bytes)?;
        writer.flush()?;
        debug!("[ID{}]响应发送完毕，长度: {}", self.id, bytes.len());

        let notifications = self.response.take_end_of_send();
        for (notification, data) in notifications {
            notification(self, &data);
        }
        Ok(bytes.len())
    }
}
