// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求处理器契约
//!
//! 处理器是"能把一个请求处理完毕"的单元。宿主通过工厂获得处理器后，
//! 先用 [`HttpHandler::as_async`] 判断它是否支持异步调用，再选择同步或 begin/end 路径。
//!
//! 处理器可能在宿主分配的任意工作线程上运行，不得假设线程亲和性。

use log::debug;

use crate::{async_handler::AsyncHttpHandler, context::HttpContext, exception::HttpException};

pub trait HttpHandler: Send + Sync {
    /// 实例能否被放回池中跨请求复用。调用没有副作用。
    fn is_reusable(&self) -> bool;

    /// 同步处理请求，通过修改上下文中的响应产生输出。
    ///
    /// 失败时返回携带状态码的 `HttpException`，由宿主负责渲染。
    fn process_request(&self, context: &mut HttpContext) -> Result<(), HttpException>;

    /// 异步能力检查。支持 begin/end 协议的处理器返回自身。
    fn as_async(&self) -> Option<&dyn AsyncHttpHandler> {
        None
    }

    /// 用于日志的名称
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// 对任何请求都返回 `403 Forbidden` 的处理器，通常映射到不允许直接访问的文件类型。
#[derive(Debug, Default, Clone, Copy)]
pub struct ForbiddenHandler;

impl HttpHandler for ForbiddenHandler {
    fn is_reusable(&self) -> bool {
        true
    }

    fn process_request(&self, context: &mut HttpContext) -> Result<(), HttpException> {
        debug!("[ID{}]禁止访问：{}", context.id(), context.request().path());
        Err(HttpException::forbidden())
    }

    fn name(&self) -> &str {
        "ForbiddenHandler"
    }
}

/// 对任何请求都返回 `405 Method Not Allowed` 的处理器，路径匹配但方法不匹配时由工厂返回。
#[derive(Debug, Default, Clone, Copy)]
pub struct MethodNotAllowedHandler;

impl HttpHandler for MethodNotAllowedHandler {
    fn is_reusable(&self) -> bool {
        true
    }

    fn process_request(&self, context: &mut HttpContext) -> Result<(), HttpException> {
        debug!(
            "[ID{}]不允许的请求方法：{} {}",
            context.id(),
            context.request().method(),
            context.request().path()
        );
        Err(HttpException::method_not_allowed())
    }

    fn name(&self) -> &str {
        "MethodNotAllowedHandler"
    }
}
