// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 异步处理器契约
//!
//! `begin_process_request` 立即返回一个挂起句柄，处理完成时回调恰好触发一次；
//! 宿主在回调之后调用 `end_process_request` 取回上下文或重新抛出故障。
//!
//! begin 可能把处理放到别的任务上，也可能在返回前就同步完成，调用方不能假设其中任何一种；
//! 回调也可能在与 begin 不同的线程上执行。

use std::{future::Future, pin::Pin, sync::Arc};

use log::{debug, error};
use tokio::runtime::Handle;

use crate::{
    context::HttpContext,
    exception::HttpException,
    handler::HttpHandler,
    pending::{AsyncCallback, ExtraData, PendingOperation},
};

/// 一个装箱的、可跨线程发送的 future。
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 处理请求的挂起句柄，完成时交还上下文。
pub type PendingRequest = PendingOperation<HttpContext>;

pub trait AsyncHttpHandler: HttpHandler {
    /// 开始处理请求。上下文的所有权转移给处理过程，完成后经由句柄交还。
    fn begin_process_request(
        &self,
        context: HttpContext,
        callback: AsyncCallback<HttpContext>,
        extra_data: ExtraData,
    ) -> PendingRequest;

    /// 取回处理结果。每次 begin 必须且只能对应一次 end，并且只能在完成之后调用。
    fn end_process_request(&self, handle: PendingRequest) -> Result<HttpContext, HttpException> {
        handle.end()
    }
}

type RequestFn = dyn Fn(HttpContext) -> BoxFuture<'static, Result<HttpContext, HttpException>> + Send + Sync;

/// 把异步闭包适配为异步处理器，处理过程在当前 tokio 运行时上执行。
#[derive(Clone)]
pub struct AsyncFnHandler {
    name: String,
    reusable: bool,
    runner: Arc<RequestFn>,
}

impl AsyncFnHandler {
    pub fn new<F, Fut>(name: &str, reusable: bool, f: F) -> Self
    where
        F: Fn(HttpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpContext, HttpException>> + Send + 'static,
    {
        let runner: Arc<RequestFn> = Arc::new(
            move |ctx: HttpContext| -> BoxFuture<'static, Result<HttpContext, HttpException>> {
                Box::pin(f(ctx))
            },
        );
        Self {
            name: name.to_string(),
            reusable,
            runner,
        }
    }
}

impl HttpHandler for AsyncFnHandler {
    fn is_reusable(&self) -> bool {
        self.reusable
    }

    /// 该处理器只能通过 begin/end 调用。
    fn process_request(&self, context: &mut HttpContext) -> Result<(), HttpException> {
        error!("[ID{}]{} 只支持异步调用", context.id(), self.name);
        Err(HttpException::internal(format!(
            "{} does not support synchronous processing",
            self.name
        )))
    }

    fn as_async(&self) -> Option<&dyn AsyncHttpHandler> {
        Some(self)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl AsyncHttpHandler for AsyncFnHandler {
    fn begin_process_request(
        &self,
        context: HttpContext,
        callback: AsyncCallback<HttpContext>,
        extra_data: ExtraData,
    ) -> PendingRequest {
        let id = context.id();
        let (pending, completer) = PendingOperation::new(callback, extra_data);
        match Handle::try_current() {
            Ok(runtime) => {
                debug!("[ID{}]{} 开始异步处理", id, self.name);
                let fut = (self.runner)(context);
                runtime.spawn(async move {
                    let result = fut.await;
                    completer.complete(result);
                });
            }
            Err(e) => {
                error!("[ID{}]没有可用的异步运行时: {}", id, e);
                completer.complete(Err(HttpException::internal("no async runtime available")));
            }
        }
        pending
    }
}
