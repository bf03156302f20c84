// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 应用上下文
//!
//! 模块在 `init` 时向 [`HttpApplication`] 登记管道事件的处理函数，宿主在请求的各个阶段触发这些事件。
//! 同步处理函数直接修改上下文；异步处理函数按 begin/end 成对登记，建立在 [`PendingOperation`] 之上。

use std::{collections::HashMap, sync::Arc};

use log::debug;

use crate::{
    context::HttpContext,
    exception::HttpException,
    pending::{AsyncCallback, ExtraData, PendingOperation},
};

/// 请求管道中的事件，按触发顺序排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineEvent {
    BeginRequest,
    PreRequestHandlerExecute,
    PostRequestHandlerExecute,
    EndRequest,
}

pub type EventHandler = Arc<dyn Fn(&mut HttpContext) -> Result<(), HttpException> + Send + Sync>;

/// 开始一个异步事件处理，完成时回调恰好触发一次。
pub type BeginEventHandler =
    Arc<dyn Fn(&HttpContext, AsyncCallback<()>, ExtraData) -> PendingOperation<()> + Send + Sync>;

/// 结束异步事件处理并取回其中捕获的故障。
pub type EndEventHandler = Arc<dyn Fn(PendingOperation<()>) -> Result<(), HttpException> + Send + Sync>;

#[derive(Default)]
pub struct HttpApplication {
    handlers: HashMap<PipelineEvent, Vec<EventHandler>>,
    async_handlers: HashMap<PipelineEvent, Vec<(BeginEventHandler, EndEventHandler)>>,
}

impl HttpApplication {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&mut self, event: PipelineEvent, handler: EventHandler) {
        self.handlers.entry(event).or_default().push(handler);
    }

    pub fn add_async_handler(&mut self, event: PipelineEvent, begin: BeginEventHandler, end: EndEventHandler) {
        self.async_handlers.entry(event).or_default().push((begin, end));
    }

    /// 某个事件上登记的处理函数总数，包括异步处理函数。
    pub fn handler_count(&self, event: PipelineEvent) -> usize {
        self.handlers.get(&event).map_or(0, Vec::len) + self.async_handlers.get(&event).map_or(0, Vec::len)
    }

    /// 触发事件：先依次执行同步处理函数，再依次执行异步处理函数，遇到第一个错误即停止。
    pub async fn raise(&self, event: PipelineEvent, context: &mut HttpContext) -> Result<(), HttpException> {
        if let Some(handlers) = self.handlers.get(&event) {
            for handler in handlers {
                handler(context)?;
            }
        }
        if let Some(pairs) = self.async_handlers.get(&event) {
            for (begin, end) in pairs {
                let pending = begin(context, Box::new(|_| {}), None);
                pending.wait().await;
                end(pending)?;
            }
        }
        debug!("[ID{}]{:?} 事件处理完毕", context.id(), event);
        Ok(())
    }
}
