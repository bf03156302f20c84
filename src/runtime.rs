// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 宿主驱动
//!
//! [`HttpRuntime`] 按约定驱动一次请求：触发管道事件、映射路径、向工厂取处理器、
//! 根据能力选择同步或 begin/end 调用、归还处理器，并把任何 `HttpException` 渲染为响应。
//! 连接与传输不在这里处理，调用方拿到 [`HttpContext`] 后自行发送。

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Instant,
};

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use tokio::sync::oneshot;

use crate::{
    application::{HttpApplication, PipelineEvent},
    cache_policy::{HttpCacheability, HttpCachePolicy, HttpValidationStatus},
    config::Config,
    context::HttpContext,
    exception::{Exception, HttpException},
    factory::{HandlerFactory, HttpHandlerFactory},
    map_path::{MapPath, RootMapPath},
    module::ModuleCollection,
    param::HttpRequestMethod,
    process::{ProcessInfo, ProcessShutdownReason, ProcessStatus},
    request::Request,
    static_file::PATH_TRANSLATED_ITEM,
    trace::{TraceContext, TraceMode},
};

pub struct HttpRuntime {
    factory: Arc<dyn HttpHandlerFactory>,
    map_path: Arc<dyn MapPath>,
    application: HttpApplication,
    modules: Mutex<ModuleCollection>,
    trace_enabled: bool,
    trace_mode: TraceMode,
    cache_policy: HttpCachePolicy,
    start_time: DateTime<Local>,
    next_id: AtomicU64,
    request_count: AtomicU64,
    status: Mutex<(ProcessStatus, ProcessShutdownReason)>,
}

impl HttpRuntime {
    /// 创建运行时并初始化所有模块。
    pub fn new(
        factory: Arc<dyn HttpHandlerFactory>,
        map_path: Arc<dyn MapPath>,
        mut modules: ModuleCollection,
    ) -> Self {
        let mut application = HttpApplication::new();
        modules.init_all(&mut application);
        Self {
            factory,
            map_path,
            application,
            modules: Mutex::new(modules),
            trace_enabled: false,
            trace_mode: TraceMode::Default,
            cache_policy: HttpCachePolicy::default(),
            start_time: Local::now(),
            next_id: AtomicU64::new(0),
            request_count: AtomicU64::new(0),
            status: Mutex::new((ProcessStatus::Alive, ProcessShutdownReason::None)),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Exception> {
        let factory = HandlerFactory::from_config(config)?;
        let modules = ModuleCollection::from_names(config.modules())?;
        info!("www root: {}", config.www_root());
        Ok(Self::new(
            Arc::new(factory),
            Arc::new(RootMapPath::new(config.www_root())),
            modules,
        )
        .with_trace(config.trace().enabled, config.trace().mode)
        .with_cache_policy(config.cache_policy()))
    }

    pub fn with_trace(mut self, enabled: bool, mode: TraceMode) -> Self {
        self.trace_enabled = enabled;
        self.trace_mode = mode;
        self
    }

    /// 每个响应初始携带的缓存策略
    pub fn with_cache_policy(mut self, policy: HttpCachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn physical_application_path(&self) -> &Path {
        self.map_path.physical_application_path()
    }

    fn lock_status(&self) -> MutexGuard<'_, (ProcessStatus, ProcessShutdownReason)> {
        match self.status.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("运行时状态锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    pub fn status(&self) -> ProcessStatus {
        self.lock_status().0
    }

    pub fn process_info(&self) -> ProcessInfo {
        let (status, reason) = *self.lock_status();
        ProcessInfo::new(
            self.start_time,
            self.request_count.load(Ordering::Relaxed),
            status,
            reason,
        )
    }

    /// 停止接受新请求并释放所有模块。只有第一次调用生效。
    pub fn shutdown(&self, reason: ProcessShutdownReason) {
        {
            let mut status = self.lock_status();
            if status.0 != ProcessStatus::Alive {
                warn!("运行时已处于{:?}状态，忽略停机请求", status.0);
                return;
            }
            *status = (ProcessStatus::ShuttingDown, reason);
        }
        info!("运行时开始停机，原因：{:?}", reason);

        let mut modules = match self.modules.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("模块集合的锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        modules.dispose_all();
        drop(modules);

        self.lock_status().0 = ProcessStatus::ShutDown;
        info!("运行时已停机");
    }

    /// 处理一个请求，返回可以直接发送的上下文。
    pub async fn execute(&self, request: Request) -> HttpContext {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) as u128;
        let start_time = Instant::now();
        let method = request.method();
        let mut ctx = self.new_context(request, id);

        if self.status() != ProcessStatus::Alive {
            warn!("[ID{}]运行时不在运行状态，返回503", id);
            ctx.response_mut().write_exception(&HttpException::service_unavailable());
            return ctx;
        }
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let (mut ctx, failure) = self.run_pipeline(ctx).await;
        if let Some(e) = failure {
            if e.is_client_error() {
                warn!("[ID{}]请求处理失败：{}", id, e);
            } else {
                error!("[ID{}]请求处理失败：{}", id, e);
            }
            ctx.trace_mut().warn("webhandler", &e.to_string());
            ctx.response_mut().write_exception(&e);
        }

        if let Err(e) = self.application.raise(PipelineEvent::EndRequest, &mut ctx).await {
            error!("[ID{}]EndRequest 事件处理失败：{}", id, e);
        }

        match ctx.response().cache().validate(&ctx) {
            HttpValidationStatus::Valid => {}
            status => {
                debug!("[ID{}]缓存验证结果为{:?}，响应不可缓存", id, status);
                ctx.response_mut().cache_mut().set_cacheability(HttpCacheability::NoCache);
            }
        }
        if method == HttpRequestMethod::Head {
            ctx.response_mut().suppress_body(true);
        }

        debug!(
            "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
            id,
            start_time.elapsed().as_millis()
        );
        ctx
    }

    fn new_context(&self, request: Request, id: u128) -> HttpContext {
        let trace = TraceContext::new(self.trace_enabled, self.trace_mode);
        let mut ctx = HttpContext::with_trace(request, id, trace);
        *ctx.response_mut().cache_mut() = self.cache_policy.clone();
        ctx
    }

    /// 从 BeginRequest 执行到 PostRequestHandlerExecute。处理器一旦取出就恰好归还一次。
    async fn run_pipeline(&self, mut ctx: HttpContext) -> (HttpContext, Option<HttpException>) {
        let id = ctx.id();
        if let Err(e) = self.application.raise(PipelineEvent::BeginRequest, &mut ctx).await {
            return (ctx, Some(e));
        }

        let path_translated: PathBuf = match self.map_path.map_path(ctx.request().path()) {
            Ok(p) => p,
            Err(e) => {
                warn!("[ID{}]请求的路径：{} 无法映射：{}", id, ctx.request().path(), e);
                return (ctx, Some(e.into()));
            }
        };
        debug!("[ID{}]映射物理路径：{}", id, path_translated.display());
        ctx.set_item(PATH_TRANSLATED_ITEM, &path_translated.to_string_lossy());

        let method = ctx.request().method();
        let url = ctx.request().path().to_string();
        let handler = match self.factory.get_handler(&ctx, method, &url, &path_translated) {
            Ok(h) => h,
            Err(e) => return (ctx, Some(e)),
        };

        if let Err(e) = self
            .application
            .raise(PipelineEvent::PreRequestHandlerExecute, &mut ctx)
            .await
        {
            self.factory.release_handler(handler);
            return (ctx, Some(e));
        }

        let outcome = match handler.as_async() {
            Some(async_handler) => {
                debug!("[ID{}]{} 以异步方式处理", id, handler.name());
                // 故障时上下文随处理过程一起丢失，留一份副本用于渲染错误
                let snapshot = ctx.snapshot();
                let (tx, rx) = oneshot::channel();
                let pending = async_handler.begin_process_request(
                    ctx,
                    Box::new(move |_| {
                        let _ = tx.send(());
                    }),
                    None,
                );
                let _ = rx.await;
                // 回调发出信号时可能尚未返回，等它执行完毕再 end
                pending.wait().await;
                match async_handler.end_process_request(pending) {
                    Ok(c) => Ok(c),
                    Err(e) => Err((snapshot, e)),
                }
            }
            None => match handler.process_request(&mut ctx) {
                Ok(()) => Ok(ctx),
                Err(e) => Err((ctx, e)),
            },
        };
        self.factory.release_handler(handler);

        let mut ctx = match outcome {
            Ok(c) => c,
            Err((c, e)) => return (c, Some(e)),
        };
        if let Err(e) = self
            .application
            .raise(PipelineEvent::PostRequestHandlerExecute, &mut ctx)
            .await
        {
            return (ctx, Some(e));
        }
        (ctx, None)
    }
}

impl Drop for HttpRuntime {
    fn drop(&mut self) {
        if self.status() == ProcessStatus::Alive {
            self.shutdown(ProcessShutdownReason::None);
        }
    }
}
