// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 管道模块
//!
//! 模块的生命周期只有一次转换链：未初始化 -> 已初始化 -> 已释放，模块不会被重新初始化。
//! [`ModuleCollection`] 为每个模块记录状态，重复 `init` 或重复 `dispose` 只记录警告并忽略，
//! 不会再次调用模块，避免破坏共享状态。

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use log::{debug, info, warn};

use crate::{
    application::{HttpApplication, PipelineEvent},
    context::HttpContext,
    exception::Exception,
};

pub trait HttpModule: Send {
    fn name(&self) -> &str;

    /// 绑定到应用上下文，并登记需要的管道事件。
    fn init(&mut self, application: &mut HttpApplication);

    /// 释放模块持有的资源。
    fn dispose(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Uninitialized,
    Initialized,
    Disposed,
}

struct ModuleSlot {
    module: Box<dyn HttpModule>,
    state: ModuleState,
}

#[derive(Default)]
pub struct ModuleCollection {
    slots: Vec<ModuleSlot>,
}

impl ModuleCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按名称构造内置模块集合。
    pub fn from_names(names: &[String]) -> Result<Self, Exception> {
        let mut modules = Self::new();
        for name in names {
            let module: Box<dyn HttpModule> = match name.as_str() {
                "access_log" => Box::new(AccessLogModule::new()),
                "trace" => Box::new(TraceModule),
                other => return Err(Exception::UnknownModule(other.to_string())),
            };
            modules.add(module);
        }
        Ok(modules)
    }

    pub fn add(&mut self, module: Box<dyn HttpModule>) -> usize {
        self.slots.push(ModuleSlot {
            module,
            state: ModuleState::Uninitialized,
        });
        self.slots.len() - 1
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn state(&self, index: usize) -> Option<ModuleState> {
        self.slots.get(index).map(|s| s.state)
    }

    pub fn names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.module.name()).collect()
    }

    /// 初始化单个模块。返回模块是否真的被初始化。
    pub fn init(&mut self, index: usize, application: &mut HttpApplication) -> bool {
        let slot = match self.slots.get_mut(index) {
            Some(s) => s,
            None => return false,
        };
        if slot.state != ModuleState::Uninitialized {
            warn!("模块 {} 处于 {:?} 状态，忽略重复的初始化", slot.module.name(), slot.state);
            return false;
        }
        slot.module.init(application);
        slot.state = ModuleState::Initialized;
        info!("模块 {} 初始化完成", slot.module.name());
        true
    }

    pub fn init_all(&mut self, application: &mut HttpApplication) {
        for index in 0..self.slots.len() {
            self.init(index, application);
        }
    }

    /// 释放单个模块。只有已初始化的模块会被释放。
    pub fn dispose(&mut self, index: usize) -> bool {
        let slot = match self.slots.get_mut(index) {
            Some(s) => s,
            None => return false,
        };
        if slot.state != ModuleState::Initialized {
            warn!("模块 {} 处于 {:?} 状态，忽略释放请求", slot.module.name(), slot.state);
            return false;
        }
        slot.module.dispose();
        slot.state = ModuleState::Disposed;
        info!("模块 {} 已释放", slot.module.name());
        true
    }

    pub fn dispose_all(&mut self) {
        for index in 0..self.slots.len() {
            self.dispose(index);
        }
    }
}

/// 在请求结束时输出一行访问日志。
pub struct AccessLogModule {
    served: Arc<AtomicU64>,
}

impl AccessLogModule {
    pub fn new() -> Self {
        Self {
            served: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 已记录的请求数，模块释放后仍可读取
    pub fn served(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.served)
    }
}

impl Default for AccessLogModule {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpModule for AccessLogModule {
    fn name(&self) -> &str {
        "access_log"
    }

    fn init(&mut self, application: &mut HttpApplication) {
        let served = Arc::clone(&self.served);
        application.add_handler(
            PipelineEvent::EndRequest,
            Arc::new(move |ctx: &mut HttpContext| {
                served.fetch_add(1, Ordering::Relaxed);
                let request = ctx.request();
                let response = ctx.response();
                info!(
                    "[ID{}] {}, {}, {}, {}, {}, {}, {}ms",
                    ctx.id(),
                    request.version(),
                    request.path(),
                    request.method(),
                    response.status_code(),
                    response.information(),
                    request.user_agent(),
                    (chrono::Local::now() - ctx.timestamp()).num_milliseconds(),
                );
                Ok(())
            }),
        );
    }

    fn dispose(&mut self) {
        debug!("访问日志模块共记录了{}个请求", self.served.load(Ordering::Relaxed));
    }
}

/// 把请求的开始与结束写入请求跟踪。
pub struct TraceModule;

impl HttpModule for TraceModule {
    fn name(&self) -> &str {
        "trace"
    }

    fn init(&mut self, application: &mut HttpApplication) {
        application.add_handler(
            PipelineEvent::BeginRequest,
            Arc::new(|ctx: &mut HttpContext| {
                let line = format!("{} {}", ctx.request().method(), ctx.request().path());
                ctx.trace_mut().write("webhandler", &format!("请求开始：{}", line));
                Ok(())
            }),
        );
        application.add_handler(
            PipelineEvent::EndRequest,
            Arc::new(|ctx: &mut HttpContext| {
                let status = ctx.response().status_code();
                let message = format!("请求结束：{}", status);
                if status >= 400 {
                    ctx.trace_mut().warn("webhandler", &message);
                } else {
                    ctx.trace_mut().write("webhandler", &message);
                }
                Ok(())
            }),
        );
    }

    fn dispose(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{param::HttpRequestMethod, request::Request, trace::{TraceContext, TraceMode}};
    use std::sync::Mutex;

    /// 记录每次调用的模块，用来确认集合不会重复调用
    struct Recording {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl HttpModule for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn init(&mut self, application: &mut HttpApplication) {
            self.calls.lock().unwrap().push("init");
            application.add_handler(PipelineEvent::BeginRequest, Arc::new(|_: &mut HttpContext| Ok(())));
        }

        fn dispose(&mut self) {
            self.calls.lock().unwrap().push("dispose");
        }
    }

    fn recording() -> (ModuleCollection, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut modules = ModuleCollection::new();
        modules.add(Box::new(Recording {
            calls: Arc::clone(&calls),
        }));
        (modules, calls)
    }

    #[test]
    fn test_init_then_dispose_once() {
        let (mut modules, calls) = recording();
        let mut app = HttpApplication::new();
        assert_eq!(modules.state(0), Some(ModuleState::Uninitialized));

        assert!(modules.init(0, &mut app));
        assert_eq!(modules.state(0), Some(ModuleState::Initialized));
        assert!(modules.dispose(0));
        assert_eq!(modules.state(0), Some(ModuleState::Disposed));

        assert_eq!(*calls.lock().unwrap(), vec!["init", "dispose"]);
    }

    #[test]
    fn test_double_init_is_ignored() {
        let (mut modules, calls) = recording();
        let mut app = HttpApplication::new();
        modules.init_all(&mut app);
        assert!(!modules.init(0, &mut app));

        assert_eq!(app.handler_count(PipelineEvent::BeginRequest), 1);
        assert_eq!(*calls.lock().unwrap(), vec!["init"]);
    }

    #[test]
    fn test_double_dispose_and_dispose_before_init() {
        let (mut modules, calls) = recording();
        assert!(!modules.dispose(0));
        assert_eq!(modules.state(0), Some(ModuleState::Uninitialized));

        let mut app = HttpApplication::new();
        modules.init_all(&mut app);
        modules.dispose_all();
        modules.dispose_all();
        assert_eq!(*calls.lock().unwrap(), vec!["init", "dispose"]);
        assert!(!modules.init(0, &mut app));
    }

    #[test]
    fn test_from_names() {
        let names = vec!["access_log".to_string(), "trace".to_string()];
        let modules = ModuleCollection::from_names(&names).unwrap();
        assert_eq!(modules.names(), vec!["access_log", "trace"]);
        assert_eq!(
            ModuleCollection::from_names(&["php".to_string()]).err().map(|e| e.to_string()),
            Some(Exception::UnknownModule("php".to_string()).to_string())
        );
    }

    #[tokio::test]
    async fn test_builtin_modules_register_events() {
        let mut access = AccessLogModule::new();
        let served = access.served();
        let mut app = HttpApplication::new();
        access.init(&mut app);
        TraceModule.init(&mut app);
        assert_eq!(app.handler_count(PipelineEvent::BeginRequest), 1);
        assert_eq!(app.handler_count(PipelineEvent::EndRequest), 2);

        let mut ctx = HttpContext::with_trace(
            Request::new(HttpRequestMethod::Get, "/index.html"),
            9,
            TraceContext::new(true, TraceMode::SortByTime),
        );
        app.raise(PipelineEvent::BeginRequest, &mut ctx).await.unwrap();
        app.raise(PipelineEvent::EndRequest, &mut ctx).await.unwrap();

        assert_eq!(served.load(Ordering::Relaxed), 1);
        let messages: Vec<_> = ctx.trace().entries().iter().map(|e| e.message().to_string()).collect();
        assert_eq!(messages, vec!["请求开始：GET /index.html", "请求结束：200"]);
    }
}
