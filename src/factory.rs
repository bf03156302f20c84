// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 处理器工厂
//!
//! 工厂根据方法、URL 和物理路径选出处理器实例，并在请求结束后收回。
//!
//! [`HandlerFactory`] 的实现要点：
//! - 路由按注册顺序匹配，第一个路径匹配的路由决定结果；方法不匹配时返回 405 处理器，
//!   没有路由匹配时返回 404。
//! - 可复用的实例在释放后放回所属路由的空闲列表，列表长度受 `pool_capacity` 限制；
//!   不可复用的实例直接丢弃。
//! - 借出的实例按指针标识登记，重复释放或释放不是本工厂借出的实例会 panic。
//! - 所有可变状态都在同一把锁之后，借出与归还对每个实例是串行的。

use std::{
    collections::HashMap,
    fmt,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, info, warn};
use regex::Regex;

use crate::{
    cache::FileCache,
    config::Config,
    context::HttpContext,
    exception::{Exception, HttpException},
    handler::{ForbiddenHandler, HttpHandler, MethodNotAllowedHandler},
    param::HttpRequestMethod,
    static_file::StaticFileHandler,
};

pub trait HttpHandlerFactory: Send + Sync {
    /// 为请求选出处理器。路由失败以带状态码的 `HttpException` 表示。
    fn get_handler(
        &self,
        context: &HttpContext,
        request_type: HttpRequestMethod,
        url: &str,
        path_translated: &Path,
    ) -> Result<Arc<dyn HttpHandler>, HttpException>;

    /// 归还处理器。每次 `get_handler` 必须且只能对应一次释放。
    fn release_handler(&self, handler: Arc<dyn HttpHandler>);
}

/// 构造处理器实例的闭包
pub type HandlerBuilder = Arc<dyn Fn() -> Arc<dyn HttpHandler> + Send + Sync>;

/// 路由的路径模式：`*`、`*.ext`、`/prefix/*` 或精确路径。
#[derive(Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, Exception> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(Exception::InvalidRoutePattern(pattern.to_string()));
        }
        // 只有 * 是通配符，其余字符按字面匹配
        let expr = format!("^{}$", regex::escape(pattern).replace(r"\*", ".*"));
        let regex = Regex::new(&expr).map_err(|_| Exception::InvalidRoutePattern(pattern.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// 与去掉查询串后的 URL 路径比较。
    pub fn is_match(&self, url_path: &str) -> bool {
        self.regex.is_match(url_path)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoutePattern({})", self.source)
    }
}

/// 路由接受的方法集合，`*` 表示全部方法。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerbSet {
    All,
    Only(Vec<HttpRequestMethod>),
}

impl VerbSet {
    pub fn parse(verbs: &str) -> Result<Self, Exception> {
        if verbs.trim() == "*" {
            return Ok(VerbSet::All);
        }
        let mut methods = Vec::new();
        for verb in verbs.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            match HttpRequestMethod::parse(verb) {
                Some(m) => methods.push(m),
                None => return Err(Exception::UnSupportedRequestMethod),
            }
        }
        if methods.is_empty() {
            return Err(Exception::UnSupportedRequestMethod);
        }
        Ok(VerbSet::Only(methods))
    }

    pub fn contains(&self, method: HttpRequestMethod) -> bool {
        match self {
            VerbSet::All => true,
            VerbSet::Only(methods) => methods.contains(&method),
        }
    }
}

struct Route {
    verbs: VerbSet,
    pattern: RoutePattern,
    builder: HandlerBuilder,
}

struct PoolState {
    /// 每条路由的空闲实例
    free: Vec<Vec<Arc<dyn HttpHandler>>>,
    /// 指针 -> (所属路由, 借出次数)；405 处理器不属于任何路由。
    /// 构造器可能每次返回同一个共享实例，所以按次数计。
    outstanding: HashMap<usize, (Option<usize>, usize)>,
}

pub struct HandlerFactory {
    routes: Vec<Route>,
    pool_capacity: usize,
    state: Mutex<PoolState>,
}

fn handler_key(handler: &Arc<dyn HttpHandler>) -> usize {
    Arc::as_ptr(handler) as *const () as usize
}

impl HandlerFactory {
    pub fn new(pool_capacity: usize) -> Self {
        Self {
            routes: Vec::new(),
            pool_capacity,
            state: Mutex::new(PoolState {
                free: Vec::new(),
                outstanding: HashMap::new(),
            }),
        }
    }

    /// 按配置中的处理器映射建立路由表，所有静态文件路由共享同一个文件缓存。
    pub fn from_config(config: &Config) -> Result<Self, Exception> {
        let mut factory = Self::new(config.pool_capacity());
        let cache = Arc::new(Mutex::new(FileCache::from_capacity(
            config.cache_size(),
            config.max_cached_file_size(),
        )));
        let compression = config.compression();

        for mapping in config.handlers() {
            let builder: HandlerBuilder = match mapping.kind.as_str() {
                "static_file" => {
                    let cache = Arc::clone(&cache);
                    Arc::new(move || -> Arc<dyn HttpHandler> {
                        Arc::new(StaticFileHandler::new(Arc::clone(&cache), compression))
                    })
                }
                "forbidden" => Arc::new(|| -> Arc<dyn HttpHandler> { Arc::new(ForbiddenHandler) }),
                "method_not_allowed" => {
                    Arc::new(|| -> Arc<dyn HttpHandler> { Arc::new(MethodNotAllowedHandler) })
                }
                other => return Err(Exception::UnknownHandlerKind(other.to_string())),
            };
            factory.register_builder(&mapping.verb, &mapping.path, builder)?;
            info!("已注册处理器映射：{} {} -> {}", mapping.verb, mapping.path, mapping.kind);
        }
        Ok(factory)
    }

    /// 在路由表末尾追加一条路由。
    pub fn register<F>(&mut self, verbs: &str, path: &str, builder: F) -> Result<usize, Exception>
    where
        F: Fn() -> Arc<dyn HttpHandler> + Send + Sync + 'static,
    {
        self.register_builder(verbs, path, Arc::new(builder))
    }

    fn register_builder(&mut self, verbs: &str, path: &str, builder: HandlerBuilder) -> Result<usize, Exception> {
        let route = Route {
            verbs: VerbSet::parse(verbs)?,
            pattern: RoutePattern::parse(path)?,
            builder,
        };
        self.routes.push(route);
        self.state_mut().free.push(Vec::new());
        Ok(self.routes.len() - 1)
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// 当前借出未归还的实例数
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding.values().map(|(_, count)| count).sum()
    }

    /// 指定路由空闲列表中的实例数
    pub fn pooled(&self, route: usize) -> usize {
        self.lock().free.get(route).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("处理器池的锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    fn state_mut(&mut self) -> &mut PoolState {
        match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_out(&self, route: usize) -> Arc<dyn HttpHandler> {
        let pooled = self.lock().free[route].pop();
        // 构造器在锁外调用，它可能很慢，也可能回头调用工厂
        let handler = match pooled {
            Some(h) => h,
            None => (self.routes[route].builder)(),
        };
        self.track(&handler, Some(route));
        handler
    }

    fn track(&self, handler: &Arc<dyn HttpHandler>, route: Option<usize>) {
        let mut state = self.lock();
        let entry = state.outstanding.entry(handler_key(handler)).or_insert((route, 0));
        entry.1 += 1;
    }
}

impl HttpHandlerFactory for HandlerFactory {
    fn get_handler(
        &self,
        context: &HttpContext,
        request_type: HttpRequestMethod,
        url: &str,
        path_translated: &Path,
    ) -> Result<Arc<dyn HttpHandler>, HttpException> {
        let id = context.id();
        let url_path = match url.split_once('?') {
            Some((p, _)) => p,
            None => url,
        };
        let route = match self.routes.iter().position(|r| r.pattern.is_match(url_path)) {
            Some(idx) => idx,
            None => {
                warn!("[ID{}]没有与 {} 匹配的处理器映射，返回404", id, url_path);
                return Err(HttpException::not_found());
            }
        };

        if !self.routes[route].verbs.contains(request_type) {
            debug!(
                "[ID{}]路由 {} 不接受方法 {}",
                id,
                self.routes[route].pattern.as_str(),
                request_type
            );
            let handler: Arc<dyn HttpHandler> = Arc::new(MethodNotAllowedHandler);
            self.track(&handler, None);
            return Ok(handler);
        }

        let handler = self.check_out(route);
        debug!(
            "[ID{}]{} {} 由 {} 处理，物理路径：{}",
            id,
            request_type,
            url_path,
            handler.name(),
            path_translated.display()
        );
        Ok(handler)
    }

    fn release_handler(&self, handler: Arc<dyn HttpHandler>) {
        let mut state = self.lock();
        let key = handler_key(&handler);
        let checkout = state.outstanding.get_mut(&key).map(|(route, count)| {
            *count -= 1;
            (*route, *count)
        });
        let route = match checkout {
            // 同一实例仍被其他请求借用，不能放回空闲列表
            Some((_, remaining)) if remaining > 0 => return,
            Some((route, _)) => {
                state.outstanding.remove(&key);
                route
            }
            None => {
                drop(state);
                panic!(
                    "释放了一个不在借出状态的处理器 {}：重复释放，或者它不是由该工厂借出的",
                    handler.name()
                );
            }
        };
        match route {
            Some(idx) if handler.is_reusable() && state.free[idx].len() < self.pool_capacity => {
                state.free[idx].push(handler);
            }
            _ => debug!("丢弃处理器 {}", handler.name()),
        }
    }
}
