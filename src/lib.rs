// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod application;
pub mod async_handler;
pub mod cache;
pub mod cache_policy;
pub mod config;
pub mod context;
pub mod exception;
pub mod factory;
pub mod handler;
pub mod map_path;
pub mod module;
pub mod param;
pub mod pending;
pub mod process;
pub mod request;
pub mod response;
pub mod runtime;
pub mod static_file;
pub mod trace;
pub mod util;

pub use application::{BeginEventHandler, EndEventHandler, EventHandler, HttpApplication, PipelineEvent};
pub use async_handler::{AsyncFnHandler, AsyncHttpHandler, BoxFuture, PendingRequest};
pub use cache::FileCache;
pub use cache_policy::{
    HttpCachePolicy, HttpCacheRevalidation, HttpCacheValidateHandler, HttpCacheability, HttpValidationStatus,
};
pub use config::Config;
pub use context::HttpContext;
pub use exception::{Exception, HttpException, HttpParseException};
pub use factory::{HandlerFactory, HttpHandlerFactory, RoutePattern, VerbSet};
pub use handler::{ForbiddenHandler, HttpHandler, MethodNotAllowedHandler};
pub use map_path::{MapPath, RootMapPath};
pub use module::{AccessLogModule, HttpModule, ModuleCollection, ModuleState, TraceModule};
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use pending::{AsyncCallback, Completer, ExtraData, PendingOperation};
pub use process::{ProcessInfo, ProcessShutdownReason, ProcessStatus};
pub use request::Request;
pub use response::{EndOfSendNotification, HttpResponse};
pub use runtime::HttpRuntime;
pub use static_file::StaticFileHandler;
pub use trace::{TraceContext, TraceEntry, TraceMode};
pub use util::HtmlBuilder;
