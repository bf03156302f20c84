// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态文件处理器
//!
//! 把工厂映射得到的物理路径作为文件内容写入响应。实例不保存请求级状态，
//! 文件缓存在所有实例之间共享，因此声明为可复用。

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use log::{debug, error, warn};

use crate::{
    cache::FileCache,
    context::HttpContext,
    exception::HttpException,
    handler::HttpHandler,
    param::{get_mime, HttpRequestMethod},
};

pub struct StaticFileHandler {
    cache: Arc<Mutex<FileCache>>,
    compression: bool,
    /// 宿主在调用工厂前写入物理路径的条目名
    path_key: &'static str,
}

/// 宿主把映射后的物理路径存放在上下文的该条目下。
pub const PATH_TRANSLATED_ITEM: &str = "path_translated";

impl StaticFileHandler {
    pub fn new(cache: Arc<Mutex<FileCache>>, compression: bool) -> Self {
        Self {
            cache,
            compression,
            path_key: PATH_TRANSLATED_ITEM,
        }
    }

    fn read_file(&self, path: &Path, id: u128) -> Result<Bytes, HttpException> {
        let metadata = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(_) => {
                warn!("[ID{}]请求的路径：{} 不存在，返回404", id, path.display());
                return Err(HttpException::not_found());
            }
        };
        if metadata.is_dir() {
            warn!("[ID{}]请求的路径：{} 是目录，不允许列出目录内容", id, path.display());
            return Err(HttpException::forbidden());
        }
        let modified_time = metadata.modified().map_err(|e| {
            error!("[ID{}]无法获取文件{}的修改时间: {}", id, path.display(), e);
            HttpException::internal("can't read file metadata")
        })?;

        let key = path.to_string_lossy();
        let mut cache = match self.cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("[ID{}]缓存锁被污染，恢复并继续", id);
                poisoned.into_inner()
            }
        };
        if let Some(bytes) = cache.find(&key, modified_time) {
            debug!("[ID{}]缓存命中，大小: {} bytes", id, bytes.len());
            return Ok(bytes);
        }

        let content = fs::read(path).map(Bytes::from).map_err(|e| {
            error!("[ID{}]无法读取文件{}: {}", id, path.display(), e);
            HttpException::internal("can't read file")
        })?;
        if cache.should_cache(metadata.len()) {
            cache.push(&key, content.clone(), modified_time);
        } else {
            debug!("[ID{}]文件过大({} bytes)，跳过缓存", id, metadata.len());
        }
        Ok(content)
    }
}

impl HttpHandler for StaticFileHandler {
    fn is_reusable(&self) -> bool {
        true
    }

    fn process_request(&self, context: &mut HttpContext) -> Result<(), HttpException> {
        let id = context.id();
        let method = context.request().method();
        if method != HttpRequestMethod::Get && method != HttpRequestMethod::Head {
            return Err(HttpException::method_not_allowed());
        }
        let path = match context.item(self.path_key) {
            Some(p) => PathBuf::from(p),
            None => {
                error!("[ID{}]上下文中缺少映射后的物理路径", id);
                return Err(HttpException::internal("path was not translated"));
            }
        };

        let content = self.read_file(&path, id)?;
        let mime = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or("application/octet-stream", get_mime);
        debug!("[ID{}]MIME类型: {}", id, mime);

        let accept_encoding = context.request().accept_encoding().to_vec();
        let compression = self.compression;
        let response = context.response_mut();
        response.set_content_type(mime);
        response.write_bytes(&content);
        if compression {
            response.compress_body(&accept_encoding, id);
        }
        if method == HttpRequestMethod::Head {
            debug!("[ID{}]请求方法为HEAD", id);
            response.suppress_body(true);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "StaticFileHandler"
    }
}
