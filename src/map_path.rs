// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路径映射
//!
//! 把请求的虚拟路径映射为工厂使用的物理路径。

use std::path::{Component, Path, PathBuf};

use log::warn;

use crate::exception::Exception;

#[cfg_attr(test, mockall::automock)]
pub trait MapPath: Send + Sync {
    /// 映射虚拟路径。路径试图离开应用根目录时返回 `Exception::InvalidPath`。
    fn map_path(&self, virtual_path: &str) -> Result<PathBuf, Exception>;

    fn physical_application_path(&self) -> &Path;
}

/// 以 `www_root` 为根的映射
#[derive(Debug, Clone)]
pub struct RootMapPath {
    root: PathBuf,
}

impl RootMapPath {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl MapPath for RootMapPath {
    fn map_path(&self, virtual_path: &str) -> Result<PathBuf, Exception> {
        let path = match virtual_path.split_once('?') {
            Some((p, _)) => p,
            None => virtual_path,
        };
        if path.contains('\0') || path.contains('\\') {
            warn!("拒绝包含非法字符的路径：{:?}", path);
            return Err(Exception::InvalidPath);
        }

        let mut mapped = self.root.clone();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => mapped.push(part),
                Component::CurDir => {}
                // 根目录前缀已经被去掉，剩下的只可能是 ..
                _ => {
                    warn!("拒绝试图离开根目录的路径：{}", path);
                    return Err(Exception::InvalidPath);
                }
            }
        }
        Ok(mapped)
    }

    fn physical_application_path(&self) -> &Path {
        &self.root
    }
}
