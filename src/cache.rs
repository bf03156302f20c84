use std::num::NonZeroUsize;
use std::time::SystemTime;

use bytes::Bytes;
use lru::LruCache;

// 容量为 0 时使用的默认容量
const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(5) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    modified_time: SystemTime,
}

/// 静态文件处理器共享的文件内容缓存，按路径与修改时间判定有效性。
pub struct FileCache {
    cache: LruCache<String, CacheEntry>,
    max_entry_size: u64,
}

impl FileCache {
    // 根据容量构造，容量为 0 时回落到默认值
    pub fn from_capacity(capacity: usize, max_entry_size: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            cache: LruCache::new(capacity),
            max_entry_size,
        }
    }

    // 放入
    pub fn push(&mut self, filename: &str, bytes: Bytes, modified_time: SystemTime) {
        let entry = CacheEntry {
            content: bytes,
            modified_time,
        };
        self.cache.put(filename.to_string(), entry);
    }

    // 检查文件大小是否适合缓存
    pub fn should_cache(&self, file_size: u64) -> bool {
        file_size <= self.max_entry_size
    }

    // 查询有效缓存，修改时间不一致的条目视为失效
    pub fn find(&mut self, filename: &str, current_modified_time: SystemTime) -> Option<Bytes> {
        match self.cache.get(filename) {
            Some(entry) if entry.modified_time == current_modified_time => {
                Some(entry.content.clone())
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
