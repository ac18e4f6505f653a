use std::num::NonZeroUsize;
use std::time::SystemTime;

use bytes::Bytes;
use log::warn;
use lru::LruCache;

/// 文件缓存的默认容量，配置为 0 时回退到该值
pub const DEFAULT_FILE_CACHE_SIZE: usize = 32;

#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    modified_time: SystemTime,
}

/// 以路径为键、按修改时间校验新鲜度的 LRU 文件内容缓存。
///
/// 生产模式下文件系统访问器用它避免重复读盘；条目在文件被修改后自动失效
/// （下一次查询返回未命中，由调用方重新读取并覆盖）。
pub struct FileCache {
    cache: LruCache<String, CacheEntry>,
}

impl FileCache {
    /// 按容量构造。容量为 0 时降级为默认容量而不是直接失败，
    /// 因为禁用缓存应当通过文件系统访问器的非缓存模式表达。
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            warn!(
                "文件缓存容量被设置为0，已改用默认容量{}。",
                DEFAULT_FILE_CACHE_SIZE
            );
            DEFAULT_FILE_CACHE_SIZE
        } else {
            capacity
        };
        Self {
            // 上面已保证容量非零
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap()),
        }
    }

    /// 写入（或覆盖）一个条目
    pub fn insert(&mut self, path: &str, content: Bytes, modified_time: SystemTime) {
        let entry = CacheEntry {
            content,
            modified_time,
        };
        self.cache.put(path.to_string(), entry);
    }

    /// 查询有效缓存：仅当记录的修改时间与当前修改时间一致时才算命中
    pub fn lookup(&mut self, path: &str, current_modified_time: SystemTime) -> Option<Bytes> {
        match self.cache.get(path) {
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
}
