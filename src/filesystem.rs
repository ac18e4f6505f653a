// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文件系统访问器模块
//!
//! 为模板渲染与静态文件服务提供统一的文件定位与读取入口：
//! - **有序目录查找**：按配置顺序探测目录列表，首个命中者胜出，
//!   目录优先级由注册顺序而非文件新旧决定。
//! - **可选内容缓存**：生产模式下以 LRU 缓存文件内容，并按修改时间校验新鲜度；
//!   开发模式下每次读盘，支持编辑后即时生效。

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use log::{debug, warn};
use tokio::fs;

use crate::cache::FileCache;
use crate::exception::Exception;

pub struct FileSystem {
    cached: bool,
    cache: Mutex<FileCache>,
}

impl FileSystem {
    /// `cached` 为真时启用内容缓存（通常对应生产模式）。
    pub fn new(cached: bool, capacity: usize) -> Self {
        Self {
            cached,
            cache: Mutex::new(FileCache::from_capacity(capacity)),
        }
    }

    /// 在有序目录列表中定位名为 `name` 的条目，返回首个命中的完整路径。
    ///
    /// 不存在的条目继续探测下一个目录；其他 stat 失败（如权限问题）记录
    /// 警告后同样跳过，避免单个异常目录掩盖后续目录中的命中。
    pub async fn find_in_directories(&self, name: &str, folders: &[String]) -> Option<PathBuf> {
        for folder in folders {
            let full_path = Path::new(folder).join(name);
            match fs::metadata(&full_path).await {
                Ok(_) => {
                    debug!("在目录{}中找到{}", folder, name);
                    return Some(full_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("探测路径{}失败，跳过：{}", full_path.display(), e);
                    continue;
                }
            }
        }
        None
    }

    pub async fn is_directory(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    /// 读取文件内容。缓存模式下优先返回按修改时间仍然有效的缓存条目。
    pub async fn read(&self, path: &Path) -> Result<Bytes, Exception> {
        let metadata = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Exception::FileNotFound)
            }
            Err(e) => return Err(Exception::FileUnreadable(e.to_string())),
        };
        let modified_time = metadata
            .modified()
            .map_err(|e| Exception::FileUnreadable(e.to_string()))?;
        let key = path.to_string_lossy().to_string();

        if self.cached {
            if let Some(content) = self.lock_cache().lookup(&key, modified_time) {
                debug!("文件缓存命中：{}", key);
                return Ok(content);
            }
        }

        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Exception::FileNotFound)
            }
            Err(e) => return Err(Exception::FileUnreadable(e.to_string())),
        };
        let content = Bytes::from(data);

        if self.cached {
            self.lock_cache().insert(&key, content.clone(), modified_time);
        }
        Ok(content)
    }

    /// 以 UTF-8 文本形式读取文件内容（模板源码走这条路径）。
    pub async fn read_to_string(&self, path: &Path) -> Result<String, Exception> {
        let content = self.read(path).await?;
        String::from_utf8(content.to_vec())
            .map_err(|_| Exception::FileUnreadable(format!("{} is not UTF-8", path.display())))
    }

    fn lock_cache(&self) -> MutexGuard<'_, FileCache> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("文件缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    #[cfg(test)]
    pub fn cached_entries(&self) -> usize {
        self.lock_cache().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    /// 两个目录都包含同名文件时，永远返回先注册目录中的路径
    #[tokio::test]
    async fn test_find_first_match_wins() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        write_file(dir_a.path(), "page.html", "from A");
        write_file(dir_b.path(), "page.html", "from B, newer");

        let fs = FileSystem::new(false, 8);
        let folders = vec![
            dir_a.path().to_string_lossy().to_string(),
            dir_b.path().to_string_lossy().to_string(),
        ];

        let found = fs.find_in_directories("page.html", &folders).await.unwrap();
        assert!(found.starts_with(dir_a.path()));

        let contents = fs.read_to_string(&found).await.unwrap();
        assert_eq!(contents, "from A");
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystem::new(false, 8);
        let folders = vec![dir.path().to_string_lossy().to_string()];

        assert!(fs.find_in_directories("missing.html", &folders).await.is_none());
    }

    #[tokio::test]
    async fn test_find_skips_to_later_directory() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        write_file(dir_b.path(), "only_b.html", "b");

        let fs = FileSystem::new(false, 8);
        let folders = vec![
            dir_a.path().to_string_lossy().to_string(),
            dir_b.path().to_string_lossy().to_string(),
        ];

        let found = fs.find_in_directories("only_b.html", &folders).await.unwrap();
        assert!(found.starts_with(dir_b.path()));
    }

    #[tokio::test]
    async fn test_cached_read_populates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.html", "hello");

        let fs = FileSystem::new(true, 8);
        assert_eq!(fs.cached_entries(), 0);

        assert_eq!(fs.read(&path).await.unwrap(), Bytes::from("hello"));
        assert_eq!(fs.cached_entries(), 1);

        // 第二次读取命中缓存，内容一致
        assert_eq!(fs.read(&path).await.unwrap(), Bytes::from("hello"));
        assert_eq!(fs.cached_entries(), 1);
    }

    #[tokio::test]
    async fn test_uncached_read_leaves_cache_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.html", "hello");

        let fs = FileSystem::new(false, 8);
        fs.read(&path).await.unwrap();
        assert_eq!(fs.cached_entries(), 0);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystem::new(false, 8);

        let result = fs.read(&dir.path().join("ghost.html")).await;
        assert_eq!(result.unwrap_err(), Exception::FileNotFound);
    }

    #[tokio::test]
    async fn test_modified_file_is_reread() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.html", "old");

        let fs = FileSystem::new(true, 8);
        assert_eq!(fs.read(&path).await.unwrap(), Bytes::from("old"));

        // 修改文件（确保修改时间前移）
        std::thread::sleep(std::time::Duration::from_millis(20));
        write_file(dir.path(), "a.html", "new");

        assert_eq!(fs.read(&path).await.unwrap(), Bytes::from("new"));
    }
}
