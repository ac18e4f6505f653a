// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板渲染器模块
//!
//! 渲染器把逻辑模板名解析为源码文件、取得（或构建）其编译产物并执行：
//! 1. **定位**：在配置的模板目录列表中按顺序查找 `<名称>.<扩展名>`。
//! 2. **缓存**：以源码内容哈希为键缓存编译产物。生产模式下复用缓存并在
//!    编译后写入；开发模式下总是重新编译（支持编辑后即时生效），
//!    但不清除既有条目。
//! 3. **执行**：对显式传入的上下文对象执行编译产物。
//!
//! 缓存归渲染器实例所有，生命周期与渲染器一致，不依赖任何进程级全局状态。
//! 同一未缓存模板的并发渲染可能各自编译一次再先后写入——由于编译是源码的
//! 纯函数，后写者产生的是等价产物，这属于可容忍的重复劳动而非正确性问题。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use serde_json::Value;

use crate::config::Config;
use crate::exception::Exception;
use crate::filesystem::FileSystem;
use crate::template::{compile, content_hash, CompiledTemplate};

/// 内容哈希到编译产物的映射。容量不设上限：模板集合在部署时即固定，
/// 条目只增不减，随进程结束销毁。
pub struct TemplateCache {
    templates: HashMap<u32, Arc<CompiledTemplate>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    pub fn lookup(&self, hash: u32) -> Option<Arc<CompiledTemplate>> {
        self.templates.get(&hash).cloned()
    }

    pub fn insert(&mut self, hash: u32, template: Arc<CompiledTemplate>) {
        self.templates.insert(hash, template);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TemplateRenderer {
    config: Arc<Config>,
    fs: FileSystem,
    cache: Mutex<TemplateCache>,
    compile_count: AtomicUsize,
}

impl TemplateRenderer {
    pub fn new(config: Arc<Config>) -> Self {
        // 生产模式下文件内容与编译产物都启用缓存
        let fs = FileSystem::new(config.production(), config.file_cache_size());
        Self {
            config,
            fs,
            cache: Mutex::new(TemplateCache::new()),
            compile_count: AtomicUsize::new(0),
        }
    }

    /// 按逻辑名渲染模板。
    ///
    /// `name` 不含扩展名；扩展名与目录列表来自配置。任何一步失败
    /// （找不到、编译错误、渲染错误）都向调用方传播，不产生部分输出。
    pub async fn render(&self, name: &str, context: &Value) -> Result<String, Exception> {
        let filename = format!("{}.{}", name, self.config.template_extension());
        let folders = self.config.template_folders();

        let path = self
            .fs
            .find_in_directories(&filename, folders)
            .await
            .ok_or_else(|| Exception::TemplateNotFound(name.to_string()))?;
        let source = self.fs.read_to_string(&path).await?;

        let template = self.obtain(&source)?;
        template.render(context)
    }

    /// 取得源码对应的编译产物。缓存键是内容哈希而非路径，
    /// 从不同路径加载的相同内容共享同一份产物。
    fn obtain(&self, source: &str) -> Result<Arc<CompiledTemplate>, Exception> {
        if !self.config.production() {
            // 开发模式：总是重新编译，既不查询也不写入缓存
            return self.compile_counted(source);
        }

        let hash = content_hash(source);
        if let Some(template) = self.lock_cache().lookup(hash) {
            debug!("模板缓存命中：{:08x}", hash);
            return Ok(template);
        }

        let template = self.compile_counted(source)?;
        self.lock_cache().insert(hash, template.clone());
        debug!("模板缓存写入：{:08x}", hash);
        Ok(template)
    }

    fn compile_counted(&self, source: &str) -> Result<Arc<CompiledTemplate>, Exception> {
        self.compile_count.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(compile(source)?))
    }

    fn lock_cache(&self) -> MutexGuard<'_, TemplateCache> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("模板缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    /// 编译步骤的累计调用次数，用于验证缓存契约。
    pub fn compile_count(&self) -> usize {
        self.compile_count.load(Ordering::Relaxed)
    }

    /// 当前缓存的编译产物数量。
    pub fn cached_templates(&self) -> usize {
        self.lock_cache().len()
    }
}
