//! # 依赖容器模块
//!
//! 类型化的依赖注册表：以具体类型为键，在启动阶段显式注册各组件实例，
//! 处理请求时按类型取出。取用分两种形式：
//! - [`Container::get`]：返回 `Option`，用于可选依赖。
//! - [`Container::require`]：缺失时返回 [`Exception::DependencyMissing`]，
//!   适合在启动完成后立即逐项调用，实现启动期校验。

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::warn;

use crate::exception::Exception;

pub struct Container {
    values: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// 注册一个实例。同类型重复注册时覆盖旧值并记录警告。
    pub fn set<T: Any + Send + Sync>(&self, value: T) {
        self.set_arc(Arc::new(value));
    }

    /// 注册一个已共享的实例（与其他持有者共用同一份 `Arc`）。
    pub fn set_arc<T: Any + Send + Sync>(&self, value: Arc<T>) {
        let mut values = match self.values.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if values.insert(TypeId::of::<T>(), value).is_some() {
            warn!("容器中的{}注册项已被覆盖", type_name::<T>());
        }
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let values = match self.values.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        values
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// 取出必需依赖，缺失即为配置缺陷。
    pub fn require<T: Any + Send + Sync>(&self) -> Result<Arc<T>, Exception> {
        self.get::<T>()
            .ok_or(Exception::DependencyMissing(type_name::<T>()))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}
