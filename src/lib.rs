// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # weeb
//!
//! 一个面向个人项目的极简 Web 框架。核心是一套基于 `<% %>` 标记的
//! 模板引擎（编译器、解释执行器与按内容哈希索引的编译产物缓存），
//! 周边配套了有序目录文件查找、路由、静态文件服务、依赖容器与
//! 基于 Tokio 的异步接入层。
//!
//! 典型用法：
//! 1. 构建 [`Config`]（模板目录、静态目录、是否生产模式）。
//! 2. 把 [`TemplateRenderer`] 等共享组件注册进 [`Container`]。
//! 3. 在 [`Router`] 上注册处理器，处理器中通过 [`Response`] 的
//!    构建入口产出响应。
//! 4. 交给 [`Server`] 监听端口。

// --- 模块定义 ---
pub mod cache;      // 按修改时间校验新鲜度的 LRU 文件缓存
pub mod config;     // 配置解析与管理
pub mod container;  // 类型化依赖容器
pub mod exception;  // 自定义异常与错误处理
pub mod filesystem; // 有序目录查找与文件读取
pub mod param;      // 全局常量与静态参数
pub mod renderer;   // 模板渲染器与编译产物缓存
pub mod request;    // HTTP 请求报文解析器
pub mod response;   // HTTP 响应报文构建器
pub mod router;     // 路由表与参数捕获
pub mod server;     // Tokio 异步接入层
pub mod statics;    // 静态文件服务
pub mod template;   // 模板编译器与解释执行器
pub mod util;       // 通用工具函数

pub use config::Config;
pub use container::Container;
pub use exception::Exception;
pub use renderer::TemplateRenderer;
pub use request::Request;
pub use response::Response;
pub use router::{Handler, Router};
pub use server::Server;
pub use template::{compile, content_hash, CompiledTemplate};
