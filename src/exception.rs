// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了框架在请求处理生命周期中可能抛出的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖了模板解析与渲染错误、文件系统错误以及 HTTP 协议解析错误。
//! - **语义映射**：每个变体都对应特定的业务语义，并通过 [`Exception::status_code`]
//!   映射为外层 HTTP 处理层应返回的状态码。
//! - **传播策略**：框架内部不做重试，也不产生部分输出；所有异常都原样向调用方传播。

use std::fmt;

/// 框架处理请求过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示处理失败的具体原因。
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    /// 所有已配置的模板目录中都找不到指定名称的模板。携带模板的逻辑名称。
    TemplateNotFound(String),
    /// 模板源码中的标记语法不合法（如未闭合的 `<%`、未知语句等）。
    /// 属于开发者侧缺陷，对应 `500 Internal Server Error`。
    TemplateCompile(String),
    /// 执行已编译模板时发生的运行期错误（如引用了上下文中不存在的绑定）。
    TemplateRender(String),
    /// 在指定目录下未找到所请求的文件。在 Web 语义中对应 `404 Not Found`。
    FileNotFound,
    /// 文件存在但读取失败（权限、编码等原因）。
    FileUnreadable(String),
    /// 请求的路径格式非法或包含越权尝试（如目录遍历）。对应 `400 Bad Request`。
    InvalidPath,
    /// 容器中缺少所需的依赖注册项。携带所需类型的名称，用于启动期校验。
    DependencyMissing(&'static str),
    /// 路由模式本身无法编译为合法的匹配器。
    InvalidRoutePattern(String),
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 客户端使用了框架暂不支持的 HTTP 方法。
    UnSupportedRequestMethod,
    /// 客户端使用了不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 响应序列化失败（如 JSON 编码错误）。
    SerializationFailed(String),
}

use Exception::*;

impl Exception {
    /// 外层 HTTP 处理层应当为该异常返回的状态码。
    ///
    /// 映射关系遵循传播策略：找不到资源归入 404，客户端侧问题归入 400，
    /// 开发者侧缺陷（模板编译/渲染、依赖缺失）归入 500。
    pub fn status_code(&self) -> u16 {
        match self {
            TemplateNotFound(_) | FileNotFound => 404,
            InvalidPath | RequestIsNotUtf8 | UnSupportedRequestMethod
            | UnsupportedHttpVersion => 400,
            TemplateCompile(_) | TemplateRender(_) | FileUnreadable(_)
            | DependencyMissing(_) | InvalidRoutePattern(_) | SerializationFailed(_) => 500,
        }
    }
}

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
///
/// 这些描述信息常用于系统日志以及发送给开发者的调试响应体中。
impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateNotFound(name) => write!(f, "Template named '{}' not found", name),
            TemplateCompile(detail) => write!(f, "Template compile error: {}", detail),
            TemplateRender(detail) => write!(f, "Template render error: {}", detail),
            FileNotFound => write!(f, "File not found (404)"),
            FileUnreadable(detail) => write!(f, "File could not be read: {}", detail),
            InvalidPath => write!(f, "Invalid path (400)"),
            DependencyMissing(name) => write!(f, "Missing container dependency: {}", name),
            InvalidRoutePattern(pattern) => write!(f, "Invalid route pattern: {}", pattern),
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            SerializationFailed(detail) => write!(f, "Serialization failed: {}", detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(TemplateNotFound("page".to_string()).status_code(), 404);
        assert_eq!(FileNotFound.status_code(), 404);
        assert_eq!(InvalidPath.status_code(), 400);
        assert_eq!(RequestIsNotUtf8.status_code(), 400);
        assert_eq!(TemplateCompile("x".to_string()).status_code(), 500);
        assert_eq!(TemplateRender("x".to_string()).status_code(), 500);
        assert_eq!(DependencyMissing("weeb::Renderer").status_code(), 500);
    }

    #[test]
    fn test_display_contains_template_name() {
        let e = TemplateNotFound("greeting".to_string());
        assert!(format!("{}", e).contains("'greeting'"));
    }
}
