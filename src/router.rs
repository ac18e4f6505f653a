// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由模块
//!
//! 将请求的方法与路径映射到处理器（Handler）。路径模式支持参数捕获：
//! - `<name>` 匹配单个路径段（不含 `/`）。
//! - `<name:path>` 贪婪匹配余下的整个路径（可含 `/`）。
//!
//! 模式中的其余字面部分在编译时被正则转义，整条模式锚定全路径匹配。
//! 路由按注册顺序线性匹配，首个命中者胜出；查询字符串不参与匹配。

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use log::{debug, warn};
use regex::Regex;

use crate::container::Container;
use crate::exception::Exception;
use crate::param::HttpRequestMethod;
use crate::request::Request;
use crate::response::Response;

/// 处理器签名：接收已填充路由参数的请求与依赖容器，异步产出响应。
pub type Handler = Arc<
    dyn Fn(Request, Arc<Container>) -> Pin<Box<dyn Future<Output = Result<Response, Exception>> + Send>>
        + Send
        + Sync,
>;

struct Route {
    method: HttpRequestMethod,
    pattern: Regex,
    param_names: Vec<String>,
    handler: Handler,
}

pub struct Router {
    routes: Vec<Route>,
    not_found: Option<Handler>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            not_found: None,
        }
    }

    /// 注册一条路由。模式非法（如参数名为空、括号不配对）时返回
    /// [`Exception::InvalidRoutePattern`]。
    pub fn route(
        &mut self,
        method: HttpRequestMethod,
        pattern: &str,
        handler: Handler,
    ) -> Result<(), Exception> {
        let (regex, param_names) = compile_pattern(pattern)?;
        debug!("注册路由：{} {} -> {}", method, pattern, regex.as_str());
        self.routes.push(Route {
            method,
            pattern: regex,
            param_names,
            handler,
        });
        Ok(())
    }

    pub fn get(&mut self, pattern: &str, handler: Handler) -> Result<(), Exception> {
        self.route(HttpRequestMethod::Get, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: Handler) -> Result<(), Exception> {
        self.route(HttpRequestMethod::Post, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: Handler) -> Result<(), Exception> {
        self.route(HttpRequestMethod::Put, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: Handler) -> Result<(), Exception> {
        self.route(HttpRequestMethod::Delete, pattern, handler)
    }

    pub fn head(&mut self, pattern: &str, handler: Handler) -> Result<(), Exception> {
        self.route(HttpRequestMethod::Head, pattern, handler)
    }

    pub fn options(&mut self, pattern: &str, handler: Handler) -> Result<(), Exception> {
        self.route(HttpRequestMethod::Options, pattern, handler)
    }

    /// 设置未命中任何路由时的兜底处理器。未设置时返回标准 404 页。
    pub fn set_not_found(&mut self, handler: Handler) {
        self.not_found = Some(handler);
    }

    /// 判断请求是否会命中某条已注册路由（不执行处理器）。
    /// 服务端用它决定是否转入静态文件回退。
    pub fn has_match(&self, request: &Request) -> bool {
        let path = request.path_without_query();
        self.routes
            .iter()
            .any(|route| route.method == request.method() && route.pattern.is_match(path))
    }

    /// 按注册顺序匹配并执行处理器。
    pub async fn dispatch(
        &self,
        mut request: Request,
        container: Arc<Container>,
    ) -> Result<Response, Exception> {
        let path = request.path_without_query().to_string();

        for route in &self.routes {
            if route.method != request.method() {
                continue;
            }
            if let Some(captures) = route.pattern.captures(&path) {
                let mut params = HashMap::new();
                for (index, name) in route.param_names.iter().enumerate() {
                    if let Some(value) = captures.get(index + 1) {
                        params.insert(name.clone(), value.as_str().to_string());
                    }
                }
                request.set_params(params);
                return (route.handler)(request, container).await;
            }
        }

        warn!("无路由命中：{} {}", request.method(), path);
        match &self.not_found {
            Some(handler) => handler(request, container).await,
            None => Ok(Response::response_404()),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// 把 `<name>` / `<name:path>` 模式编译为锚定的正则与参数名列表。
fn compile_pattern(pattern: &str) -> Result<(Regex, Vec<String>), Exception> {
    let mut regex_source = String::from("^");
    let mut param_names = Vec::new();
    let mut rest = pattern;

    while let Some(open) = rest.find('<') {
        regex_source.push_str(&regex::escape(&rest[..open]));
        let after_open = &rest[open + 1..];
        let close = after_open
            .find('>')
            .ok_or_else(|| Exception::InvalidRoutePattern(pattern.to_string()))?;
        let token = &after_open[..close];

        let (name, capture) = match token.strip_suffix(":path") {
            Some(name) => (name, "(.+)"),
            None => (token, "([^/]+)"),
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Exception::InvalidRoutePattern(pattern.to_string()));
        }
        param_names.push(name.to_string());
        regex_source.push_str(capture);
        rest = &after_open[close + 1..];
    }
    if rest.contains('>') {
        return Err(Exception::InvalidRoutePattern(pattern.to_string()));
    }
    regex_source.push_str(&regex::escape(rest));
    regex_source.push('$');

    let regex = Regex::new(&regex_source)
        .map_err(|_| Exception::InvalidRoutePattern(pattern.to_string()))?;
    Ok((regex, param_names))
}
