// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 异步服务端模块
//!
//! 基于 Tokio 的 TCP 接入层：绑定监听地址、接收连接，并把每个连接
//! 分发到轻量级任务中处理。单个请求的处理流水线为：
//! 1. 读取并解析 HTTP 报文为 [`Request`]。
//! 2. 路由命中则执行处理器；未命中且为 GET/HEAD 请求时回退到静态文件服务。
//! 3. 处理器抛出的 [`Exception`] 统一映射为对应状态码的标准错误页。
//! 4. 按客户端的 `Accept-Encoding` 协商压缩后写回。

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};

use crate::config::Config;
use crate::container::Container;
use crate::exception::Exception;
use crate::filesystem::FileSystem;
use crate::param::HttpRequestMethod;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::statics::serve_static;

pub struct Server {
    config: Arc<Config>,
    container: Arc<Container>,
    router: Arc<Router>,
    fs: Arc<FileSystem>,
}

impl Server {
    pub fn new(config: Arc<Config>, container: Arc<Container>, router: Router) -> Self {
        let fs = Arc::new(FileSystem::new(
            config.production(),
            config.file_cache_size(),
        ));
        Self {
            config,
            container,
            router: Arc::new(router),
            fs,
        }
    }

    /// 绑定监听地址并进入主事件循环（Accept Loop）。
    ///
    /// `local` 配置为真时仅监听回环地址，否则监听全地址。
    pub async fn run(self) -> Result<(), std::io::Error> {
        let port = self.config.port();
        let address = match self.config.local() {
            true => Ipv4Addr::new(127, 0, 0, 1),
            false => Ipv4Addr::new(0, 0, 0, 0),
        };
        let socket = SocketAddrV4::new(address, port);

        let listener = match TcpListener::bind(socket).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("无法绑定端口：{}，错误：{}", port, e);
                return Err(e);
            }
        };
        info!("服务端正在{}:{}上监听Socket连接", address, port);

        let mut id: u128 = 0;
        loop {
            let (mut stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("接受连接失败：{}", e);
                    continue;
                }
            };
            debug!("[ID{}]新的连接：{}", id, addr);

            let router = Arc::clone(&self.router);
            let container = Arc::clone(&self.container);
            let config = Arc::clone(&self.config);
            let fs = Arc::clone(&self.fs);

            tokio::spawn(async move {
                handle_connection(&mut stream, id, router, container, config, fs).await;
            });
            id += 1;
        }
    }
}

/// 负责单个 TCP 流的生命周期：读取解析请求、执行路由与静态回退、写回响应。
async fn handle_connection(
    stream: &mut TcpStream,
    id: u128,
    router: Arc<Router>,
    container: Arc<Container>,
    config: Arc<Config>,
    fs: Arc<FileSystem>,
) {
    let mut buffer = vec![0; 4096];

    if let Err(e) = stream.readable().await {
        error!("[ID{}]等待TCPStream可读时遇到错误: {}", id, e);
        return;
    }
    match stream.try_read(&mut buffer) {
        Ok(0) => return,
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
        _ => {}
    }
    debug!("[ID{}]HTTP请求接收完毕", id);

    let request = match Request::try_from(&buffer, id) {
        Ok(request) => request,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}", id, e);
            let response = Response::from_status_code(e.status_code());
            let _ = stream.write_all(&response.as_bytes()).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    let response = handle_request(&router, &container, &config, &fs, request.clone()).await;

    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, ",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    let _ = stream.write_all(&response.as_bytes()).await;
    let _ = stream.flush().await;
}

/// 请求处理流水线的无 IO 部分，抽出以便测试。
pub async fn handle_request(
    router: &Router,
    container: &Arc<Container>,
    config: &Config,
    fs: &FileSystem,
    request: Request,
) -> Response {
    let result = if router.has_match(&request) {
        router.dispatch(request.clone(), Arc::clone(container)).await
    } else if matches!(
        request.method(),
        HttpRequestMethod::Get | HttpRequestMethod::Head
    ) {
        match serve_static(fs, config.static_folders(), request.path_without_query()).await {
            // 静态目录中也没有，则交给路由层的兜底处理器
            Err(Exception::FileNotFound) => {
                router.dispatch(request.clone(), Arc::clone(container)).await
            }
            other => other,
        }
    } else {
        router.dispatch(request.clone(), Arc::clone(container)).await
    };

    let mut response = match result {
        Ok(response) => response,
        Err(e) => {
            warn!("处理{}时发生异常: {}", request.path(), e);
            Response::from_status_code(e.status_code())
        }
    };
    response.negotiate_encoding(&request);
    response
}
