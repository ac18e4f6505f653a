// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应构建模块
//!
//! 该模块提供 `Response` 结构体及面向处理器（Handler）的构建入口：
//! - 纯文本、HTML、JSON 等内存内容响应。
//! - 经由渲染器产出的模板响应。
//! - 由状态码生成的标准错误页（404/400/500 等）。
//!
//! 内容协商（压缩编码选择）与报文序列化也集中在本模块完成。

use crate::{
    exception::Exception,
    param::*,
    renderer::TemplateRenderer,
    request::Request,
    util::HtmlBuilder,
};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error};
use serde::Serialize;

use std::io::{self, Write};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            content: None,
        }
    }

    /// 纯文本响应（`text/plain`）。
    pub fn text(body: impl Into<String>) -> Self {
        let mut response = Self::new();
        response.set_body(Bytes::from(body.into()), "text/plain;charset=utf-8");
        response
    }

    /// HTML 响应（`text/html`）。
    pub fn html(body: impl Into<String>) -> Self {
        let mut response = Self::new();
        response.set_body(Bytes::from(body.into()), "text/html;charset=utf-8");
        response
    }

    /// JSON 响应：序列化任意可 `Serialize` 的值。
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Exception> {
        let body = serde_json::to_vec(value)
            .map_err(|e| Exception::SerializationFailed(e.to_string()))?;
        let mut response = Self::new();
        response.set_body(Bytes::from(body), "application/json");
        Ok(response)
    }

    /// 无内容响应（204）。
    pub fn no_content() -> Self {
        let mut response = Self::new();
        response.set_code(204);
        response
    }

    /// 模板响应：委托渲染器按逻辑名渲染，产出 HTML。
    ///
    /// 任何渲染失败（模板未找到、编译错误、渲染错误）都向调用方传播，
    /// 由连接处理层映射为对应的状态页。
    pub async fn template(
        renderer: &TemplateRenderer,
        name: &str,
        context: &serde_json::Value,
    ) -> Result<Self, Exception> {
        let html = renderer.render(name, context).await?;
        Ok(Self::html(html))
    }

    /// 由原始字节与 MIME 类型构建响应（静态文件服务走这条路径）。
    pub fn from_bytes(content: Bytes, mime: &str) -> Self {
        let mut response = Self::new();
        response.set_body(content, mime);
        response
    }

    /// 由状态码生成标准错误页。
    pub fn from_status_code(code: u16) -> Self {
        let mut response = Self::new();
        if code == 204 {
            response.set_code(code);
            return response;
        }
        let content = match code {
            404 => HtmlBuilder::from_status_code(404, Some(
                r"<h2>噢！</h2><p>你请求的资源无法找到。</p>"
            )),
            400 => HtmlBuilder::from_status_code(400, Some(
                r"<h2>噢！</h2><p>你的浏览器发出了一个服务器无法理解的请求。</p>"
            )),
            500 => HtmlBuilder::from_status_code(500, Some(
                r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>"
            )),
            _ => HtmlBuilder::from_status_code(code, None),
        }
        .build();
        response.set_body(Bytes::from(content), "text/html;charset=utf-8");
        response.set_code(code);
        response
    }

    pub fn response_404() -> Self {
        Self::from_status_code(404)
    }

    pub fn response_400() -> Self {
        Self::from_status_code(400)
    }

    pub fn response_500() -> Self {
        Self::from_status_code(500)
    }

    fn set_body(&mut self, content: Bytes, mime: &str) {
        self.content_length = content.len() as u64;
        self.content = Some(content);
        self.content_type = Some(mime.to_string());
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&information) => information.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                panic!("illegal status code: {}", code);
            }
        };
        self
    }

    /// 按客户端的 `Accept-Encoding` 与自身的内容类型决定并执行压缩。
    ///
    /// 不可压缩类型（图片、音视频、压缩包等）与空响应体保持原样；
    /// 压缩失败时回退到未压缩内容，不向客户端传播错误。
    pub fn negotiate_encoding(&mut self, request: &Request) -> &mut Self {
        let content = match &self.content {
            Some(c) if !c.is_empty() => c.clone(),
            _ => return self,
        };
        if let Some(mime) = &self.content_type {
            if should_skip_compression(mime) {
                debug!("内容类型{}不适合压缩，跳过", mime);
                return self;
            }
        }
        let encoding = match decide_encoding(request.accept_encoding()) {
            Some(e) => e,
            None => return self,
        };
        match compress(content.to_vec(), Some(encoding)) {
            Ok(compressed) => {
                self.content_encoding = Some(encoding);
                self.content_length = compressed.len() as u64;
                self.content = Some(Bytes::from(compressed));
            }
            Err(e) => {
                error!("压缩响应内容失败: {}，返回未压缩内容", e);
                self.content_encoding = None;
            }
        }
        self
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let version: &str = match self.version {
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let status_code: &str = &self.status_code.to_string();
        let information: &str = &self.information;
        let content_length: &str = &self.content_length.to_string();
        let date: &str = &format_date(&self.date);
        let server: &str = &self.server_name;

        let header = [
            version,
            " ",
            status_code,
            " ",
            information,
            CRLF,
            match &self.content_type {
                Some(t) => ["Content-Type: ", t, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            match self.content_encoding {
                Some(e) => ["Content-Encoding: ", &e.to_string(), CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            "Content-Length: ",
            content_length,
            CRLF,
            "Date: ",
            date,
            CRLF,
            "Server: ",
            server,
            CRLF,
            CRLF,
        ]
        .concat();
        [
            header.as_bytes(),
            match &self.content {
                Some(c) => c,
                None => b"",
            },
        ]
        .concat()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

// --- Getter 访问器实现 ---

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&String> {
        self.content_type.as_ref()
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    }
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/x-icon",
        "video/",
        "audio/",
        "application/zip",
        "application/gzip",
        "font/woff",
        "font/woff2",
        "application/vnd.ms-fontobject",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else {
        None
    }
}
