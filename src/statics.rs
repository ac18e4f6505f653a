// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态文件服务模块
//!
//! 把请求路径映射到已配置的静态目录中的文件：
//! - 目录按注册顺序探测，首个命中者胜出（与模板目录规则一致）。
//! - 命中目录时回退到该目录下的 `index.html`。
//! - 包含 `..` 的路径一律拒绝，防止目录遍历。
//! - `Content-Type` 依据文件扩展名查表确定，未知扩展名回退到二进制流。

use std::path::Path;

use log::debug;

use crate::exception::Exception;
use crate::filesystem::FileSystem;
use crate::param::MIME_TYPES;
use crate::response::Response;

/// 在静态目录列表中查找并读取 `url_path` 指向的文件，构建响应。
///
/// 未命中返回 [`Exception::FileNotFound`]，由连接处理层映射为 404 页。
pub async fn serve_static(
    fs: &FileSystem,
    folders: &[String],
    url_path: &str,
) -> Result<Response, Exception> {
    if url_path.split('/').any(|segment| segment == "..") {
        return Err(Exception::InvalidPath);
    }

    let relative = url_path.trim_start_matches('/');
    if relative.is_empty() {
        return Err(Exception::FileNotFound);
    }

    let mut path = fs
        .find_in_directories(relative, folders)
        .await
        .ok_or(Exception::FileNotFound)?;

    // 命中目录时回退到其中的 index.html
    if fs.is_directory(&path).await {
        path = path.join("index.html");
    }

    let mime = mime_for(&path);
    debug!("静态文件命中：{}（{}）", path.display(), mime);

    let content = fs.read(&path).await?;
    Ok(Response::from_bytes(content, mime))
}

fn mime_for(path: &Path) -> &'static str {
    let fallback = MIME_TYPES["_"];
    match path.extension().and_then(|e| e.to_str()) {
        Some(extension) => MIME_TYPES.get(extension).copied().unwrap_or(fallback),
        None => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn folders_of(dirs: &[&tempfile::TempDir]) -> Vec<String> {
        dirs.iter()
            .map(|d| d.path().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_mime_for_known_and_unknown() {
        assert_eq!(mime_for(Path::new("site.css")), "text/css;charset=utf-8");
        assert_eq!(mime_for(Path::new("photo.png")), "image/png");
        assert_eq!(mime_for(Path::new("blob.xyz")), "application/octet-stream");
        assert_eq!(mime_for(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_serve_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "site.css", "body{}");

        let fs = FileSystem::new(false, 8);
        let response = serve_static(&fs, &folders_of(&[&dir]), "/site.css")
            .await
            .unwrap();

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.content_type().unwrap(), "text/css;charset=utf-8");
        assert_eq!(response.content().unwrap().as_ref(), b"body{}");
    }

    #[tokio::test]
    async fn test_serve_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystem::new(false, 8);

        let result = serve_static(&fs, &folders_of(&[&dir]), "/ghost.css").await;
        assert_eq!(result.unwrap_err(), Exception::FileNotFound);
    }

    #[tokio::test]
    async fn test_serve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystem::new(false, 8);

        let result = serve_static(&fs, &folders_of(&[&dir]), "/../etc/passwd").await;
        assert_eq!(result.unwrap_err(), Exception::InvalidPath);
    }

    #[tokio::test]
    async fn test_serve_directory_falls_back_to_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        write_file(&dir.path().join("docs"), "index.html", "<h1>docs</h1>");

        let fs = FileSystem::new(false, 8);
        let response = serve_static(&fs, &folders_of(&[&dir]), "/docs")
            .await
            .unwrap();

        assert_eq!(
            response.content_type().unwrap(),
            "text/html;charset=utf-8"
        );
        assert_eq!(response.content().unwrap().as_ref(), b"<h1>docs</h1>");
    }

    #[tokio::test]
    async fn test_serve_first_directory_wins() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        write_file(dir_a.path(), "logo.svg", "<svg>A</svg>");
        write_file(dir_b.path(), "logo.svg", "<svg>B</svg>");

        let fs = FileSystem::new(false, 8);
        let response = serve_static(&fs, &folders_of(&[&dir_a, &dir_b]), "/logo.svg")
            .await
            .unwrap();

        assert_eq!(response.content().unwrap().as_ref(), b"<svg>A</svg>");
    }
}
