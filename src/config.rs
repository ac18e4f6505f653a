use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::error;
use std::fs::File;
use std::io::prelude::*;

use crate::cache::DEFAULT_FILE_CACHE_SIZE;
use crate::param::DEFAULT_TEMPLATE_EXTENSION;

/// 框架运行配置。
///
/// 既可以从 TOML 文件载入，也可以由宿主程序以代码方式逐项配置
/// （模板目录、静态目录通常由宿主在启动时按应用追加）。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    production: bool,
    #[serde(default)]
    template_folders: Vec<String>,
    #[serde(default)]
    static_folders: Vec<String>,
    #[serde(default = "default_template_extension")]
    template_extension: String,
    #[serde(default = "default_file_cache_size")]
    file_cache_size: usize,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_local")]
    local: bool,
}

fn default_template_extension() -> String {
    DEFAULT_TEMPLATE_EXTENSION.to_string()
}

fn default_file_cache_size() -> usize {
    DEFAULT_FILE_CACHE_SIZE
}

fn default_port() -> u16 {
    3000
}

fn default_local() -> bool {
    true
}

impl Config {
    pub fn new() -> Self {
        Self {
            production: false,
            template_folders: Vec::new(),
            static_folders: Vec::new(),
            template_extension: default_template_extension(),
            file_cache_size: default_file_cache_size(),
            port: default_port(),
            local: default_local(),
        }
    }

    pub fn from_toml(filename: &str) -> Self {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) => panic!("no such file {} exception:{}", filename, e),
        };
        let mut str_val = String::new();
        match file.read_to_string(&mut str_val) {
            Ok(s) => s,
            Err(e) => panic!("Error Reading file: {}", e),
        };

        match toml::from_str(&str_val) {
            Ok(t) => t,
            Err(_) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置");
                Config::new()
            }
        }
    }
}

// --- 代码侧配置 ---

impl Config {
    pub fn set_production(&mut self, production: bool) {
        self.production = production;
    }

    /// 追加一个模板目录。目录顺序即查找优先级，先注册者先匹配。
    pub fn add_template_folder(&mut self, folder: impl Into<String>) {
        self.template_folders.push(folder.into());
    }

    /// 追加一个静态文件目录，查找规则与模板目录一致。
    pub fn add_static_folder(&mut self, folder: impl Into<String>) {
        self.static_folders.push(folder.into());
    }

    pub fn set_template_extension(&mut self, extension: impl Into<String>) {
        self.template_extension = extension.into();
    }
}

// --- Getter 访问器实现 ---

impl Config {
    pub fn production(&self) -> bool {
        self.production
    }

    pub fn template_folders(&self) -> &[String] {
        &self.template_folders
    }

    pub fn static_folders(&self) -> &[String] {
        &self.static_folders
    }

    pub fn template_extension(&self) -> &str {
        &self.template_extension
    }

    pub fn file_cache_size(&self) -> usize {
        self.file_cache_size
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::new();

        assert!(!config.production());
        assert!(config.template_folders().is_empty());
        assert_eq!(config.template_extension(), "html");
        assert_eq!(config.port(), 3000);
        assert!(config.local());
    }

    #[test]
    fn test_folder_order_is_preserved() {
        let mut config = Config::new();
        config.add_template_folder("app/templates");
        config.add_template_folder("shared/templates");

        assert_eq!(
            config.template_folders(),
            &["app/templates".to_string(), "shared/templates".to_string()]
        );
    }

    #[test]
    fn test_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
production = true
template_folders = ["a/templates", "b/templates"]
static_folders = ["a/static"]
port = 8080
local = false
"#
        )
        .unwrap();

        let config = Config::from_toml(file.path().to_str().unwrap());

        assert!(config.production());
        assert_eq!(config.template_folders().len(), 2);
        assert_eq!(config.port(), 8080);
        assert!(!config.local());
        // 未出现的键使用默认值
        assert_eq!(config.template_extension(), "html");
        assert_eq!(config.file_cache_size(), DEFAULT_FILE_CACHE_SIZE);
    }

    #[test]
    fn test_from_toml_invalid_falls_back_to_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let config = Config::from_toml(file.path().to_str().unwrap());

        assert_eq!(config.port(), 3000);
    }
}
