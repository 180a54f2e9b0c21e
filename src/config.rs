//! 程序配置
//!
//! 所有凭证和调用参数都收敛到显式的 `Config` 结构体，
//! 在构造派发器时一次性传入，不使用模块级全局量。

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ConfigError, DispatchError, DispatchResult};

/// 派发模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// 批处理路径：上传文件、创建远程任务、轮询、下载
    Batch,
    /// 并发路径：每条提示词一个请求，独立重试
    Concurrent,
}

impl FromStr for DispatchMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "batch" => Ok(DispatchMode::Batch),
            "concurrent" => Ok(DispatchMode::Concurrent),
            _ => Err(()),
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 派发模式（batch / concurrent）
    pub mode: DispatchMode,
    // --- LLM API 配置 ---
    /// API 密钥（不透明字符串，仅作为请求头透传）
    pub api_key: String,
    /// API 基础 URL
    pub api_base_url: String,
    /// 模型名称
    pub model_name: String,
    /// 补全端点路径
    pub endpoint: String,
    /// 批次无关的调用参数（temperature 等），不允许包含 model
    pub chat_params: Map<String, Value>,
    // --- 批处理路径 ---
    /// 单批次提示词数量上限
    pub batch_size: usize,
    /// 告知远程任务的超时小时数
    pub timeout_hours: u64,
    /// 轮询总等待上限（秒），同时受 timeout_hours * 3600 约束
    pub poll_max_wait_secs: u64,
    /// 轮询退避基础间隔（秒）
    pub poll_base_secs: u64,
    /// 轮询退避单步上限（秒）
    pub poll_cap_secs: u64,
    /// 临时 JSONL 文件存放目录
    pub work_dir: String,
    // --- 并发路径 ---
    /// 同时在途的请求数量上限
    pub max_concurrent_requests: usize,
    /// 单条请求的最大重试次数
    pub max_retries: u32,
    /// 限流退避基础间隔（秒）
    pub retry_base_secs: u64,
    /// 限流退避单步上限（秒）
    pub retry_cap_secs: u64,
    /// 传输层错误后的固定等待（毫秒）
    pub transport_retry_ms: u64,
    // --- 输入输出 ---
    /// 提示词文件（每行一条）
    pub prompts_file: String,
    /// 结果输出文件
    pub output_file: String,
    /// 运行摘要日志文件
    pub run_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Batch,
            api_key: String::new(),
            api_base_url: "https://api.mistral.ai".to_string(),
            model_name: "mistral-small-latest".to_string(),
            endpoint: "/v1/chat/completions".to_string(),
            chat_params: Map::new(),
            batch_size: 5000,
            timeout_hours: 1,
            poll_max_wait_secs: 3600,
            poll_base_secs: 3,
            poll_cap_secs: 25,
            work_dir: ".".to_string(),
            max_concurrent_requests: 100,
            max_retries: 3,
            retry_base_secs: 2,
            retry_cap_secs: 30,
            transport_retry_ms: 200,
            prompts_file: "prompts.txt".to_string(),
            output_file: "answers.csv".to_string(),
            run_log_file: "batch_log.txt".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量加载配置，缺失或无法解析的项回退到默认值
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            mode: std::env::var("DISPATCH_MODE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.mode),
            api_key: std::env::var("LLM_API_KEY").unwrap_or(default.api_key),
            api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.api_base_url),
            model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.model_name),
            endpoint: std::env::var("LLM_ENDPOINT").unwrap_or(default.endpoint),
            chat_params: default.chat_params,
            batch_size: std::env::var("BATCH_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.batch_size),
            timeout_hours: std::env::var("TIMEOUT_HOURS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.timeout_hours),
            poll_max_wait_secs: std::env::var("POLL_MAX_WAIT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_max_wait_secs),
            poll_base_secs: std::env::var("POLL_BASE_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_base_secs),
            poll_cap_secs: std::env::var("POLL_CAP_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_cap_secs),
            work_dir: std::env::var("WORK_DIR").unwrap_or(default.work_dir),
            max_concurrent_requests: std::env::var("MAX_CONCURRENT_REQUESTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_requests),
            max_retries: std::env::var("MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_retries),
            retry_base_secs: std::env::var("RETRY_BASE_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_base_secs),
            retry_cap_secs: std::env::var("RETRY_CAP_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_cap_secs),
            transport_retry_ms: std::env::var("TRANSPORT_RETRY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.transport_retry_ms),
            prompts_file: std::env::var("PROMPTS_FILE").unwrap_or(default.prompts_file),
            output_file: std::env::var("OUTPUT_FILE").unwrap_or(default.output_file),
            run_log_file: std::env::var("RUN_LOG_FILE").unwrap_or(default.run_log_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 从 TOML 配置文件加载
    ///
    /// # 参数
    /// - `path`: 配置文件路径
    pub fn from_toml_file(path: &Path) -> DispatchResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadFailed {
                path: path.display().to_string(),
                source: e,
            })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(config)
    }

    /// 加载配置：配置文件存在则读文件，否则读环境变量
    pub fn load(config_path: &str) -> DispatchResult<Self> {
        let path = Path::new(config_path);
        if path.exists() {
            Self::from_toml_file(path)
        } else {
            Ok(Self::from_env())
        }
    }

    /// 校验配置
    ///
    /// 在构造派发器时调用一次，拒绝无法工作的参数组合
    pub fn validate(&self) -> DispatchResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(invalid("api_key", "不能为空"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "必须大于 0"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(invalid("max_concurrent_requests", "必须大于 0"));
        }
        if self.timeout_hours == 0 {
            return Err(invalid("timeout_hours", "必须大于 0"));
        }
        if self.endpoint.is_empty() {
            return Err(invalid("endpoint", "不能为空"));
        }
        // model 统一由任务级参数指定，不允许塞进 chat_params
        if self.chat_params.contains_key("model") {
            return Err(DispatchError::Config(ConfigError::ModelInChatParams));
        }
        Ok(())
    }

    /// 轮询的实际总等待上限（秒）
    pub fn effective_poll_wait_secs(&self) -> u64 {
        self.poll_max_wait_secs.min(self.timeout_hours * 3600)
    }
}

fn invalid(field: &str, reason: &str) -> DispatchError {
    DispatchError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_config() -> Config {
        Config {
            api_key: "test-key".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_accepts_default_with_key() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_key() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = Config {
            batch_size: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_model_in_chat_params() {
        let mut config = valid_config();
        config
            .chat_params
            .insert("model".to_string(), json!("mistral-large-latest"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_poll_wait_capped_by_timeout_hours() {
        let config = Config {
            poll_max_wait_secs: 7200,
            timeout_hours: 1,
            ..valid_config()
        };
        assert_eq!(config.effective_poll_wait_secs(), 3600);

        let config = Config {
            poll_max_wait_secs: 600,
            timeout_hours: 2,
            ..valid_config()
        };
        assert_eq!(config.effective_poll_wait_secs(), 600);
    }

    #[test]
    fn test_from_toml() {
        let toml_text = r#"
            mode = "concurrent"
            api_key = "sk-test"
            model_name = "ministral-8b-latest"
            max_retries = 1000

            [chat_params]
            temperature = 0.2
        "#;
        let config: Config = toml::from_str(toml_text).unwrap();

        assert_eq!(config.mode, DispatchMode::Concurrent);
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model_name, "ministral-8b-latest");
        assert_eq!(config.max_retries, 1000);
        assert_eq!(config.chat_params.get("temperature"), Some(&json!(0.2)));
        // 未出现的字段取默认值
        assert_eq!(config.batch_size, 5000);
    }
}
