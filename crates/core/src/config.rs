//! 설정 관리 — logsift.toml 파싱 및 런타임 설정
//!
//! [`LogsiftConfig`]는 파이프라인과 싱크의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`LOGSIFT_OBJECT_STORE_BUCKET=processed-logs` 형식)
//! 2. 설정 파일 (`logsift.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logsift_core::error::LogsiftError> {
//! use logsift_core::config::LogsiftConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogsiftConfig::load("logsift.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogsiftConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LogsiftError};

/// Logsift 통합 설정
///
/// `logsift.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsiftConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 파이프라인 설정
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// 오브젝트 스토어 싱크 설정
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    /// 스트리밍 전송 싱크 설정
    #[serde(default)]
    pub stream: StreamConfig,
}

/// 일반 설정 (로깅)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 출력 형식 ("json" 또는 "pretty")
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 공유 이벤트 채널 용량
    ///
    /// 스트림 태스크와 싱크 태스크의 I/O 특성이 다르므로, 싱크가
    /// 일시적으로 느려져도 스트림 태스크가 곧바로 막히지 않도록
    /// 버퍼를 둡니다. 버퍼가 가득 차면 스트림 태스크는 자연스럽게
    /// 역압(backpressure)으로 대기합니다.
    pub event_buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
        }
    }
}

/// 오브젝트 스토어 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    /// 배치가 기록될 버킷명
    pub bucket: String,
    /// 배치 기록 알림을 발행할 토픽
    pub notify_topic: String,
    /// 배치 최대 크기 (압축 전 바이트). 초과 시 새 배치를 시작합니다.
    pub max_batch_bytes: usize,
    /// 배치 최대 보유 시간 (초). 경과 시 크기와 무관하게 플러시합니다.
    pub max_batch_age_secs: u64,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            notify_topic: String::new(),
            // 압축 전 100MB, 압축 후 대략 10MB 내외의 오브젝트가 됩니다.
            max_batch_bytes: 100 * 1000 * 1000,
            max_batch_age_secs: 60,
        }
    }
}

/// 스트리밍 전송 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// 전송 스트림 이름 접두어 (예: "logsift_data")
    pub name_prefix: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name_prefix: "logsift_data".to_owned(),
        }
    }
}

impl LogsiftConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogsiftError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogsiftError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogsiftError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogsiftError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogsiftError> {
        toml::from_str(toml_str).map_err(|e| {
            LogsiftError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGSIFT_{SECTION}_{FIELD}`
    /// 예: `LOGSIFT_OBJECT_STORE_BUCKET=processed-logs`
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "LOGSIFT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSIFT_GENERAL_LOG_FORMAT");

        override_usize(
            &mut self.pipeline.event_buffer_size,
            "LOGSIFT_PIPELINE_EVENT_BUFFER_SIZE",
        );

        override_string(&mut self.object_store.bucket, "LOGSIFT_OBJECT_STORE_BUCKET");
        override_string(
            &mut self.object_store.notify_topic,
            "LOGSIFT_OBJECT_STORE_NOTIFY_TOPIC",
        );
        override_usize(
            &mut self.object_store.max_batch_bytes,
            "LOGSIFT_OBJECT_STORE_MAX_BATCH_BYTES",
        );
        override_u64(
            &mut self.object_store.max_batch_age_secs,
            "LOGSIFT_OBJECT_STORE_MAX_BATCH_AGE_SECS",
        );

        override_string(&mut self.stream.name_prefix, "LOGSIFT_STREAM_NAME_PREFIX");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogsiftError> {
        const MAX_EVENT_BUFFER: usize = 1_000_000;
        const MAX_BATCH_AGE_SECS: u64 = 3600;

        match self.general.log_format.as_str() {
            "json" | "pretty" => {}
            other => {
                return Err(invalid("general.log_format", format!("unknown format '{other}'")));
            }
        }

        if self.pipeline.event_buffer_size == 0
            || self.pipeline.event_buffer_size > MAX_EVENT_BUFFER
        {
            return Err(invalid(
                "pipeline.event_buffer_size",
                format!("must be 1-{MAX_EVENT_BUFFER}"),
            ));
        }

        if self.object_store.max_batch_bytes == 0 {
            return Err(invalid("object_store.max_batch_bytes", "must be greater than 0"));
        }

        if self.object_store.max_batch_age_secs == 0
            || self.object_store.max_batch_age_secs > MAX_BATCH_AGE_SECS
        {
            return Err(invalid(
                "object_store.max_batch_age_secs",
                format!("must be 1-{MAX_BATCH_AGE_SECS}"),
            ));
        }

        if self.stream.name_prefix.is_empty() {
            return Err(invalid("stream.name_prefix", "must not be empty"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> LogsiftError {
    LogsiftError::Config(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    })
}

fn override_string(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *target = value;
    }
}

fn override_usize(target: &mut usize, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring non-numeric env override"),
        }
    }
}

fn override_u64(target: &mut u64, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring non-numeric env override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_is_valid() {
        LogsiftConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let config = LogsiftConfig::parse(
            "[object_store]\nbucket = \"processed-logs\"\nmax_batch_bytes = 1024\n",
        )
        .unwrap();
        assert_eq!(config.object_store.bucket, "processed-logs");
        assert_eq!(config.object_store.max_batch_bytes, 1024);
        // 나머지 섹션은 기본값
        assert_eq!(config.pipeline.event_buffer_size, 1000);
        assert_eq!(config.object_store.max_batch_age_secs, 60);
    }

    #[test]
    fn parse_rejects_malformed_toml() {
        assert!(LogsiftConfig::parse("[general\nlog_level = ").is_err());
    }

    #[test]
    fn validate_rejects_zero_buffer() {
        let mut config = LogsiftConfig::default();
        config.pipeline.event_buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = LogsiftConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_batch_age() {
        let mut config = LogsiftConfig::default();
        config.object_store.max_batch_age_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_override_applies() {
        unsafe {
            std::env::set_var("LOGSIFT_OBJECT_STORE_BUCKET", "from-env");
            std::env::set_var("LOGSIFT_PIPELINE_EVENT_BUFFER_SIZE", "64");
        }
        let mut config = LogsiftConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("LOGSIFT_OBJECT_STORE_BUCKET");
            std::env::remove_var("LOGSIFT_PIPELINE_EVENT_BUFFER_SIZE");
        }
        assert_eq!(config.object_store.bucket, "from-env");
        assert_eq!(config.pipeline.event_buffer_size, 64);
    }

    #[test]
    #[serial]
    fn env_override_ignores_non_numeric() {
        unsafe {
            std::env::set_var("LOGSIFT_PIPELINE_EVENT_BUFFER_SIZE", "lots");
        }
        let mut config = LogsiftConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("LOGSIFT_PIPELINE_EVENT_BUFFER_SIZE");
        }
        assert_eq!(config.pipeline.event_buffer_size, 1000);
    }

    #[tokio::test]
    async fn from_file_missing_reports_not_found() {
        let err = LogsiftConfig::from_file("/nonexistent/logsift.toml")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
