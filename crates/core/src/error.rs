//! 에러 타입 — 도메인별 에러 정의

/// Logsift 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogsiftError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
///
/// 파이프라인 크레이트의 도메인 에러는 이 타입으로 변환되어
/// 상위 레이어에 전파됩니다.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 처리 실패 (스트림 읽기, 분류, 전송 등)
    #[error("processing failed: {0}")]
    ProcessingFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "max_batch_bytes".to_owned(),
            reason: "must be greater than 0".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("max_batch_bytes"));
        assert!(msg.contains("greater than 0"));
    }

    #[test]
    fn pipeline_error_wraps_into_logsift_error() {
        let err: LogsiftError = PipelineError::ChannelSend("receiver dropped".to_owned()).into();
        assert!(matches!(err, LogsiftError::Pipeline(_)));
        assert!(err.to_string().contains("receiver dropped"));
    }

    #[test]
    fn io_error_wraps_into_logsift_error() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: LogsiftError = io.into();
        assert!(matches!(err, LogsiftError::Io(_)));
    }
}
