//! 감사 추적 문서 파서 (`App.AuditTrail`)
//!
//! `records` 배열을 담은 JSON 문서 한 줄을 파싱하여, 배열의 레코드마다
//! 이벤트 하나를 생성합니다. 각 레코드는 `eventTime`(RFC 3339)과
//! `eventName`이 필수이며, 나머지 필드는 선택입니다.
//!
//! # 문서 형식
//! ```json
//! {"records": [{"eventTime": "2020-01-03T01:01:01Z", "eventName": "CreateUser", ...}]}
//! ```

use serde::{Deserialize, Serialize};

use logsift_core::timestamp::Rfc3339;

use crate::error::PipelineError;
use crate::parser::LogParser;

/// 로그 타입명
const LOG_TYPE: &str = "App.AuditTrail";

/// 감사 문서 최상위 구조
#[derive(Debug, Deserialize)]
struct AuditDocument {
    records: Vec<AuditRecord>,
}

/// 감사 레코드 하나
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// 이벤트 발생 시각
    pub event_time: Rfc3339,
    /// 이벤트 이름 (예: "CreateUser")
    pub event_name: String,
    /// 이벤트를 발생시킨 서비스/소스
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub event_source: Option<String>,
    /// 요청을 보낸 주체 식별자
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub actor: Option<String>,
    /// 요청 출발지 주소
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_address: Option<String>,
    /// 사용자 에이전트
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_agent: Option<String>,
    /// 리전
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub region: Option<String>,
    /// 요청 ID
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_id: Option<String>,
    /// 읽기 전용 작업 여부
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub read_only: Option<bool>,
    /// 실패한 요청의 에러 코드
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_code: Option<String>,
}

/// 감사 추적 파서
#[derive(Debug)]
pub struct AuditTrailParser {
    max_input_size: usize,
}

impl AuditTrailParser {
    /// 기본 설정으로 새 파서를 생성합니다.
    pub fn new() -> Self {
        Self {
            max_input_size: 1024 * 1024, // 1MB — 문서 하나가 레코드 수백 개를 담을 수 있음
        }
    }

    fn fail(reason: impl Into<String>) -> PipelineError {
        PipelineError::Parse {
            log_type: LOG_TYPE,
            reason: reason.into(),
        }
    }
}

impl Default for AuditTrailParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser for AuditTrailParser {
    fn log_type(&self) -> &'static str {
        LOG_TYPE
    }

    fn parse(&self, line: &str) -> Result<Vec<serde_json::Value>, PipelineError> {
        if line.len() > self.max_input_size {
            return Err(Self::fail(format!(
                "input too large: {} bytes (max: {})",
                line.len(),
                self.max_input_size
            )));
        }

        let document: AuditDocument =
            serde_json::from_str(line).map_err(|e| Self::fail(e.to_string()))?;

        document
            .records
            .iter()
            .map(|record| {
                serde_json::to_value(record)
                    .map_err(|e| Self::fail(format!("serialization failed: {e}")))
            })
            .collect()
    }
}
