//! 네트워크 플로우 레코드 파서 (`Net.Flow`)
//!
//! 공백 구분 14컬럼 플로우 레코드를 파싱합니다. 플로우 로그 파일은
//! 보통 첫 줄에 컬럼 헤더를 포함하므로, 헤더 줄은 매칭 성공이되
//! 이벤트를 만들지 않습니다.
//!
//! # 레코드 형식
//! ```text
//! version account interface-id srcaddr dstaddr srcport dstport protocol packets bytes start end action status
//! ```
//!
//! 값이 없는 컬럼은 `-` 또는 `unknown`으로 기록됩니다.
//! `start`/`end`는 Unix epoch 초입니다.

use serde::Serialize;

use logsift_core::timestamp::UnixEpoch;

use crate::error::PipelineError;
use crate::parser::LogParser;

/// 기대하는 헤더 줄 (컬럼이 더 있을 수 있어 prefix 비교)
const FLOW_HEADER: &str =
    "version account-id interface-id srcaddr dstaddr srcport dstport protocol packets bytes start end action log-status";

/// 최소 컬럼 수
const FLOW_MIN_COLUMNS: usize = 14;

/// 로그 타입명
const LOG_TYPE: &str = "Net.Flow";

/// 파싱된 플로우 레코드 하나
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRecord {
    /// 플로우 로그 버전
    pub version: i64,
    /// 계정 ID (12자리 숫자, 없으면 생략)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// 네트워크 인터페이스 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_id: Option<String>,
    /// 출발지 주소
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_addr: Option<String>,
    /// 목적지 주소
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_addr: Option<String>,
    /// 출발지 포트
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port: Option<u16>,
    /// 목적지 포트
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_port: Option<u16>,
    /// IP 프로토콜 번호
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<i64>,
    /// 패킷 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets: Option<i64>,
    /// 바이트 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<i64>,
    /// 플로우 시작 시각
    pub start: UnixEpoch,
    /// 플로우 종료 시각
    pub end: UnixEpoch,
    /// 허용/거부 (ACCEPT 또는 REJECT)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// 로깅 상태 (OK, NODATA, SKIPDATA)
    pub status: String,
}

/// 네트워크 플로우 파서
#[derive(Debug)]
pub struct FlowParser {
    max_input_size: usize,
}

impl Default for FlowParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowParser {
    /// 기본 설정으로 새 파서를 생성합니다.
    pub fn new() -> Self {
        Self {
            max_input_size: 64 * 1024, // 64KB
        }
    }

    fn fail(reason: impl Into<String>) -> PipelineError {
        PipelineError::Parse {
            log_type: LOG_TYPE,
            reason: reason.into(),
        }
    }

    fn parse_flow(&self, line: &str) -> Result<Vec<serde_json::Value>, PipelineError> {
        if line.len() > self.max_input_size {
            return Err(Self::fail(format!(
                "input too large: {} bytes (max: {})",
                line.len(),
                self.max_input_size
            )));
        }

        // 헤더 줄은 이 타입에 속하지만 이벤트를 만들지 않습니다
        if line.starts_with(FLOW_HEADER) {
            return Ok(Vec::new());
        }

        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < FLOW_MIN_COLUMNS {
            return Err(Self::fail(format!(
                "wrong number of columns: {} (expected at least {})",
                columns.len(),
                FLOW_MIN_COLUMNS
            )));
        }

        let version = columns[0]
            .parse::<i64>()
            .map_err(|_| Self::fail(format!("invalid version: {}", columns[0])))?;

        let account = match field(columns[1]) {
            Some(value) if value.len() == 12 && value.bytes().all(|b| b.is_ascii_digit()) => {
                Some(value)
            }
            Some(value) => {
                return Err(Self::fail(format!("invalid account id: {value}")));
            }
            None => None,
        };

        let source_port = port_field(columns[5])?;
        let dest_port = port_field(columns[6])?;

        let start = epoch_field(columns[10], "start")?;
        let end = epoch_field(columns[11], "end")?;

        let action = match field(columns[12]) {
            Some(value) if value == "ACCEPT" || value == "REJECT" => Some(value),
            Some(value) => return Err(Self::fail(format!("invalid action: {value}"))),
            None => None,
        };

        let status = match field(columns[13]) {
            Some(value) if value == "OK" || value == "NODATA" || value == "SKIPDATA" => value,
            Some(value) => return Err(Self::fail(format!("invalid status: {value}"))),
            None => return Err(Self::fail("missing status")),
        };

        let record = FlowRecord {
            version,
            account,
            interface_id: field(columns[2]),
            source_addr: field(columns[3]),
            dest_addr: field(columns[4]),
            source_port,
            dest_port,
            protocol: int_field(columns[7]),
            packets: int_field(columns[8]),
            bytes: int_field(columns[9]),
            start,
            end,
            action,
            status,
        };

        let value = serde_json::to_value(&record)
            .map_err(|e| Self::fail(format!("serialization failed: {e}")))?;
        Ok(vec![value])
    }
}

impl LogParser for FlowParser {
    fn log_type(&self) -> &'static str {
        LOG_TYPE
    }

    fn parse(&self, line: &str) -> Result<Vec<serde_json::Value>, PipelineError> {
        self.parse_flow(line)
    }
}

/// `-`/`unknown`을 결측값으로 처리합니다.
fn field(raw: &str) -> Option<String> {
    match raw {
        "-" | "unknown" => None,
        other => Some(other.to_owned()),
    }
}

/// 숫자 컬럼. 결측이거나 숫자가 아니면 `None`.
fn int_field(raw: &str) -> Option<i64> {
    field(raw)?.parse().ok()
}

/// 포트 컬럼. 존재하면 0-65535 범위를 검증합니다.
fn port_field(raw: &str) -> Result<Option<u16>, PipelineError> {
    match field(raw) {
        None => Ok(None),
        Some(value) => value
            .parse::<u16>()
            .map(Some)
            .map_err(|_| FlowParser::fail(format!("invalid port: {value}"))),
    }
}

/// epoch 초 컬럼 (필수).
fn epoch_field(raw: &str, name: &str) -> Result<UnixEpoch, PipelineError> {
    let secs = raw
        .parse::<i64>()
        .map_err(|_| FlowParser::fail(format!("invalid {name} time: {raw}")))?;
    UnixEpoch::from_secs(secs, 0)
        .ok_or_else(|| FlowParser::fail(format!("{name} time out of range: {secs}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "2 348372346321 eni-00184058652e5a320 10.0.0.1 10.0.0.2 39812 80 6 10 4306 1577840461 1577840521 ACCEPT OK";

    #[test]
    fn parses_valid_record() {
        let parser = FlowParser::new();
        let events = parser.parse(SAMPLE).unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event["version"], 2);
        assert_eq!(event["account"], "348372346321");
        assert_eq!(event["sourcePort"], 39812);
        assert_eq!(event["action"], "ACCEPT");
        assert_eq!(event["status"], "OK");
        assert_eq!(event["start"], "2020-01-01 01:01:01.000000000");
    }

    #[test]
    fn header_line_matches_without_events() {
        let parser = FlowParser::new();
        let events = parser
            .parse("version account-id interface-id srcaddr dstaddr srcport dstport protocol packets bytes start end action log-status")
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn missing_fields_are_omitted() {
        let parser = FlowParser::new();
        let line = "2 unknown eni-0608191d unknown unknown - - - - - 1577840461 1577840521 - NODATA";
        let events = parser.parse(line).unwrap();
        let event = &events[0];
        assert!(event.get("account").is_none());
        assert!(event.get("sourcePort").is_none());
        assert!(event.get("action").is_none());
        assert_eq!(event["status"], "NODATA");
    }

    #[test]
    fn rejects_too_few_columns() {
        let parser = FlowParser::new();
        assert!(parser.parse("2 348372346321 eni-1 10.0.0.1").is_err());
    }

    #[test]
    fn rejects_non_flow_line() {
        let parser = FlowParser::new();
        assert!(parser.parse("{\"records\": []}").is_err());
    }

    #[test]
    fn rejects_out_of_range_port() {
        let parser = FlowParser::new();
        let line = "2 348372346321 eni-1 10.0.0.1 10.0.0.2 99999 80 6 10 4306 1577840461 1577840521 ACCEPT OK";
        assert!(parser.parse(line).is_err());
    }

    #[test]
    fn rejects_bad_account_id() {
        let parser = FlowParser::new();
        let line = "2 notanaccount eni-1 10.0.0.1 10.0.0.2 39812 80 6 10 4306 1577840461 1577840521 ACCEPT OK";
        assert!(parser.parse(line).is_err());
    }

    #[test]
    fn rejects_bad_status() {
        let parser = FlowParser::new();
        let line = "2 348372346321 eni-1 10.0.0.1 10.0.0.2 39812 80 6 10 4306 1577840461 1577840521 ACCEPT BROKEN";
        assert!(parser.parse(line).is_err());
    }

    proptest! {
        // 어떤 입력에도 패닉하지 않아야 합니다 (분류기 내에서 반복 시도되므로)
        #[test]
        fn never_panics_on_arbitrary_input(line in ".{0,256}") {
            let parser = FlowParser::new();
            let _ = parser.parse(&line);
        }
    }
}
