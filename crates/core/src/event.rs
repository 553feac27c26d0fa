//! 이벤트/스트림 타입 — 파이프라인 단계 간에 흐르는 데이터 단위
//!
//! [`DataStream`]은 수집 레이어가 만들어 오케스트레이터에 넘기는 입력
//! 단위이고, [`ParsedEvent`]는 분류기가 생성하여 채널을 통해 싱크로
//! 전달되는 출력 단위입니다. [`StorageNotification`]은 오브젝트 스토어
//! 싱크가 배치 하나를 기록할 때마다 발행하는 알림 페이로드입니다.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

/// 스트림 리더 핸들
///
/// 수집 레이어가 오브젝트 스토리지 fetch/압축 해제를 끝낸 뒤 넘겨주는
/// 바이트 스트림입니다. 오케스트레이터는 이를 줄 단위로 읽습니다.
pub type StreamReader = Box<dyn AsyncRead + Send + Unpin>;

/// 분류 완료된 구조화 이벤트 하나
///
/// 분류기 → 싱크로 소유권이 이동하며, 전송 이후에는 싱크만 접근합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedEvent {
    /// 이벤트 페이로드 (스키마별 구조를 직렬화한 JSON)
    pub event: serde_json::Value,
    /// 로그 타입명 (예: "Net.Flow")
    pub log_type: String,
}

impl ParsedEvent {
    /// 새 이벤트를 생성합니다.
    pub fn new(log_type: impl Into<String>, event: serde_json::Value) -> Self {
        Self {
            event,
            log_type: log_type.into(),
        }
    }
}

/// 처리 대상 입력 스트림 하나
///
/// 한 번의 처리 실행 동안 오케스트레이터가 소유하며, 실행이 끝나면
/// 폐기됩니다.
pub struct DataStream {
    /// 바이트 스트림 핸들
    pub reader: StreamReader,
    /// 스트림 출처 힌트 (진단 로그용)
    pub hints: StreamHints,
    /// 이미 알고 있는 로그 타입 (수집 레이어가 판별한 경우)
    ///
    /// `None`이면 분류기가 타입을 판별합니다.
    pub log_type: Option<String>,
}

impl DataStream {
    /// 힌트 없는 스트림을 생성합니다.
    pub fn new(reader: StreamReader) -> Self {
        Self {
            reader,
            hints: StreamHints::default(),
            log_type: None,
        }
    }

    /// 출처 힌트를 설정합니다.
    pub fn with_hints(mut self, hints: StreamHints) -> Self {
        self.hints = hints;
        self
    }

    /// 알려진 로그 타입을 설정합니다.
    pub fn with_log_type(mut self, log_type: impl Into<String>) -> Self {
        self.log_type = Some(log_type.into());
        self
    }
}

impl fmt::Debug for DataStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStream")
            .field("hints", &self.hints)
            .field("log_type", &self.log_type)
            .finish_non_exhaustive()
    }
}

/// 스트림 출처 힌트
///
/// 진단 로그에 포함되어 문제 스트림을 추적할 수 있게 합니다.
/// 로그 내용 자체는 절대 포함하지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct StreamHints {
    /// 오브젝트 스토리지에서 온 스트림인 경우의 힌트. `None`이면 힌트 없음.
    pub object: Option<ObjectHints>,
}

/// 오브젝트 스토리지 출처 힌트
#[derive(Debug, Clone)]
pub struct ObjectHints {
    /// 버킷명
    pub bucket: String,
    /// 오브젝트 키
    pub key: String,
    /// 콘텐츠 타입
    pub content_type: String,
}

/// 알림 페이로드의 데이터 종류: 로그 이벤트
pub const DATA_KIND_LOG: &str = "LogData";

/// 배치 기록 완료 알림
///
/// 오브젝트 스토어 싱크가 배치 하나를 쓰고 파티션을 등록한 뒤
/// 다운스트림 소비자에게 발행하는 고정 JSON 페이로드입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNotification {
    /// 데이터가 기록된 버킷
    pub bucket: String,
    /// 기록된 오브젝트 키
    pub key: String,
    /// 오브젝트에 포함된 이벤트 수
    pub events: usize,
    /// 압축 전 바이트 수
    pub bytes: usize,
    /// 데이터 종류 (현재는 항상 [`DATA_KIND_LOG`])
    #[serde(rename = "type")]
    pub kind: String,
    /// 데이터 식별자 — 로그 데이터의 경우 로그 타입명
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_event_carries_log_type() {
        let event = ParsedEvent::new("Net.Flow", serde_json::json!({"bytes": 42}));
        assert_eq!(event.log_type, "Net.Flow");
        assert_eq!(event.event["bytes"], 42);
    }

    #[test]
    fn data_stream_builder_sets_hints() {
        let reader: StreamReader = Box::new(std::io::Cursor::new(Vec::new()));
        let stream = DataStream::new(reader)
            .with_hints(StreamHints {
                object: Some(ObjectHints {
                    bucket: "raw-logs".to_owned(),
                    key: "2020/01/03/batch.gz".to_owned(),
                    content_type: "application/gzip".to_owned(),
                }),
            })
            .with_log_type("Net.Flow");
        assert_eq!(stream.log_type.as_deref(), Some("Net.Flow"));
        assert_eq!(stream.hints.object.as_ref().unwrap().bucket, "raw-logs");
    }

    #[test]
    fn data_stream_debug_omits_reader() {
        let reader: StreamReader = Box::new(std::io::Cursor::new(Vec::new()));
        let debug = format!("{:?}", DataStream::new(reader));
        assert!(debug.contains("DataStream"));
        assert!(!debug.contains("reader"));
    }

    #[test]
    fn notification_wire_shape_is_stable() {
        let notification = StorageNotification {
            bucket: "processed-logs".to_owned(),
            key: "logs/net_flow/year=2020/month=01/day=03/hour=01/x.gz".to_owned(),
            events: 10,
            bytes: 1234,
            kind: DATA_KIND_LOG.to_owned(),
            id: "Net.Flow".to_owned(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&notification).unwrap()).unwrap();
        assert_eq!(json["bucket"], "processed-logs");
        assert_eq!(json["events"], 10);
        assert_eq!(json["type"], "LogData");
        assert_eq!(json["id"], "Net.Flow");
    }

    #[test]
    fn notification_roundtrip() {
        let notification = StorageNotification {
            bucket: "b".to_owned(),
            key: "k".to_owned(),
            events: 1,
            bytes: 2,
            kind: DATA_KIND_LOG.to_owned(),
            id: "App.AuditTrail".to_owned(),
        };
        let json = serde_json::to_string(&notification).unwrap();
        let back: StorageNotification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, notification);
    }
}
