//! 출력 싱크 모듈 — 분류된 이벤트의 배치 전송
//!
//! 두 싱크 전략이 동일한 [`Destination`] 계약을 구현합니다:
//! - [`ObjectStoreDestination`]: gzip 압축 배치를 오브젝트 스토어에
//!   기록하고, 파티션을 등록하고, 알림을 발행합니다 (기본).
//! - [`StreamDestination`]: 고정 크기 레코드 배치를 전송 스트림으로
//!   동기 전송합니다 (보조).
//!
//! 두 싱크 모두 이벤트 채널이 닫힐 때까지 소비한 뒤, 남은 부분 배치를
//! 플러시하고 반환합니다.

pub mod client;
pub mod object_store;
pub mod s3;
pub mod stream;

pub use client::{DeliveryOutcome, Notifier, ObjectStore, PartitionCatalog, RecordStream};
pub use object_store::ObjectStoreDestination;
pub use s3::S3ObjectStore;
pub use stream::StreamDestination;

use tokio::sync::mpsc;

use logsift_core::event::ParsedEvent;

use crate::error::PipelineError;
use crate::registry::table_name;

/// 이벤트 싱크 계약
///
/// 이벤트 채널이 닫힐 때까지 소비하고, 남은 배치를 플러시한 뒤
/// 반환합니다. 에러는 에러 채널로 보고하며, 치명적 에러 이후에는
/// 생산자 교착을 막기 위해 채널을 계속 비웁니다(drain).
pub trait Destination: Send + 'static {
    /// 이벤트 소비 루프를 실행합니다.
    fn send_events(
        self,
        events: mpsc::Receiver<ParsedEvent>,
        errors: mpsc::UnboundedSender<PipelineError>,
    ) -> impl Future<Output = ()> + Send + 'static;
}

/// 로그 타입의 물리 전송 이름을 만듭니다.
///
/// 소문자화하고 구조 구분자를 `_`로 바꾼 뒤 네임스페이스 접두어를
/// 붙입니다. 예: `("logsift_data", "App.AuditTrail")` ->
/// `"logsift_data_app_audittrail"`
pub fn physical_name(prefix: &str, log_type: &str) -> String {
    format!("{prefix}_{}", table_name(log_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_name_mapping() {
        assert_eq!(
            physical_name("logsift_data", "App.AuditTrail"),
            "logsift_data_app_audittrail"
        );
        assert_eq!(physical_name("logsift_data", "Net.Flow"), "logsift_data_net_flow");
    }
}
