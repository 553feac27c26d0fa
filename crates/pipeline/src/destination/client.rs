//! 외부 협력자 trait — 싱크가 의존하는 전송 클라이언트 경계
//!
//! 싱크의 배치 로직과 실제 전송 클라이언트를 분리합니다. 프로덕션
//! 구현은 임베더(엔트리포인트 레이어)가 주입하며, 테스트는 인메모리
//! 구현을 사용합니다. 이 크레이트는 [`S3ObjectStore`](crate::destination::s3::S3ObjectStore)
//! 구현 하나를 기본 제공합니다.
//!
//! 모든 trait 메서드는 `Send` future를 반환하여 싱크 태스크를
//! `tokio::spawn`으로 실행할 수 있게 합니다.

use logsift_core::event::StorageNotification;

use crate::error::{CatalogError, DeliveryError, NotifyError, StoreError};
use crate::registry::TableDescriptor;

/// 오브젝트 스토어 — 압축된 배치 페이로드의 내구성 있는 저장소
pub trait ObjectStore: Send + Sync {
    /// 오브젝트 하나를 키 아래에 기록합니다.
    fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// 파티션 카탈로그 — 다운스트림 쿼리 엔진의 시간 버킷 파티션 등록
///
/// 등록은 멱등이어야 합니다. 이미 존재하는 파티션은
/// [`CatalogError::AlreadyExists`]로 구분되어 성공으로 취급됩니다.
pub trait PartitionCatalog: Send + Sync {
    /// 시간 버킷 파티션 하나를 등록합니다.
    ///
    /// `location`은 파티션 데이터의 전체 경로, `values`는 시간 버킷
    /// 컴포넌트 값 목록입니다 (예: `["2020", "01", "03", "01"]`).
    fn create_partition(
        &self,
        table: &TableDescriptor,
        location: &str,
        values: &[String],
    ) -> impl Future<Output = Result<(), CatalogError>> + Send;
}

/// 알림 발행자 — 배치 기록 완료를 다운스트림 소비자에게 전달
pub trait Notifier: Send + Sync {
    /// 알림 하나를 발행합니다.
    fn publish(
        &self,
        notification: &StorageNotification,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// 레코드 배치 전송 결과
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryOutcome {
    /// 전송에 실패(거부)된 레코드 수. 0이 아니면 배치 단위 실패입니다.
    pub failed_records: usize,
}

/// 레코드 스트림 — 스트리밍 전송 싱크의 배치 전송 호출
pub trait RecordStream: Send + Sync {
    /// 레코드 배치 하나를 지정한 스트림으로 전송합니다.
    fn put_record_batch(
        &self,
        stream_name: &str,
        records: &[bytes::Bytes],
    ) -> impl Future<Output = Result<DeliveryOutcome, DeliveryError>> + Send;
}
