#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`classify`]: 패널티 기반 적응형 분류기와 파서 우선순위 큐
//! - [`parser`]: 스키마 파서 trait과 기본 스키마 (`Net.Flow`, `App.AuditTrail`)
//! - [`registry`]: 로그 타입 -> {파서, 출력 테이블} 불변 레지스트리
//! - [`processor`]: 스트림 fan-out / 싱크 fan-in 오케스트레이션
//! - [`destination`]: 오브젝트 스토어 싱크와 스트리밍 전송 싱크
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! DataStreams -> StreamProcessor(Classifier) -> mpsc -> Destination
//!      |                  |                               |
//!   수집 레이어      SchemaRegistry 후보          gzip 배치 / 레코드 배치
//! ```

pub mod classify;
pub mod destination;
pub mod error;
pub mod parser;
pub mod processor;
pub mod registry;

// --- 주요 타입 re-export ---

// 분류기
pub use classify::{Classifier, ClassifierResult, ClassifierStats, ParserStats};

// 에러
pub use error::PipelineError;

// 파서
pub use parser::{AuditTrailParser, FlowParser, LogParser};

// 오케스트레이터
pub use processor::{process, process_with_config};

// 레지스트리
pub use registry::{SchemaEntry, SchemaRegistry, TableDescriptor, TimeBin};

// 싱크
pub use destination::{
    Destination, Notifier, ObjectStore, ObjectStoreDestination, PartitionCatalog, RecordStream,
    S3ObjectStore, StreamDestination,
};
