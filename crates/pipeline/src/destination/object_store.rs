//! 오브젝트 스토어 싱크 — gzip 배치 기록, 파티션 등록, 알림 발행
//!
//! 로그 타입별로 배치 하나를 유지하며 이벤트를 스트리밍 압축으로
//! 누적합니다. 배치는 다음 조건에서 플러시됩니다:
//! - 크기: 추가 시 압축 전 최대 크기를 초과하는 경우 (기본 100MB)
//! - 시간: 첫 이벤트 이후 최대 보유 시간 경과 (기본 1분) — 저볼륨
//!   타입의 전달 지연을 제한합니다. 이벤트 유입마다 검사합니다.
//! - 종료: 이벤트 채널이 닫히면 남은 배치를 모두 플러시합니다.
//!
//! 플러시는 {테이블 접두어}/{시간 버킷 파티션}/{타임스탬프}-{uuid}.gz
//! 키에 페이로드를 기록하고, 해당 시간 버킷 파티션을 최선 노력으로
//! 등록한 뒤 (실행 내 캐시로 중복 등록을 건너뜀), 알림을 발행합니다.
//! 치명적 에러 이후에는 생산자 교착을 막기 위해 채널을 계속 비우되
//! 아무 작업도 하지 않습니다.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::sync::mpsc;
use uuid::Uuid;

use logsift_core::config::ObjectStoreConfig;
use logsift_core::event::{DATA_KIND_LOG, ParsedEvent, StorageNotification};
use logsift_core::metrics::{
    LABEL_LOG_TYPE, SINK_BATCHES_FLUSHED_TOTAL, SINK_FLUSH_DURATION_SECONDS,
    SINK_PARTITIONS_REGISTERED_TOTAL,
};
use logsift_core::oplog::OpLogManager;

use crate::destination::Destination;
use crate::destination::client::{Notifier, ObjectStore, PartitionCatalog};
use crate::error::{CatalogError, PipelineError};
use crate::registry::{SchemaEntry, SchemaRegistry};

const SINK_OPLOG: OpLogManager = OpLogManager::new("logsift", "sink");

/// 오브젝트 스토어 싱크
///
/// 파티션 등록 캐시와 타입별 배치 상태는 싱크 인스턴스 하나가 단독
/// 소유하므로 동기화가 필요 없습니다.
pub struct ObjectStoreDestination<S, C, N> {
    store: S,
    catalog: C,
    notifier: N,
    registry: Arc<SchemaRegistry>,
    config: ObjectStoreConfig,
    /// 실행 내에서 이미 등록한 파티션 경로. 무효화하지 않습니다 —
    /// 캐시 미스는 등록 호출 하나를 더 만들 뿐 정합성 문제가 아닙니다.
    partition_cache: HashSet<String>,
}

impl<S, C, N> ObjectStoreDestination<S, C, N>
where
    S: ObjectStore,
    C: PartitionCatalog,
    N: Notifier,
{
    /// 새 싱크를 생성합니다.
    pub fn new(
        registry: Arc<SchemaRegistry>,
        config: ObjectStoreConfig,
        store: S,
        catalog: C,
        notifier: N,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            registry,
            config,
            partition_cache: HashSet::new(),
        }
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<ParsedEvent>,
        errors: mpsc::UnboundedSender<PipelineError>,
    ) {
        let mut batches: BTreeMap<String, EventBatch> = BTreeMap::new();
        let mut failed = false;
        let mut processed: u64 = 0;

        tracing::debug!("starting to read events from channel");
        while let Some(event) = events.recv().await {
            if failed {
                // drain-and-discard: 생산자 교착을 막기 위해 소비만 계속합니다
                continue;
            }
            processed += 1;

            let data = match serde_json::to_vec(&event.event) {
                Ok(data) => data,
                Err(err) => {
                    failed = true;
                    report(
                        &errors,
                        PipelineError::Marshal {
                            log_type: event.log_type.clone(),
                            reason: err.to_string(),
                        },
                    );
                    continue;
                }
            };

            if let Err(err) = self.ingest(&mut batches, &event.log_type, &data).await {
                failed = true;
                report(&errors, err);
                continue;
            }

            if let Err(err) = self.sweep_expired(&mut batches).await {
                failed = true;
                report(&errors, err);
            }
        }

        if failed {
            tracing::debug!("sink failed earlier, drained remaining events");
        }

        // 채널이 닫혔으므로 남은 배치를 모두 플러시합니다. 플러시 하나가
        // 실패해도 나머지 배치는 계속 내보내 손실을 최소화합니다.
        tracing::debug!("event channel closed, flushing remaining batches");
        for (log_type, batch) in std::mem::take(&mut batches) {
            if batch.is_empty() {
                continue;
            }
            if let Err(err) = self.flush(&log_type, batch).await {
                report(&errors, err);
            }
        }
        tracing::debug!(events = processed, "finished sending events");
    }

    /// 이벤트 하나를 해당 타입의 배치에 추가합니다.
    ///
    /// 배치가 가득 차면 플러시하고 새 배치에 다시 시도합니다. 빈 배치에도
    /// 들어가지 않는 이벤트는 분할하지 않고 실패 처리합니다.
    async fn ingest(
        &mut self,
        batches: &mut BTreeMap<String, EventBatch>,
        log_type: &str,
        data: &[u8],
    ) -> Result<(), PipelineError> {
        let max_bytes = self.config.max_batch_bytes;

        let fits = batches
            .entry(log_type.to_owned())
            .or_insert_with(EventBatch::new)
            .add(data, max_bytes)?;
        if fits {
            return Ok(());
        }

        if let Some(full) = batches.remove(log_type) {
            if !full.is_empty() {
                self.flush(log_type, full).await?;
            }
        }

        let fits = batches
            .entry(log_type.to_owned())
            .or_insert_with(EventBatch::new)
            .add(data, max_bytes)?;
        if fits {
            Ok(())
        } else {
            Err(PipelineError::EventTooLarge {
                log_type: log_type.to_owned(),
                bytes: data.len() + 1,
                max_bytes,
            })
        }
    }

    /// 최대 보유 시간을 넘긴 배치를 플러시합니다.
    async fn sweep_expired(
        &mut self,
        batches: &mut BTreeMap<String, EventBatch>,
    ) -> Result<(), PipelineError> {
        let max_age = Duration::from_secs(self.config.max_batch_age_secs);
        let expired: Vec<String> = batches
            .iter()
            .filter(|(_, batch)| !batch.is_empty() && batch.age() > max_age)
            .map(|(log_type, _)| log_type.clone())
            .collect();

        for log_type in expired {
            if let Some(batch) = batches.remove(&log_type) {
                self.flush(&log_type, batch).await?;
            }
        }
        Ok(())
    }

    /// 배치 하나를 기록/등록/알림까지 완료합니다.
    async fn flush(&mut self, log_type: &str, batch: EventBatch) -> Result<(), PipelineError> {
        let mut operation = SINK_OPLOG.start("flush").dim("log_type", log_type);
        let result = self.flush_inner(log_type, batch).await;
        operation.stop();
        match &result {
            Ok(()) => {
                metrics::counter!(SINK_BATCHES_FLUSHED_TOTAL, LABEL_LOG_TYPE => log_type.to_owned())
                    .increment(1);
                metrics::histogram!(SINK_FLUSH_DURATION_SECONDS)
                    .record(operation.elapsed().as_secs_f64());
                operation.log_success();
            }
            Err(err) => operation.log_error(err),
        }
        result
    }

    async fn flush_inner(&mut self, log_type: &str, batch: EventBatch) -> Result<(), PipelineError> {
        let registry = Arc::clone(&self.registry);
        let entry = registry
            .lookup(log_type)
            .ok_or_else(|| PipelineError::UnknownLogType(log_type.to_owned()))?;

        let (payload, bytes, events, first_event_at) = batch.finish()?;
        let key = object_key(entry, first_event_at);

        tracing::debug!(
            bucket = %self.config.bucket,
            key = %key,
            events,
            content_length = payload.len(),
            "writing batch object"
        );
        self.store
            .put_object(&key, payload)
            .await
            .map_err(PipelineError::ObjectWrite)?;

        // 파티션 등록은 최선 노력입니다 — 실패해도 배치 전달을 막지 않습니다
        self.register_partition(entry, first_event_at).await;

        let notification = StorageNotification {
            bucket: self.config.bucket.clone(),
            key,
            events,
            bytes,
            kind: DATA_KIND_LOG.to_owned(),
            id: log_type.to_owned(),
        };
        self.notifier
            .publish(&notification)
            .await
            .map_err(PipelineError::Notify)?;

        Ok(())
    }

    /// 시간 버킷 파티션을 등록합니다 (멱등, 최선 노력).
    ///
    /// 이미 존재한다는 응답은 성공으로 취급하고 캐시합니다. 그 외 실패는
    /// 경고로 남기고 계속 진행합니다.
    async fn register_partition(&mut self, entry: &SchemaEntry, at: DateTime<Utc>) {
        let partition_path = entry.table.partition_prefix(at);
        if self.partition_cache.contains(&partition_path) {
            return;
        }

        let mut operation = SINK_OPLOG
            .start("register_partition")
            .dim("partition", partition_path.clone());
        let location = format!("{}/{}", self.config.bucket, partition_path);
        let values = entry.table.partition_values(at);
        let result = self
            .catalog
            .create_partition(&entry.table, &location, &values)
            .await;
        operation.stop();

        match result {
            Ok(()) => {
                self.partition_cache.insert(partition_path);
                metrics::counter!(SINK_PARTITIONS_REGISTERED_TOTAL).increment(1);
                operation.log_success();
            }
            Err(CatalogError::AlreadyExists) => {
                self.partition_cache.insert(partition_path);
                operation.log_success();
            }
            Err(err) => operation.log_warn(&err),
        }
    }
}

impl<S, C, N> Destination for ObjectStoreDestination<S, C, N>
where
    S: ObjectStore + 'static,
    C: PartitionCatalog + 'static,
    N: Notifier + 'static,
{
    fn send_events(
        self,
        events: mpsc::Receiver<ParsedEvent>,
        errors: mpsc::UnboundedSender<PipelineError>,
    ) -> impl Future<Output = ()> + Send + 'static {
        self.run(events, errors)
    }
}

/// 배치 오브젝트 키를 만듭니다.
///
/// 예: `logs/net_flow/year=2020/month=01/day=03/hour=01/20200103T010101Z-<uuid>.gz`
fn object_key(entry: &SchemaEntry, first_event_at: DateTime<Utc>) -> String {
    format!(
        "{}{}-{}.gz",
        entry.table.partition_prefix(first_event_at),
        first_event_at.format("%Y%m%dT%H%M%SZ"),
        Uuid::new_v4(),
    )
}

fn report(errors: &mpsc::UnboundedSender<PipelineError>, err: PipelineError) {
    if errors.send(err).is_err() {
        tracing::error!("error channel closed before sink error could be reported");
    }
}

/// 같은 로그 타입 이벤트들의 누적 배치
///
/// 이벤트는 추가되는 즉시 줄바꿈 구분자와 함께 스트리밍 압축됩니다.
/// 타입당 동시에 하나만 존재합니다.
struct EventBatch {
    encoder: GzEncoder<Vec<u8>>,
    /// 압축 전 크기 (구분자 포함)
    bytes: usize,
    events: usize,
    /// 시간 플러시 판정용. tokio 시계를 사용하므로 테스트에서 시간을
    /// 멈추고 진행시킬 수 있습니다.
    opened_at: tokio::time::Instant,
    /// 파티션 경로와 오브젝트 키에 쓰이는 첫 이벤트 처리 시각
    first_event_at: DateTime<Utc>,
}

impl EventBatch {
    fn new() -> Self {
        Self {
            encoder: GzEncoder::new(Vec::new(), Compression::default()),
            bytes: 0,
            events: 0,
            opened_at: tokio::time::Instant::now(),
            first_event_at: Utc::now(),
        }
    }

    /// 이벤트를 추가합니다.
    ///
    /// 추가 시 압축 전 크기가 `max_bytes`를 넘으면 추가하지 않고
    /// `false`를 반환합니다.
    fn add(&mut self, data: &[u8], max_bytes: usize) -> Result<bool, PipelineError> {
        let projected = self.bytes + data.len() + 1;
        if projected > max_bytes {
            return Ok(false);
        }

        self.encoder.write_all(data).map_err(PipelineError::Compress)?;
        self.encoder.write_all(b"\n").map_err(PipelineError::Compress)?;
        self.bytes = projected;
        self.events += 1;
        Ok(true)
    }

    fn is_empty(&self) -> bool {
        self.events == 0
    }

    fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// 압축을 종결하고 (페이로드, 압축 전 바이트, 이벤트 수, 첫 이벤트
    /// 시각)을 반환합니다.
    fn finish(self) -> Result<(Vec<u8>, usize, usize, DateTime<Utc>), PipelineError> {
        let payload = self.encoder.finish().map_err(PipelineError::Compress)?;
        Ok((payload, self.bytes, self.events, self.first_event_at))
    }
}
