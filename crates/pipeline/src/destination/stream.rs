//! 스트리밍 전송 싱크 — 고정 크기 레코드 배치의 동기 전송
//!
//! 로그 타입별로 레코드를 모아 배치 한도(500건 또는 4MB 중 먼저 도달)에
//! 이르면 전송 스트림으로 동기 전송합니다. 채널이 닫히면 남은 부분
//! 배치를 플러시합니다. 전송 응답에서 일부 레코드가 거부되면 배치
//! 단위 실패로 처리합니다.

use std::collections::BTreeMap;

use bytes::Bytes;
use tokio::sync::mpsc;

use logsift_core::event::ParsedEvent;
use logsift_core::metrics::{LABEL_LOG_TYPE, SINK_RECORDS_DELIVERED_TOTAL};

use crate::destination::client::RecordStream;
use crate::destination::{Destination, physical_name};
use crate::error::PipelineError;

/// 배치당 최대 레코드 수
pub const MAX_BATCH_RECORDS: usize = 500;

/// 배치당 최대 요청 크기 (바이트)
pub const MAX_BATCH_BYTES: usize = 4 * 1000 * 1000;

/// 스트리밍 전송 싱크
pub struct StreamDestination<D> {
    delivery: D,
    name_prefix: String,
}

impl<D: RecordStream> StreamDestination<D> {
    /// 새 싱크를 생성합니다.
    ///
    /// `name_prefix`는 전송 스트림 이름 접두어입니다
    /// (예: "logsift_data" -> "logsift_data_net_flow").
    pub fn new(delivery: D, name_prefix: impl Into<String>) -> Self {
        Self {
            delivery,
            name_prefix: name_prefix.into(),
        }
    }

    async fn run(
        self,
        mut events: mpsc::Receiver<ParsedEvent>,
        errors: mpsc::UnboundedSender<PipelineError>,
    ) {
        let mut batches: BTreeMap<String, RecordBatch> = BTreeMap::new();
        let mut processed: u64 = 0;

        tracing::debug!("starting to read events from channel");
        while let Some(event) = events.recv().await {
            processed += 1;

            let record = match serde_json::to_vec(&event.event) {
                Ok(data) => Bytes::from(data),
                Err(err) => {
                    tracing::warn!(log_type = %event.log_type, error = %err, "failed to serialize event");
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

            let batch = batches.entry(event.log_type.clone()).or_default();
            if !batch.fits(&record) {
                let full = std::mem::take(batch);
                match self.send_records(&event.log_type, full).await {
                    Ok(()) => batch.push(record),
                    Err(err) => {
                        // 전송 실패를 보고하고 현재 레코드는 버립니다.
                        // 배치 상태는 비워졌으므로 다음 이벤트부터 새로 쌓입니다.
                        tracing::warn!(log_type = %event.log_type, error = %err, "failed to send record batch");
                        report(&errors, err);
                    }
                }
            } else {
                batch.push(record);
            }
        }

        tracing::debug!("event channel closed, sending last batches");
        for (log_type, batch) in batches {
            if batch.is_empty() {
                continue;
            }
            if let Err(err) = self.send_records(&log_type, batch).await {
                tracing::warn!(log_type = %log_type, error = %err, "failed to send record batch");
                report(&errors, err);
            }
        }
        tracing::debug!(events = processed, "finished sending events");
    }

    async fn send_records(&self, log_type: &str, batch: RecordBatch) -> Result<(), PipelineError> {
        let stream_name = physical_name(&self.name_prefix, log_type);
        let total = batch.records.len();
        tracing::debug!(
            records = total,
            log_type,
            stream = %stream_name,
            "sending record batch"
        );

        let outcome = self
            .delivery
            .put_record_batch(&stream_name, &batch.records)
            .await
            .map_err(PipelineError::Delivery)?;

        if outcome.failed_records > 0 {
            return Err(PipelineError::DeliveryRejected {
                stream: stream_name,
                failed: outcome.failed_records,
                total,
            });
        }

        metrics::counter!(SINK_RECORDS_DELIVERED_TOTAL, LABEL_LOG_TYPE => log_type.to_owned())
            .increment(total as u64);
        Ok(())
    }
}

fn report(errors: &mpsc::UnboundedSender<PipelineError>, err: PipelineError) {
    if errors.send(err).is_err() {
        tracing::error!("error channel closed before sink error could be reported");
    }
}

impl<D: RecordStream + Send + 'static> Destination for StreamDestination<D> {
    fn send_events(
        self,
        events: mpsc::Receiver<ParsedEvent>,
        errors: mpsc::UnboundedSender<PipelineError>,
    ) -> impl Future<Output = ()> + Send + 'static {
        self.run(events, errors)
    }
}

/// 전송 대기 중인 레코드 배치
#[derive(Default)]
struct RecordBatch {
    records: Vec<Bytes>,
    request_bytes: usize,
}

impl RecordBatch {
    /// 레코드를 추가해도 배치 한도를 넘지 않는지 확인합니다.
    fn fits(&self, record: &Bytes) -> bool {
        self.records.len() + 1 <= MAX_BATCH_RECORDS
            && self.request_bytes + record.len() <= MAX_BATCH_BYTES
    }

    fn push(&mut self, record: Bytes) {
        self.request_bytes += record.len();
        self.records.push(record);
    }

    fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::destination::client::DeliveryOutcome;
    use crate::error::DeliveryError;

    /// 전송된 배치를 쌓아두는 인메모리 전송 스트림
    #[derive(Default)]
    struct MemoryDelivery {
        batches: Arc<Mutex<Vec<(String, usize)>>>,
        fail: bool,
        reject_one: bool,
    }

    impl RecordStream for MemoryDelivery {
        async fn put_record_batch(
            &self,
            stream_name: &str,
            records: &[Bytes],
        ) -> Result<DeliveryOutcome, DeliveryError> {
            if self.fail {
                return Err(DeliveryError {
                    stream: stream_name.to_owned(),
                    reason: "simulated delivery failure".to_owned(),
                });
            }
            self.batches
                .lock()
                .unwrap()
                .push((stream_name.to_owned(), records.len()));
            if self.reject_one {
                return Ok(DeliveryOutcome { failed_records: 1 });
            }
            Ok(DeliveryOutcome::default())
        }
    }

    fn event(log_type: &str) -> ParsedEvent {
        ParsedEvent::new(log_type, serde_json::json!({"k": "v"}))
    }

    async fn run_sink(
        destination: StreamDestination<MemoryDelivery>,
        events: Vec<ParsedEvent>,
    ) -> Vec<PipelineError> {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (error_tx, mut error_rx) = mpsc::unbounded_channel();
        let sink = tokio::spawn(destination.send_events(event_rx, error_tx));
        for event in events {
            event_tx.send(event).await.unwrap();
        }
        drop(event_tx);
        sink.await.unwrap();
        let mut errors = Vec::new();
        while let Ok(err) = error_rx.try_recv() {
            errors.push(err);
        }
        errors
    }

    #[tokio::test]
    async fn partial_batch_flushed_on_close() {
        let delivery = MemoryDelivery::default();
        let batches = Arc::clone(&delivery.batches);
        let destination = StreamDestination::new(delivery, "logsift_data");

        let errors = run_sink(destination, vec![event("Net.Flow"), event("Net.Flow")]).await;
        assert!(errors.is_empty());

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], ("logsift_data_net_flow".to_owned(), 2));
    }

    #[tokio::test]
    async fn record_count_limit_triggers_send() {
        let delivery = MemoryDelivery::default();
        let batches = Arc::clone(&delivery.batches);
        let destination = StreamDestination::new(delivery, "logsift_data");

        let events: Vec<ParsedEvent> = (0..MAX_BATCH_RECORDS + 1).map(|_| event("Net.Flow")).collect();
        let errors = run_sink(destination, events).await;
        assert!(errors.is_empty());

        let batches = batches.lock().unwrap();
        // 501번째 레코드가 500건 배치 전송을 트리거하고, 남은 1건은 종료 시 전송됩니다
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].1, MAX_BATCH_RECORDS);
        assert_eq!(batches[1].1, 1);
    }

    #[tokio::test]
    async fn byte_limit_triggers_send() {
        let delivery = MemoryDelivery::default();
        let batches = Arc::clone(&delivery.batches);
        let destination = StreamDestination::new(delivery, "logsift_data");

        // 레코드 하나가 약 1MB가 되도록 큰 페이로드를 만듭니다
        let big = "x".repeat(1_000_000);
        let events: Vec<ParsedEvent> = (0..5)
            .map(|_| ParsedEvent::new("Net.Flow", serde_json::json!({"blob": big.clone()})))
            .collect();

        let errors = run_sink(destination, events).await;
        assert!(errors.is_empty());

        let batches = batches.lock().unwrap();
        // 4MB 한도로 인해 5개 레코드가 두 배치 이상으로 나뉩니다
        assert!(batches.len() >= 2);
        let total: usize = batches.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn per_type_batches_are_independent() {
        let delivery = MemoryDelivery::default();
        let batches = Arc::clone(&delivery.batches);
        let destination = StreamDestination::new(delivery, "logsift_data");

        let errors = run_sink(
            destination,
            vec![event("Net.Flow"), event("App.AuditTrail"), event("Net.Flow")],
        )
        .await;
        assert!(errors.is_empty());

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        let mut streams: Vec<&str> = batches.iter().map(|(s, _)| s.as_str()).collect();
        streams.sort_unstable();
        assert_eq!(
            streams,
            vec!["logsift_data_app_audittrail", "logsift_data_net_flow"]
        );
    }

    #[tokio::test]
    async fn partial_rejection_is_batch_failure() {
        let delivery = MemoryDelivery {
            reject_one: true,
            ..MemoryDelivery::default()
        };
        let destination = StreamDestination::new(delivery, "logsift_data");

        let errors = run_sink(destination, vec![event("Net.Flow")]).await;
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            PipelineError::DeliveryRejected { failed: 1, total: 1, .. }
        ));
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_but_sink_continues() {
        let delivery = MemoryDelivery {
            fail: true,
            ..MemoryDelivery::default()
        };
        let destination = StreamDestination::new(delivery, "logsift_data");

        let errors = run_sink(destination, vec![event("Net.Flow")]).await;
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], PipelineError::Delivery(_)));
    }
}
