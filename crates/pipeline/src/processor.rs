//! 파이프라인 오케스트레이션 — 스트림 fan-out, 싱크 fan-in, 종료 시퀀스
//!
//! [`process`]는 입력 스트림마다 태스크 하나를 띄워 각자 소유한
//! [`Classifier`]로 줄을 분류하고, 이벤트를 단일 공유 채널로 싱크에
//! 전달합니다. 분류기 상태는 태스크 간에 공유되지 않아 핫패스에 락이
//! 없습니다.
//!
//! # 종료 시퀀스
//! 교착과 리소스 누수를 피하기 위해 다음 순서를 정확히 지킵니다:
//! 1. 싱크 소비 태스크를 먼저 시작
//! 2. 모든 스트림 태스크를 동시에 시작
//! 3. 모든 스트림 태스크 종료 대기 (성공/실패 무관)
//! 4. 이벤트 채널 닫힘 (마지막 송신자 drop)
//! 5. 싱크가 드레인/플러시를 마칠 때까지 대기
//! 6. 에러 채널 닫힘
//! 7. 보고된 에러를 모두 수거하고 첫 에러를 전체 결과로 반환
//!
//! 스트림 하나가 실패해도 나머지 태스크는 끝까지 실행되고 전체 플러시
//! 시퀀스가 수행됩니다 — 부분 성공 시에도 성공한 스트림의 이벤트는
//! 전달됩니다.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use logsift_core::config::PipelineConfig;
use logsift_core::event::{DataStream, ParsedEvent, StreamHints};
use logsift_core::metrics::{PIPELINE_EVENTS_FORWARDED_TOTAL, PIPELINE_STREAM_FAILURES_TOTAL};
use logsift_core::oplog::{OpLogManager, Operation};

use crate::classify::Classifier;
use crate::destination::Destination;
use crate::error::PipelineError;
use crate::registry::SchemaRegistry;

const PIPELINE_OPLOG: OpLogManager = OpLogManager::new("logsift", "pipeline");

/// 기본 설정으로 스트림들을 처리합니다.
///
/// 전체 결과가 `Err`이면 일부 데이터가 전달되었더라도 작업 단위 전체를
/// 재시도해야 합니다. 멱등 파티션 등록과 at-least-once 전달이 재시도를
/// 안전하게 만듭니다.
pub async fn process<D: Destination>(
    registry: Arc<SchemaRegistry>,
    streams: Vec<DataStream>,
    destination: D,
) -> Result<(), PipelineError> {
    process_with_config(&PipelineConfig::default(), registry, streams, destination).await
}

/// 지정한 설정으로 스트림들을 처리합니다.
pub async fn process_with_config<D: Destination>(
    config: &PipelineConfig,
    registry: Arc<SchemaRegistry>,
    streams: Vec<DataStream>,
    destination: D,
) -> Result<(), PipelineError> {
    tracing::debug!(num_streams = streams.len(), "processing data streams");

    let (event_tx, event_rx) = mpsc::channel::<ParsedEvent>(config.event_buffer_size);
    let (error_tx, mut error_rx) = mpsc::unbounded_channel::<PipelineError>();

    // 1. 싱크 소비 태스크를 먼저 시작합니다
    let sink_task = tokio::spawn(destination.send_events(event_rx, error_tx.clone()));

    // 2. 스트림 태스크들을 동시에 시작합니다
    let mut stream_tasks = Vec::with_capacity(streams.len());
    for stream in streams {
        let DataStream { reader, hints, .. } = stream;
        let processor = StreamProcessor::new(hints, Classifier::new(&registry));
        let events = event_tx.clone();
        let errors = error_tx.clone();
        stream_tasks.push(tokio::spawn(async move {
            if let Err(err) = processor.run(reader, events).await {
                metrics::counter!(PIPELINE_STREAM_FAILURES_TOTAL).increment(1);
                if errors.send(err).is_err() {
                    tracing::error!("error channel closed before stream error could be reported");
                }
            }
        }));
    }
    drop(event_tx);

    // 3. 모든 스트림 태스크를 기다립니다. 실패한 태스크가 있어도 나머지는
    //    끝까지 실행됩니다.
    tracing::debug!("waiting for stream tasks to finish reading data");
    for task in stream_tasks {
        if let Err(join_err) = task.await {
            let _ = error_tx.send(PipelineError::Task(join_err.to_string()));
        }
    }

    // 4-5. 모든 송신자가 drop되어 이벤트 채널이 닫혔으므로, 싱크는 버퍼를
    //      드레인하고 남은 배치를 플러시한 뒤 종료합니다.
    if let Err(join_err) = sink_task.await {
        let _ = error_tx.send(PipelineError::Task(join_err.to_string()));
    }
    tracing::debug!("stream and sink tasks finished");

    // 6-7. 에러 채널을 닫고 모두 수거합니다. 첫 에러가 전체 결과입니다.
    drop(error_tx);
    let mut first_error = None;
    while let Some(err) = error_rx.recv().await {
        if first_error.is_none() {
            first_error = Some(err);
        } else {
            tracing::warn!(error = %err, "additional pipeline error");
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// 스트림 하나의 처리기
///
/// 자신만의 분류기를 소유하며, 스트림을 줄 단위로 읽어 분류하고
/// 이벤트를 공유 채널로 보냅니다.
struct StreamProcessor {
    hints: StreamHints,
    classifier: Classifier,
    operation: Operation,
}

impl StreamProcessor {
    fn new(hints: StreamHints, classifier: Classifier) -> Self {
        Self {
            hints,
            classifier,
            operation: PIPELINE_OPLOG.start("parse"),
        }
    }

    /// 스트림 끝까지 읽어 분류/전달하고, 스트림 요약을 남깁니다.
    ///
    /// 읽기 실패는 이 스트림의 결과로만 반환되고 다른 태스크에
    /// 영향을 주지 않습니다.
    async fn run(
        mut self,
        reader: logsift_core::event::StreamReader,
        events: mpsc::Sender<ParsedEvent>,
    ) -> Result<(), PipelineError> {
        let mut lines = BufReader::new(reader).lines();
        let mut result = Ok(());

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Err(err) = self.process_line(&line, &events).await {
                        result = Err(err);
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    result = Err(PipelineError::StreamRead(err));
                    break;
                }
            }
        }

        self.log_stats(result.as_ref().err());
        result
    }

    async fn process_line(
        &mut self,
        line: &str,
        events: &mpsc::Sender<ParsedEvent>,
    ) -> Result<(), PipelineError> {
        let classified = self.classifier.classify(line);

        let Some(log_type) = classified.log_type else {
            // 분류 실패는 에러가 아닙니다. 비어 있지 않은 줄이면 출처
            // 힌트와 함께 경고를 남기되, 로그 내용은 포함하지 않습니다.
            if !classified.line.is_empty() {
                match &self.hints.object {
                    Some(object) => tracing::warn!(
                        line_num = self.classifier.stats().line_count,
                        bucket = %object.bucket,
                        key = %object.key,
                        "failed to classify log line"
                    ),
                    None => tracing::warn!(
                        line_num = self.classifier.stats().line_count,
                        "failed to classify log line"
                    ),
                }
            }
            return Ok(());
        };

        let event_count = classified.events.len() as u64;
        for event in classified.events {
            if events
                .send(ParsedEvent::new(log_type.clone(), event))
                .await
                .is_err()
            {
                return Err(PipelineError::Channel(
                    "event channel closed while sink should still be draining".to_owned(),
                ));
            }
        }
        metrics::counter!(PIPELINE_EVENTS_FORWARDED_TOTAL).increment(event_count);
        Ok(())
    }

    /// 스트림 요약을 남깁니다: 작업 완료 기록과 집계/타입별 통계.
    fn log_stats(&mut self, err: Option<&PipelineError>) {
        self.operation.stop();
        self.operation.log(err);
        tracing::info!(stats = ?self.classifier.stats(), "stream classification stats");
        for parser_stats in self.classifier.parser_stats().values() {
            tracing::info!(stats = ?parser_stats, "per-type classification stats");
        }
    }
}
