//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logsift_`
//! - 컴포넌트: `classifier_`, `pipeline_`, `sink_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 로그 타입 레이블 키
pub const LABEL_LOG_TYPE: &str = "log_type";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Classifier 메트릭 ─────────────────────────────────────────────

/// Classifier: 처리한 전체 로그 라인 수 (counter)
pub const CLASSIFIER_LINES_TOTAL: &str = "logsift_classifier_lines_total";

/// Classifier: 분류 실패 라인 수 (counter)
pub const CLASSIFIER_FAILURES_TOTAL: &str = "logsift_classifier_failures_total";

/// Classifier: 파서 패닉 복구 수 (counter)
pub const CLASSIFIER_PARSER_PANICS_TOTAL: &str = "logsift_classifier_parser_panics_total";

// ─── Pipeline 메트릭 ───────────────────────────────────────────────

/// Pipeline: 싱크로 전달한 이벤트 수 (counter)
pub const PIPELINE_EVENTS_FORWARDED_TOTAL: &str = "logsift_pipeline_events_forwarded_total";

/// Pipeline: 실패로 종료한 스트림 태스크 수 (counter)
pub const PIPELINE_STREAM_FAILURES_TOTAL: &str = "logsift_pipeline_stream_failures_total";

// ─── Sink 메트릭 ───────────────────────────────────────────────────

/// Sink: 플러시한 배치 수 (counter, label: log_type)
pub const SINK_BATCHES_FLUSHED_TOTAL: &str = "logsift_sink_batches_flushed_total";

/// Sink: 배치 플러시 소요 시간 (histogram, 초)
pub const SINK_FLUSH_DURATION_SECONDS: &str = "logsift_sink_flush_duration_seconds";

/// Sink: 등록한 파티션 수 (counter)
pub const SINK_PARTITIONS_REGISTERED_TOTAL: &str = "logsift_sink_partitions_registered_total";

/// Sink: 전송한 레코드 수 (counter, label: log_type)
pub const SINK_RECORDS_DELIVERED_TOTAL: &str = "logsift_sink_records_delivered_total";

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다. 일반적으로
/// 임베더의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        CLASSIFIER_LINES_TOTAL,
        "Total number of log lines seen by classifiers"
    );
    describe_counter!(
        CLASSIFIER_FAILURES_TOTAL,
        "Total number of log lines no registered schema matched"
    );
    describe_counter!(
        CLASSIFIER_PARSER_PANICS_TOTAL,
        "Total number of parser panics recovered by the classification fault boundary"
    );
    describe_counter!(
        PIPELINE_EVENTS_FORWARDED_TOTAL,
        "Total number of parsed events forwarded to the sink channel"
    );
    describe_counter!(
        PIPELINE_STREAM_FAILURES_TOTAL,
        "Total number of stream tasks that ended with a read failure"
    );
    describe_counter!(
        SINK_BATCHES_FLUSHED_TOTAL,
        "Total number of event batches flushed to the sink"
    );
    describe_histogram!(
        SINK_FLUSH_DURATION_SECONDS,
        "Time to flush a single event batch in seconds"
    );
    describe_counter!(
        SINK_PARTITIONS_REGISTERED_TOTAL,
        "Total number of logical partitions registered"
    );
    describe_counter!(
        SINK_RECORDS_DELIVERED_TOTAL,
        "Total number of records delivered through the streaming sink"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        CLASSIFIER_LINES_TOTAL,
        CLASSIFIER_FAILURES_TOTAL,
        CLASSIFIER_PARSER_PANICS_TOTAL,
        PIPELINE_EVENTS_FORWARDED_TOTAL,
        PIPELINE_STREAM_FAILURES_TOTAL,
        SINK_BATCHES_FLUSHED_TOTAL,
        SINK_FLUSH_DURATION_SECONDS,
        SINK_PARTITIONS_REGISTERED_TOTAL,
        SINK_RECORDS_DELIVERED_TOTAL,
    ];

    #[test]
    fn all_metrics_start_with_logsift_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("logsift_"),
                "Metric '{}' does not start with 'logsift_' prefix",
                name
            );
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // describe_all() should not panic even without a recorder installed
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_LOG_TYPE, LABEL_RESULT] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
