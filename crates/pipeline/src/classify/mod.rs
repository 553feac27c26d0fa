//! 로그 라인 분류기 — 적응형 다중 후보 매칭
//!
//! [`Classifier`]는 한 줄을 받아 등록된 스키마 후보를 패널티 순으로
//! 시도하고, 첫 구조+검증 매칭의 이벤트를 반환합니다. 실패한 후보는
//! 패널티가 1 오르고, 성공한 후보는 패널티가 0으로 초기화되어 다음
//! 줄에서 가장 먼저 시도됩니다. 소수 타입이 지배하는 스트림에서는
//! 줄당 평균 시도 횟수가 1로 수렴합니다.
//!
//! 파서 내부의 패닉은 분류기 경계에서 복구되어 일반 불일치와 동일하게
//! 처리됩니다. 호출자에게 전파되지 않습니다.

pub mod queue;

pub use queue::{Candidate, ParserQueue};

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use serde::Serialize;

use logsift_core::metrics::{
    CLASSIFIER_FAILURES_TOTAL, CLASSIFIER_LINES_TOTAL, CLASSIFIER_PARSER_PANICS_TOTAL,
};

use crate::parser::LogParser;
use crate::registry::SchemaRegistry;

/// 분류 호출 한 번의 결과
///
/// 반환 후 불변이며 소유권이 호출자에게 넘어갑니다.
#[derive(Debug, Default)]
pub struct ClassifierResult {
    /// 파싱된 이벤트 목록. 분류 실패 시 비어 있습니다.
    pub events: Vec<serde_json::Value>,
    /// 판별된 로그 타입. 어떤 스키마도 매칭하지 못하면 `None`.
    pub log_type: Option<String>,
    /// 분류에 사용된 (trim된) 줄
    pub line: String,
}

/// 분류기 집계 통계
///
/// 카운터는 단조 증가하며, 분류기 인스턴스를 폐기해야 초기화됩니다.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassifierStats {
    /// 누적 분류 소요 시간 (마이크로초)
    pub classify_time_micros: u64,
    /// 입력 바이트 수 (trim된 줄 기준)
    pub bytes_processed: u64,
    /// 입력 줄 수
    pub line_count: u64,
    /// 출력 이벤트 수
    pub event_count: u64,
    /// 분류 성공 줄 수
    pub success_count: u64,
    /// 분류 실패 줄 수
    pub failure_count: u64,
}

/// 로그 타입별 통계
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParserStats {
    /// 로그 타입명
    pub log_type: String,
    /// 누적 파싱 소요 시간 (마이크로초)
    pub parser_time_micros: u64,
    /// 입력 바이트 수
    pub bytes_processed: u64,
    /// 입력 줄 수
    pub line_count: u64,
    /// 출력 이벤트 수
    pub event_count: u64,
}

/// 로그 라인 분류기
///
/// 인스턴스 하나는 스트림 태스크 하나가 단독 소유합니다. 내부 우선순위
/// 상태와 통계는 공유되지 않으므로 동기화가 필요 없습니다.
pub struct Classifier {
    queue: ParserQueue,
    stats: ClassifierStats,
    parser_stats: BTreeMap<String, ParserStats>,
}

impl Classifier {
    /// 레지스트리의 모든 스키마를 후보로 하는 분류기를 생성합니다.
    pub fn new(registry: &SchemaRegistry) -> Self {
        Self {
            queue: ParserQueue::from_registry(registry),
            stats: ClassifierStats::default(),
            parser_stats: BTreeMap::new(),
        }
    }

    /// 집계 통계를 반환합니다.
    pub fn stats(&self) -> &ClassifierStats {
        &self.stats
    }

    /// 로그 타입별 통계를 반환합니다.
    pub fn parser_stats(&self) -> &BTreeMap<String, ParserStats> {
        &self.parser_stats
    }

    /// 한 줄을 분류합니다.
    ///
    /// - 원본이 빈 문자열이면 아무것도 세지 않고 빈 결과를 반환합니다
    ///   (빈 파일에서 흔함).
    /// - trim 후 빈 줄이면 줄 수에만 반영됩니다 (파일 끝의 `\n` 등).
    pub fn classify(&mut self, line: &str) -> ClassifierResult {
        let started = Instant::now();
        let mut result = ClassifierResult::default();

        if line.is_empty() {
            return result;
        }

        let line = line.trim();
        result.line = line.to_owned();

        if !line.is_empty() {
            self.try_candidates(line, &mut result);
        }

        self.stats.classify_time_micros += started.elapsed().as_micros() as u64;
        self.stats.bytes_processed += line.len() as u64;
        self.stats.line_count += 1;
        self.stats.event_count += result.events.len() as u64;
        metrics::counter!(CLASSIFIER_LINES_TOTAL).increment(1);
        if !line.is_empty() {
            if result.log_type.is_some() {
                self.stats.success_count += 1;
            } else {
                self.stats.failure_count += 1;
                metrics::counter!(CLASSIFIER_FAILURES_TOTAL).increment(1);
            }
        }

        result
    }

    fn try_candidates(&mut self, line: &str, result: &mut ClassifierResult) {
        // 시도한 후보는 (성공 포함) 갱신된 패널티로 전부 다시 넣어,
        // 다음 호출이 새 순서의 이득을 보게 합니다
        let mut tried: Vec<Candidate> = Vec::new();

        while let Some(mut candidate) = self.queue.pop() {
            let log_type = candidate.parser.log_type();
            let parse_started = Instant::now();
            let events = safe_parse(candidate.parser.as_ref(), line);
            let parse_micros = parse_started.elapsed().as_micros() as u64;

            let Some(events) = events else {
                candidate.penalty += 1;
                tried.push(candidate);
                continue;
            };

            candidate.penalty = 0;
            result.log_type = Some(log_type.to_owned());
            result.events = events;

            let parser_stat = self
                .parser_stats
                .entry(log_type.to_owned())
                .or_insert_with(|| ParserStats {
                    log_type: log_type.to_owned(),
                    ..ParserStats::default()
                });
            parser_stat.parser_time_micros += parse_micros;
            parser_stat.bytes_processed += line.len() as u64;
            parser_stat.line_count += 1;
            parser_stat.event_count += result.events.len() as u64;

            tried.push(candidate);
            break;
        }

        for candidate in tried {
            self.queue.push(candidate);
        }
    }
}

/// 파서 호출의 장애 경계
///
/// 파서 내부의 패닉을 복구하여 일반 불일치(`None`)로 변환합니다.
/// 패닉이 분류기 밖으로 전파되거나 우선순위 큐를 오염시키지 않습니다.
fn safe_parse(parser: &dyn LogParser, line: &str) -> Option<Vec<serde_json::Value>> {
    match catch_unwind(AssertUnwindSafe(|| parser.parse(line))) {
        Ok(Ok(events)) => Some(events),
        Ok(Err(err)) => {
            tracing::debug!(expected_log_type = parser.log_type(), error = %err, "failed to parse log line");
            None
        }
        Err(panic) => {
            metrics::counter!(CLASSIFIER_PARSER_PANICS_TOTAL).increment(1);
            tracing::error!(
                parser = parser.log_type(),
                panic = panic_message(&panic),
                "parser panic recovered"
            );
            None
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
