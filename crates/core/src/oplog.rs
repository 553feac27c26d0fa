//! 운영 로깅 — 시작/종료 시각과 성공/실패 상태를 가진 작업 기록
//!
//! 각 작업(operation)을 namespace:component:operation 3단계 계층으로
//! 기록하여, 로그 기반 대시보드에서 표준 차원으로 집계/알람을 걸 수
//! 있게 합니다. 기록은 `tracing` 구조화 필드로 내보냅니다.
//!
//! # 사용 예시
//! ```
//! use logsift_core::oplog::OpLogManager;
//!
//! let manager = OpLogManager::new("logsift", "pipeline");
//! let mut operation = manager.start("flush");
//! // ... 작업 수행 ...
//! operation.stop();
//! operation.log_success();
//! ```

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// 작업 상태: 성공
pub const STATUS_SUCCESS: &str = "success";
/// 작업 상태: 실패
pub const STATUS_FAILURE: &str = "failure";

/// 작업 기록 매니저
///
/// namespace/component 계층을 고정하고, 개별 작업은 [`start`](Self::start)로
/// 생성합니다. 생성 비용이 없으므로 필요한 곳에서 값으로 만들어 씁니다.
#[derive(Debug, Clone, Copy)]
pub struct OpLogManager {
    namespace: &'static str,
    component: &'static str,
}

impl OpLogManager {
    /// 새 매니저를 생성합니다.
    pub const fn new(namespace: &'static str, component: &'static str) -> Self {
        Self {
            namespace,
            component,
        }
    }

    /// 작업 기록을 시작합니다.
    pub fn start(&self, operation: impl Into<String>) -> Operation {
        Operation {
            namespace: self.namespace,
            component: self.component,
            name: operation.into(),
            dims: Vec::new(),
            started_wall: Utc::now(),
            started_at: Instant::now(),
            stopped_after: None,
        }
    }
}

/// 진행 중이거나 완료된 작업 하나
///
/// [`stop`](Self::stop)을 호출하지 않고 기록하면 현재까지의 경과 시간이
/// 사용됩니다 (진행 중 상태 기록).
#[derive(Debug)]
pub struct Operation {
    namespace: &'static str,
    component: &'static str,
    name: String,
    dims: Vec<(&'static str, String)>,
    started_wall: DateTime<Utc>,
    started_at: Instant,
    stopped_after: Option<Duration>,
}

impl Operation {
    /// 집계 차원을 추가합니다 (예: 대상 서비스명).
    pub fn dim(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.dims.push((key, value.into()));
        self
    }

    /// 작업 종료 시각을 기록합니다.
    pub fn stop(&mut self) {
        self.stopped_after = Some(self.started_at.elapsed());
    }

    /// 현재까지의 (또는 종료까지의) 경과 시간을 반환합니다.
    pub fn elapsed(&self) -> Duration {
        self.stopped_after.unwrap_or_else(|| self.started_at.elapsed())
    }

    fn message(&self) -> String {
        format!("{}:{}:{}", self.namespace, self.component, self.name)
    }

    /// 결과에 따라 성공 또는 실패로 기록합니다.
    pub fn log<E: std::fmt::Display>(&self, err: Option<&E>) {
        match err {
            Some(err) => self.log_error(err),
            None => self.log_success(),
        }
    }

    /// 성공으로 기록합니다.
    pub fn log_success(&self) {
        tracing::info!(
            namespace = self.namespace,
            component = self.component,
            operation = %self.name,
            status = STATUS_SUCCESS,
            started_at = %self.started_wall,
            op_time_us = self.elapsed().as_micros() as u64,
            dims = ?self.dims,
            "{}",
            self.message(),
        );
    }

    /// 실패로 기록하되 경고 수준으로 남깁니다 (비치명 실패).
    pub fn log_warn<E: std::fmt::Display>(&self, err: &E) {
        tracing::warn!(
            namespace = self.namespace,
            component = self.component,
            operation = %self.name,
            status = STATUS_FAILURE,
            started_at = %self.started_wall,
            op_time_us = self.elapsed().as_micros() as u64,
            dims = ?self.dims,
            error = %err,
            "{}",
            self.message(),
        );
    }

    /// 실패로 기록합니다.
    pub fn log_error<E: std::fmt::Display>(&self, err: &E) {
        tracing::error!(
            namespace = self.namespace,
            component = self.component,
            operation = %self.name,
            status = STATUS_FAILURE,
            started_at = %self.started_wall,
            op_time_us = self.elapsed().as_micros() as u64,
            dims = ?self.dims,
            error = %err,
            "{}",
            self.message(),
        );
    }
}
