//! 스키마 레지스트리 — 로그 타입 -> {파서, 출력 테이블} 불변 매핑
//!
//! 레지스트리는 프로세스 시작 시 한 번 구성되어 이후 변경되지 않으며,
//! 분류기와 싱크 생성자에 참조로 주입됩니다. 전역 가변 상태를 두지
//! 않습니다.
//!
//! [`TableDescriptor`]는 로그 타입 하나의 출력 위치를 기술합니다:
//! 논리 데이터베이스/테이블 이름, 오브젝트 키 접두어, 그리고 다운스트림
//! 쿼리 엔진이 사용하는 시간 버킷 파티션 레이아웃입니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::parser::{AuditTrailParser, FlowParser, LogParser};

/// 기본 논리 데이터베이스 이름
pub const DEFAULT_DATABASE: &str = "logs";

/// 파티션 시간 버킷 단위
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBin {
    /// 시간 단위 파티션
    Hourly,
    /// 일 단위 파티션
    Daily,
    /// 월 단위 파티션
    Monthly,
}

/// 로그 타입 하나의 출력 테이블 기술자
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    /// 논리 데이터베이스 이름
    pub database: String,
    /// 물리 테이블 이름 (소문자, 구분자는 `_`)
    pub name: String,
    /// 오브젝트 키 접두어 (예: "logs/net_flow/")
    pub prefix: String,
    /// 파티션 시간 버킷
    pub time_bin: TimeBin,
}

impl TableDescriptor {
    /// 시간 단위 파티션 테이블을 생성합니다.
    pub fn hourly(database: impl Into<String>, log_type: &str) -> Self {
        Self::new(database, log_type, TimeBin::Hourly)
    }

    /// 지정한 시간 버킷의 테이블을 생성합니다.
    pub fn new(database: impl Into<String>, log_type: &str, time_bin: TimeBin) -> Self {
        let database = database.into();
        let name = table_name(log_type);
        let prefix = format!("{database}/{name}/");
        Self {
            database,
            name,
            prefix,
            time_bin,
        }
    }

    /// 시간 버킷에 해당하는 파티션 경로 접두어를 반환합니다.
    ///
    /// 예: `logs/net_flow/year=2020/month=01/day=03/hour=01/`
    pub fn partition_prefix(&self, at: DateTime<Utc>) -> String {
        let mut path = format!("{}year={}/month={:02}/", self.prefix, at.year(), at.month());
        match self.time_bin {
            TimeBin::Monthly => {}
            TimeBin::Daily => {
                path.push_str(&format!("day={:02}/", at.day()));
            }
            TimeBin::Hourly => {
                path.push_str(&format!("day={:02}/hour={:02}/", at.day(), at.hour()));
            }
        }
        path
    }

    /// 카탈로그 등록에 사용하는 파티션 값 목록을 반환합니다.
    pub fn partition_values(&self, at: DateTime<Utc>) -> Vec<String> {
        let mut values = vec![at.year().to_string(), format!("{:02}", at.month())];
        match self.time_bin {
            TimeBin::Monthly => {}
            TimeBin::Daily => values.push(format!("{:02}", at.day())),
            TimeBin::Hourly => {
                values.push(format!("{:02}", at.day()));
                values.push(format!("{:02}", at.hour()));
            }
        }
        values
    }
}

/// 로그 타입명을 물리 이름으로 변환합니다.
///
/// 소문자화하고 구조 구분자(`.`, `-`)를 `_`로 바꿉니다.
/// 예: `"Net.Flow"` -> `"net_flow"`
pub fn table_name(log_type: &str) -> String {
    log_type
        .to_lowercase()
        .replace(['.', '-'], "_")
}

/// 레지스트리 항목 하나
pub struct SchemaEntry {
    /// 이 로그 타입의 구조 파서
    pub parser: Arc<dyn LogParser>,
    /// 출력 테이블 기술자
    pub table: TableDescriptor,
    /// 스키마 설명 (문서/카탈로그용)
    pub description: &'static str,
}

/// 스키마 레지스트리
///
/// 구성 후 읽기 전용입니다. 순회 순서는 로그 타입명 기준으로
/// 결정적입니다.
pub struct SchemaRegistry {
    entries: BTreeMap<String, SchemaEntry>,
}

impl SchemaRegistry {
    /// 빈 레지스트리를 생성합니다 (테스트나 커스텀 조립용).
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// 기본 제공 스키마가 모두 등록된 레지스트리를 생성합니다.
    pub fn builtin() -> Self {
        Self::new()
            .register(
                Arc::new(FlowParser::new()),
                TableDescriptor::hourly(DEFAULT_DATABASE, "Net.Flow"),
                "Layer-3 network flow records, one space-delimited record per line",
            )
            .register(
                Arc::new(AuditTrailParser::new()),
                TableDescriptor::hourly(DEFAULT_DATABASE, "App.AuditTrail"),
                "Audit trail documents, a JSON object with a records array per line",
            )
    }

    /// 스키마를 등록합니다.
    ///
    /// 같은 로그 타입을 두 번 등록하는 것은 구성 오류이므로 즉시
    /// 중단합니다.
    pub fn register(
        mut self,
        parser: Arc<dyn LogParser>,
        table: TableDescriptor,
        description: &'static str,
    ) -> Self {
        let log_type = parser.log_type().to_owned();
        let previous = self.entries.insert(
            log_type.clone(),
            SchemaEntry {
                parser,
                table,
                description,
            },
        );
        assert!(
            previous.is_none(),
            "log type registered twice: {log_type}"
        );
        self
    }

    /// 로그 타입으로 항목을 조회합니다.
    pub fn lookup(&self, log_type: &str) -> Option<&SchemaEntry> {
        self.entries.get(log_type)
    }

    /// 모든 항목을 로그 타입명 순서로 순회합니다.
    pub fn entries(&self) -> impl Iterator<Item = &SchemaEntry> {
        self.entries.values()
    }

    /// 등록된 스키마 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 등록된 스키마가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
