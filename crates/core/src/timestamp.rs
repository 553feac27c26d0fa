//! 타임스탬프 코덱 — 입력 형식별 파싱과 표준 UTC 직렬화
//!
//! 모든 스키마는 이 모듈의 타입으로 타임스탬프를 읽고 씁니다.
//! 입력 형식은 두 가지(RFC 3339 문자열, Unix epoch 초)지만,
//! 출력(JSON 직렬화)은 항상 동일한 표준 레이아웃을 사용하여
//! 다운스트림 쿼리 엔진이 단일 형식만 다루도록 합니다.
//!
//! # 표준 출력 레이아웃
//! ```text
//! YYYY-MM-DD HH:MM:SS.fffffffff   (항상 UTC)
//! ```

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 직렬화에 사용하는 표준 레이아웃 (나노초 9자리 고정)
const CANONICAL_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// 표준 레이아웃 재파싱용 (소수점 이하 자릿수 가변)
const CANONICAL_PARSE_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// RFC 3339 문자열로 기록된 타임스탬프
///
/// 역직렬화는 RFC 3339를 기대하며, 자체 표준 레이아웃도 허용하여
/// 이미 기록된 배치를 다시 읽을 수 있습니다. 직렬화는 항상 표준
/// 레이아웃의 UTC로 출력됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rfc3339(pub DateTime<Utc>);

impl Rfc3339 {
    /// 현재 시각(UTC)으로 생성합니다.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// RFC 3339 문자열을 파싱합니다.
    pub fn parse(value: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(value).map(|t| Self(t.with_timezone(&Utc)))
    }

    /// 내부 UTC 시각을 반환합니다.
    pub fn as_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Rfc3339 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_LAYOUT))
    }
}

impl Serialize for Rfc3339 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.format(CANONICAL_LAYOUT))
    }
}

impl<'de> Deserialize<'de> for Rfc3339 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(parsed) = Self::parse(&raw) {
            return Ok(parsed);
        }
        // 자체 출력 레이아웃 재파싱 (기록된 배치를 다시 읽는 경우)
        NaiveDateTime::parse_from_str(&raw, CANONICAL_PARSE_LAYOUT)
            .map(|naive| Self(naive.and_utc()))
            .map_err(|_| de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

/// Unix epoch 초로 기록된 타임스탬프
///
/// 플로우 레코드처럼 정수 초(또는 소수 초)를 사용하는 스키마용입니다.
/// 직렬화는 [`Rfc3339`]와 동일한 표준 레이아웃을 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnixEpoch(pub DateTime<Utc>);

impl UnixEpoch {
    /// epoch 초/나노초에서 생성합니다.
    ///
    /// chrono가 표현할 수 없는 범위이면 `None`을 반환합니다.
    pub fn from_secs(secs: i64, nanos: u32) -> Option<Self> {
        DateTime::from_timestamp(secs, nanos).map(Self)
    }

    /// 내부 UTC 시각을 반환합니다.
    pub fn as_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for UnixEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_LAYOUT))
    }
}

impl Serialize for UnixEpoch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.format(CANONICAL_LAYOUT))
    }
}

struct UnixEpochVisitor;

impl Visitor<'_> for UnixEpochVisitor {
    type Value = UnixEpoch;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unix epoch seconds as integer or float")
    }

    fn visit_i64<E: de::Error>(self, secs: i64) -> Result<Self::Value, E> {
        UnixEpoch::from_secs(secs, 0)
            .ok_or_else(|| de::Error::custom(format!("epoch seconds out of range: {secs}")))
    }

    fn visit_u64<E: de::Error>(self, secs: u64) -> Result<Self::Value, E> {
        let secs = i64::try_from(secs)
            .map_err(|_| de::Error::custom(format!("epoch seconds out of range: {secs}")))?;
        self.visit_i64(secs)
    }

    fn visit_f64<E: de::Error>(self, secs: f64) -> Result<Self::Value, E> {
        if !secs.is_finite() {
            return Err(de::Error::custom("epoch seconds must be finite"));
        }
        let whole = secs.trunc() as i64;
        let nanos = (secs.fract().abs() * 1_000_000_000.0) as u32;
        UnixEpoch::from_secs(whole, nanos)
            .ok_or_else(|| de::Error::custom(format!("epoch seconds out of range: {secs}")))
    }
}

impl<'de> Deserialize<'de> for UnixEpoch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UnixEpochVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc3339_parses_and_normalizes_to_utc() {
        let ts = Rfc3339::parse("2020-01-03T02:01:01+01:00").unwrap();
        assert_eq!(ts.as_utc(), Utc.with_ymd_and_hms(2020, 1, 3, 1, 1, 1).unwrap());
    }

    #[test]
    fn rfc3339_serializes_canonical_layout() {
        let ts = Rfc3339(Utc.with_ymd_and_hms(2020, 1, 3, 1, 1, 1).unwrap());
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2020-01-03 01:01:01.000000000\"");
    }

    #[test]
    fn rfc3339_deserializes_own_output() {
        let ts = Rfc3339(Utc.with_ymd_and_hms(2021, 6, 1, 12, 30, 0).unwrap());
        let json = serde_json::to_string(&ts).unwrap();
        let back: Rfc3339 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn rfc3339_rejects_garbage() {
        let result: Result<Rfc3339, _> = serde_json::from_str("\"not a time\"");
        assert!(result.is_err());
    }

    #[test]
    fn unix_epoch_from_secs() {
        let ts = UnixEpoch::from_secs(1_577_840_461, 0).unwrap();
        assert_eq!(ts.as_utc(), Utc.with_ymd_and_hms(2020, 1, 1, 1, 1, 1).unwrap());
    }

    #[test]
    fn unix_epoch_deserializes_integer_and_float() {
        let from_int: UnixEpoch = serde_json::from_str("1577840461").unwrap();
        let from_float: UnixEpoch = serde_json::from_str("1577840461.5").unwrap();
        assert_eq!(from_int.as_utc().timestamp(), 1_577_840_461);
        assert_eq!(from_float.as_utc().timestamp_subsec_millis(), 500);
    }

    #[test]
    fn unix_epoch_serializes_canonical_layout() {
        let ts = UnixEpoch::from_secs(1_577_840_461, 0).unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2020-01-01 01:01:01.000000000\"");
    }

    #[test]
    fn unix_epoch_rejects_string() {
        let result: Result<UnixEpoch, _> = serde_json::from_str("\"1577840461\"");
        assert!(result.is_err());
    }
}
