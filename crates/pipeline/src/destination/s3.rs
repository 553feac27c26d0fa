//! S3 오브젝트 스토어 클라이언트
//!
//! [`ObjectStore`] trait의 프로덕션 구현입니다. 자격 증명과 리전은
//! 표준 AWS 환경(환경변수, 프로파일, 인스턴스 메타데이터)에서
//! 로드합니다. 파티션 카탈로그/알림/레코드 스트림 클라이언트는
//! 임베더가 주입합니다.

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::destination::client::ObjectStore;
use crate::error::StoreError;

/// S3 기반 오브젝트 스토어
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// 기존 클라이언트로 스토어를 생성합니다.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// 표준 AWS 환경 설정으로 스토어를 생성합니다.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&sdk_config), bucket)
    }

    /// 대상 버킷명을 반환합니다.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let content_length = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| StoreError::Put {
                key: key.to_owned(),
                reason: err.to_string(),
            })?;

        tracing::debug!(
            bucket = %self.bucket,
            key,
            content_length,
            "stored batch object"
        );
        Ok(())
    }
}
