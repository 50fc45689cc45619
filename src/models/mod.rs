pub mod invoice;
pub mod job;

pub use invoice::{Invoice, InvoiceUpdate, ListResponse, RecordId, ServerAck, Summary};
pub use job::{JobHandle, JobId, JobStats, JobStatus, StatusReport, SubmitResponse};

use serde::{Deserialize, Deserializer};

/// 服务端主键可能是整数也可能是字符串，客户端统一视为不透明字符串
pub(crate) fn deserialize_opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Int(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}
