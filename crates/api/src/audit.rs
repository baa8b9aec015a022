//! 审计落库（尽力而为）
//!
//! 审计写入失败只记日志、只加计数器，绝不阻断业务调用——
//! 公开验证路径尤其不能因审计表不可用而返回错误。

use medevents_common::entities::audit_logs;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::metrics;

/// 写入一条审计记录
///
/// `actor` 是自由文本：认证用户为其 UUID，公开验证路径为 `"anonymous"`。
pub async fn record(
    db: &DatabaseConnection,
    actor: &str,
    action: &str,
    resource_id: Option<Uuid>,
    details: JsonValue,
) {
    let active = audit_logs::ActiveModel {
        id: Set(Uuid::new_v4()),
        actor: Set(actor.to_string()),
        action: Set(action.to_string()),
        resource_id: Set(resource_id),
        details: Set(details),
        created_at: Set(chrono::Utc::now().into()),
    };

    if let Err(err) = active.insert(db).await {
        tracing::warn!(
            action = action,
            actor = actor,
            error = %err,
            "audit write failed"
        );
        metrics::inc_audit_write_failure();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_swallows_database_failure() {
        // 断开的连接句柄：写入必然失败，但调用必须正常返回
        let db = DatabaseConnection::default();
        record(
            &db,
            "anonymous",
            "certificate.verified",
            None,
            json!({"result": "valid"}),
        )
        .await;
    }
}
