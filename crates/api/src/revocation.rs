//! 撤销服务
//!
//! 撤销不可逆：没有"取消撤销"，只有重签这一独立的、留审计痕迹的
//! 动作能重开有效期。空白理由直接拒绝，保证审计质量。

use medevents_common::MedError;
use medevents_common::entities::certificates;
use sea_orm::DatabaseConnection;
use serde_json::json;
use uuid::Uuid;

use crate::audit;
use crate::ledger;

pub async fn revoke(
    db: &DatabaseConnection,
    certificate_id: Uuid,
    actor_id: Uuid,
    reason: &str,
) -> Result<certificates::Model, MedError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(MedError::ReasonRequired);
    }

    let model = ledger::revoke(db, certificate_id, reason, actor_id).await?;
    tracing::info!(
        certificate_number = %model.certificate_number,
        actor_id = %actor_id,
        "certificate revoked"
    );
    audit::record(
        db,
        &actor_id.to_string(),
        "certificate.revoked",
        Some(certificate_id),
        json!({
            "reason": reason,
            "certificate_number": model.certificate_number.clone(),
        }),
    )
    .await;
    Ok(model)
}
