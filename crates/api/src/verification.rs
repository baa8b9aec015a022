//! 公开验证服务
//!
//! 证书子系统唯一向匿名调用方开放的操作。只读：验证路径上永远
//! 不发生撤销或重签。"未找到"与"格式非法"折叠为同一结果，
//! 不向枚举攻击泄露失败模式；撤销理由按策略原文披露。

use medevents_common::MedError;
use medevents_common::certno;
use medevents_common::entities::{events, registrations, users};
use medevents_common::models::VerificationResult;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::json;

use crate::audit;
use crate::ledger;

pub async fn verify(
    db: &DatabaseConnection,
    prefix: &str,
    number: &str,
) -> Result<VerificationResult, MedError> {
    // 纯字符串检查先行，畸形输入不触达账本
    if !certno::is_well_formed(prefix, number) {
        tracing::debug!("verification rejected by format check");
        return Ok(VerificationResult::not_found());
    }

    let Some(certificate) = ledger::find_by_number(db, number).await? else {
        return Ok(VerificationResult::not_found());
    };

    if certificate.revoked {
        audit::record(
            db,
            "anonymous",
            "certificate.verified",
            Some(certificate.id),
            json!({
                "result": "revoked",
                "certificate_number": certificate.certificate_number.clone(),
            }),
        )
        .await;
        return Ok(VerificationResult::revoked(
            certificate.revoked_at,
            certificate.revoked_reason,
        ));
    }

    let registration = registrations::Entity::find_by_id(certificate.registration_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            MedError::Internal(anyhow::anyhow!(
                "certificate {} references missing registration {}",
                certificate.id,
                certificate.registration_id
            ))
        })?;
    let event = events::Entity::find_by_id(registration.event_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            MedError::Internal(anyhow::anyhow!(
                "registration {} references missing event {}",
                registration.id,
                registration.event_id
            ))
        })?;
    let holder = users::Entity::find_by_id(registration.user_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            MedError::Internal(anyhow::anyhow!(
                "registration {} references missing user {}",
                registration.id,
                registration.user_id
            ))
        })?;

    audit::record(
        db,
        "anonymous",
        "certificate.verified",
        Some(certificate.id),
        json!({
            "result": "valid",
            "certificate_number": certificate.certificate_number.clone(),
        }),
    )
    .await;

    Ok(VerificationResult::active(&certificate, &event, &holder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, BASE_URL};
    use crate::{issuance, revocation};
    use medevents_common::NumberGenerator;
    use medevents_common::models::REASON_NOT_FOUND;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_issue_then_verify_round_trip() {
        let db = testkit::test_db().await;
        let registration = testkit::seed_registration(&db, "attended").await;
        let generator = NumberGenerator::new("MED");

        let cert = issuance::issue(&db, &generator, BASE_URL, 5, registration.id, "tester")
            .await
            .unwrap()
            .into_certificate();

        let result = verify(&db, "MED", &cert.certificate_number).await.unwrap();
        assert!(result.valid);
        assert!(result.reason.is_none());
        assert_eq!(
            result.certificate_number.as_deref(),
            Some(cert.certificate_number.as_str())
        );
        let event = result.event.unwrap();
        assert_eq!(event.title, "Regional Cardiology Summit");
        let holder = result.holder.unwrap();
        assert_eq!(holder.full_name, "Dr. Amina Haddad");
    }

    #[tokio::test]
    async fn test_unknown_number_is_not_found() {
        let db = testkit::test_db().await;
        let result = verify(&db, "MED", "MED-2608-ZZZZZZ").await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.reason.as_deref(), Some(REASON_NOT_FOUND));
        assert!(result.certificate_number.is_none());
    }

    #[tokio::test]
    async fn test_malformed_input_short_circuits_before_ledger() {
        // 断开的连接：任何数据库访问都会报错。
        // 畸形输入必须在格式检查处折返，证明账本未被触达。
        let db = DatabaseConnection::default();
        for input in [
            "not-a-real-number",
            "",
            "MED-2608-'; DROP TABLE certificates;--",
            "med-2608-abc234",
        ] {
            let result = verify(&db, "MED", input).await.unwrap();
            assert!(!result.valid, "输入 {:?} 应无效", input);
            assert_eq!(result.reason.as_deref(), Some(REASON_NOT_FOUND));
        }
    }

    #[tokio::test]
    async fn test_revoked_certificate_discloses_reason_verbatim() {
        let db = testkit::test_db().await;
        let registration = testkit::seed_registration(&db, "attended").await;
        let generator = NumberGenerator::new("MED");

        let cert = issuance::issue(&db, &generator, BASE_URL, 5, registration.id, "tester")
            .await
            .unwrap()
            .into_certificate();
        revocation::revoke(&db, cert.id, Uuid::new_v4(), "duplicate issuance")
            .await
            .unwrap();

        let result = verify(&db, "MED", &cert.certificate_number).await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.reason.as_deref(), Some("revoked"));
        assert_eq!(result.revoked_reason.as_deref(), Some("duplicate issuance"));
        assert!(result.revoked_at.is_some());
        // 负向结果不泄露持证人信息
        assert!(result.holder.is_none());
        assert!(result.event.is_none());
    }

    #[tokio::test]
    async fn test_reissue_restores_validity() {
        let db = testkit::test_db().await;
        let registration = testkit::seed_registration(&db, "attended").await;
        let generator = NumberGenerator::new("MED");

        let cert = issuance::issue(&db, &generator, BASE_URL, 5, registration.id, "tester")
            .await
            .unwrap()
            .into_certificate();
        revocation::revoke(&db, cert.id, Uuid::new_v4(), "wrong event listed")
            .await
            .unwrap();
        issuance::issue(&db, &generator, BASE_URL, 5, registration.id, "tester")
            .await
            .unwrap();

        let result = verify(&db, "MED", &cert.certificate_number).await.unwrap();
        assert!(result.valid, "重签后验证应恢复有效");
        assert!(result.revoked_reason.is_none());
    }
}
