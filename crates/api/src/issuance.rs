//! 发证服务
//!
//! 对一条具备资格的报名铸造证书。对同一报名重复触发发证是常见
//! 运维场景，因此调用是幂等的：已有有效证书原样返回，已撤销证书
//! 走重签路径恢复有效期。编号冲突由账本的唯一索引裁决，
//! 这里捕获后有界重试。

use medevents_common::MedError;
use medevents_common::certno::NumberSource;
use medevents_common::entities::{certificates, registrations};
use medevents_common::models::IssueOutcome;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::json;
use uuid::Uuid;

use crate::audit;
use crate::ledger::{self, InsertError};
use crate::qr;

pub async fn issue(
    db: &DatabaseConnection,
    generator: &dyn NumberSource,
    base_url: &str,
    max_attempts: u32,
    registration_id: Uuid,
    actor: &str,
) -> Result<IssueOutcome, MedError> {
    let registration = registrations::Entity::find_by_id(registration_id)
        .one(db)
        .await?
        .ok_or_else(|| MedError::not_found(format!("registration {registration_id}")))?;

    if !registration.is_certificate_eligible() {
        return Err(MedError::NotEligible(registration_id));
    }

    if let Some(existing) = ledger::find_by_registration(db, registration_id).await? {
        return resolve_existing(db, existing, base_url, actor).await;
    }

    for attempt in 1..=max_attempts {
        let number = generator.next_number();
        let token = qr::encode(&number, base_url)?;

        match ledger::insert(db, registration_id, &number, &token.url, &token.data_uri()).await {
            Ok(model) => {
                tracing::info!(
                    certificate_number = %model.certificate_number,
                    registration_id = %registration_id,
                    "certificate issued"
                );
                audit::record(
                    db,
                    actor,
                    "certificate.issued",
                    Some(model.id),
                    json!({
                        "outcome": "created",
                        "certificate_number": model.certificate_number.clone(),
                        "registration_id": registration_id,
                    }),
                )
                .await;
                return Ok(IssueOutcome::Created(model));
            }
            Err(InsertError::DuplicateNumber) => {
                tracing::warn!(
                    attempt,
                    number = %number,
                    "certificate number collision, regenerating"
                );
            }
            Err(InsertError::DuplicateRegistration) => {
                // 与并发发证竞争落败：改走幂等读路径
                let existing = ledger::find_by_registration(db, registration_id)
                    .await?
                    .ok_or_else(|| {
                        MedError::issuance_failed(
                            "lost the insert race but no certificate row is visible",
                        )
                    })?;
                return resolve_existing(db, existing, base_url, actor).await;
            }
            Err(InsertError::Db(err)) => return Err(err.into()),
        }
    }

    Err(MedError::issuance_failed(format!(
        "certificate number collisions exhausted after {max_attempts} attempts"
    )))
}

/// 报名已有账本行：有效则幂等返回，已撤销则重签
async fn resolve_existing(
    db: &DatabaseConnection,
    existing: certificates::Model,
    base_url: &str,
    actor: &str,
) -> Result<IssueOutcome, MedError> {
    if !existing.revoked {
        audit::record(
            db,
            actor,
            "certificate.issued",
            Some(existing.id),
            json!({
                "outcome": "already_active",
                "certificate_number": existing.certificate_number.clone(),
            }),
        )
        .await;
        return Ok(IssueOutcome::AlreadyActive(existing));
    }

    // 重签保持编号不变，已分发的验证链接与纸面编号继续可用；
    // 二维码载荷重新渲染，有效期由刷新后的 issued_at 表达。
    let token = qr::encode(&existing.certificate_number, base_url)?;
    let model = ledger::reissue(db, existing.id, &token.url, &token.data_uri()).await?;
    tracing::info!(
        certificate_number = %model.certificate_number,
        registration_id = %model.registration_id,
        "certificate reissued after revocation"
    );
    audit::record(
        db,
        actor,
        "certificate.issued",
        Some(model.id),
        json!({
            "outcome": "reissued",
            "certificate_number": model.certificate_number.clone(),
        }),
    )
    .await;
    Ok(IssueOutcome::Reissued(model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, BASE_URL};
    use crate::{ledger, revocation};
    use medevents_common::NumberGenerator;
    use medevents_common::certno;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 按脚本给出编号的测试桩，耗尽后重复最后一个值
    struct ScriptedNumbers {
        queue: Mutex<VecDeque<String>>,
        fallback: String,
    }

    impl ScriptedNumbers {
        fn new(numbers: &[&str]) -> Self {
            let queue: VecDeque<String> = numbers.iter().map(|s| s.to_string()).collect();
            let fallback = numbers.last().expect("at least one number").to_string();
            Self {
                queue: Mutex::new(queue),
                fallback,
            }
        }
    }

    impl NumberSource for ScriptedNumbers {
        fn next_number(&self) -> String {
            self.queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    #[tokio::test]
    async fn test_issue_creates_well_formed_certificate() {
        let db = testkit::test_db().await;
        let registration = testkit::seed_registration(&db, "attended").await;
        let generator = NumberGenerator::new("MED");

        let outcome = issue(&db, &generator, BASE_URL, 5, registration.id, "tester")
            .await
            .unwrap();

        let cert = match outcome {
            IssueOutcome::Created(m) => m,
            other => panic!("应为 Created，得到 {}", other.label()),
        };
        assert!(certno::is_well_formed("MED", &cert.certificate_number));
        assert_eq!(
            cert.verify_url,
            format!("{BASE_URL}/certificates/verify/{}", cert.certificate_number)
        );
        assert!(cert.qr_code.starts_with("data:image/png;base64,"));
        assert!(!cert.revoked);
        assert!(cert.revoked_reason.is_none());
        assert!(cert.revoked_at.is_none());
        assert!(cert.revoked_by.is_none());
    }

    #[tokio::test]
    async fn test_issue_is_idempotent_for_active_certificate() {
        let db = testkit::test_db().await;
        let registration = testkit::seed_registration(&db, "completed").await;
        let generator = NumberGenerator::new("MED");

        let first = issue(&db, &generator, BASE_URL, 5, registration.id, "tester")
            .await
            .unwrap();
        let second = issue(&db, &generator, BASE_URL, 5, registration.id, "tester")
            .await
            .unwrap();

        assert!(matches!(first, IssueOutcome::Created(_)));
        assert!(matches!(second, IssueOutcome::AlreadyActive(_)));
        assert_eq!(
            first.certificate().certificate_number,
            second.certificate().certificate_number
        );

        let rows = certificates::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1, "同一报名只应有一行");
    }

    #[tokio::test]
    async fn test_issue_rejects_ineligible_registration() {
        let db = testkit::test_db().await;
        let registration = testkit::seed_registration(&db, "registered").await;
        let generator = NumberGenerator::new("MED");

        let err = issue(&db, &generator, BASE_URL, 5, registration.id, "tester")
            .await
            .unwrap_err();
        assert!(matches!(err, MedError::NotEligible(id) if id == registration.id));
    }

    #[tokio::test]
    async fn test_issue_unknown_registration_reports_not_found() {
        let db = testkit::test_db().await;
        let generator = NumberGenerator::new("MED");

        let err = issue(&db, &generator, BASE_URL, 5, Uuid::new_v4(), "tester")
            .await
            .unwrap_err();
        assert!(matches!(err, MedError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_issue_retries_on_number_collision() {
        let db = testkit::test_db().await;
        let taken = testkit::seed_registration(&db, "attended").await;
        ledger::insert(&db, taken.id, "MED-2608-TAKEN1", "u", "q")
            .await
            .unwrap();

        let registration = testkit::seed_registration(&db, "attended").await;
        let generator = ScriptedNumbers::new(&["MED-2608-TAKEN1", "MED-2608-FRESH1"]);

        let outcome = issue(&db, &generator, BASE_URL, 5, registration.id, "tester")
            .await
            .unwrap();
        assert!(matches!(outcome, IssueOutcome::Created(_)));
        assert_eq!(outcome.certificate().certificate_number, "MED-2608-FRESH1");
    }

    #[tokio::test]
    async fn test_issue_fails_after_retries_exhausted() {
        let db = testkit::test_db().await;
        let taken = testkit::seed_registration(&db, "attended").await;
        ledger::insert(&db, taken.id, "MED-2608-TAKEN1", "u", "q")
            .await
            .unwrap();

        let registration = testkit::seed_registration(&db, "attended").await;
        let generator = ScriptedNumbers::new(&["MED-2608-TAKEN1"]);

        let err = issue(&db, &generator, BASE_URL, 3, registration.id, "tester")
            .await
            .unwrap_err();
        assert!(matches!(err, MedError::IssuanceFailed(_)));

        let rows = certificates::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1, "重试耗尽不应留下多余行");
    }

    #[tokio::test]
    async fn test_reissue_after_revocation_keeps_number() {
        let db = testkit::test_db().await;
        let registration = testkit::seed_registration(&db, "attended").await;
        let generator = NumberGenerator::new("MED");

        let created = issue(&db, &generator, BASE_URL, 5, registration.id, "tester")
            .await
            .unwrap()
            .into_certificate();
        revocation::revoke(&db, created.id, Uuid::new_v4(), "printed wrong name")
            .await
            .unwrap();

        let outcome = issue(&db, &generator, BASE_URL, 5, registration.id, "tester")
            .await
            .unwrap();
        let reissued = match outcome {
            IssueOutcome::Reissued(m) => m,
            other => panic!("应为 Reissued，得到 {}", other.label()),
        };
        assert_eq!(reissued.certificate_number, created.certificate_number);
        assert!(!reissued.revoked);
        assert!(reissued.revoked_reason.is_none());
        assert!(reissued.issued_at >= created.issued_at);
    }

    #[tokio::test]
    async fn test_concurrent_issue_yields_single_row_and_same_number() {
        let db = testkit::test_db().await;
        let registration = testkit::seed_registration(&db, "attended").await;
        let generator = NumberGenerator::new("MED");

        let (a, b, c) = tokio::join!(
            issue(&db, &generator, BASE_URL, 5, registration.id, "tester"),
            issue(&db, &generator, BASE_URL, 5, registration.id, "tester"),
            issue(&db, &generator, BASE_URL, 5, registration.id, "tester"),
        );

        let numbers: Vec<String> = [a.unwrap(), b.unwrap(), c.unwrap()]
            .iter()
            .map(|o| o.certificate().certificate_number.clone())
            .collect();
        assert_eq!(numbers[0], numbers[1]);
        assert_eq!(numbers[1], numbers[2]);

        let rows = certificates::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1, "并发发证只应产生一行");
    }
}
