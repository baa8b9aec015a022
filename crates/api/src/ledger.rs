//! 证书账本
//!
//! 所有证书写入都经过这里。两条唯一性约束（报名、编号）由存储层的
//! 唯一索引裁决，而非先查后写；撤销与重签是带状态条件的单条 UPDATE，
//! 状态检查无法与写入交错。

use chrono::Utc;
use medevents_common::MedError;
use medevents_common::entities::certificates;
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set, SqlErr,
};
use thiserror::Error;
use uuid::Uuid;

/// 插入失败的分类结果
///
/// 两条唯一索引的冲突含义不同：报名重复走幂等读路径，
/// 编号重复由发证服务重新生成后重试。
#[derive(Debug, Error)]
pub enum InsertError {
    #[error("registration already has a certificate")]
    DuplicateRegistration,
    #[error("certificate number already exists")]
    DuplicateNumber,
    #[error(transparent)]
    Db(#[from] DbErr),
}

fn classify_insert_error(err: DbErr) -> InsertError {
    if let Some(SqlErr::UniqueConstraintViolation(msg)) = err.sql_err() {
        // Postgres 报索引名，SQLite 报列名，两者都含列标识
        if msg.contains("registration_id") {
            return InsertError::DuplicateRegistration;
        }
        if msg.contains("certificate_number") {
            return InsertError::DuplicateNumber;
        }
    }
    InsertError::Db(err)
}

pub async fn find_by_registration(
    db: &DatabaseConnection,
    registration_id: Uuid,
) -> Result<Option<certificates::Model>, MedError> {
    let found = certificates::Entity::find()
        .filter(certificates::Column::RegistrationId.eq(registration_id))
        .one(db)
        .await?;
    Ok(found)
}

/// 按编号查找，走唯一索引；公开验证路径的主查询
pub async fn find_by_number(
    db: &DatabaseConnection,
    certificate_number: &str,
) -> Result<Option<certificates::Model>, MedError> {
    let found = certificates::Entity::find()
        .filter(certificates::Column::CertificateNumber.eq(certificate_number))
        .one(db)
        .await?;
    Ok(found)
}

pub async fn insert(
    db: &DatabaseConnection,
    registration_id: Uuid,
    certificate_number: &str,
    verify_url: &str,
    qr_code: &str,
) -> Result<certificates::Model, InsertError> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let active = certificates::ActiveModel {
        id: Set(Uuid::new_v4()),
        registration_id: Set(registration_id),
        certificate_number: Set(certificate_number.to_string()),
        verify_url: Set(verify_url.to_string()),
        qr_code: Set(qr_code.to_string()),
        issued_at: Set(now),
        revoked: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    active.insert(db).await.map_err(classify_insert_error)
}

/// 重签：清空撤销字段、刷新签发时间与验证载荷，编号保持不变
///
/// 条件限定 `revoked = true`。零行受影响时要么 id 不存在，
/// 要么并发重签已先完成——后者直接返回当前行即是正确结果。
pub async fn reissue(
    db: &DatabaseConnection,
    certificate_id: Uuid,
    verify_url: &str,
    qr_code: &str,
) -> Result<certificates::Model, MedError> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    certificates::Entity::update_many()
        .col_expr(certificates::Column::Revoked, Expr::value(false))
        .col_expr(
            certificates::Column::RevokedReason,
            Expr::value(Option::<String>::None),
        )
        .col_expr(
            certificates::Column::RevokedAt,
            Expr::value(Option::<DateTimeWithTimeZone>::None),
        )
        .col_expr(
            certificates::Column::RevokedBy,
            Expr::value(Option::<Uuid>::None),
        )
        .col_expr(certificates::Column::IssuedAt, Expr::value(now))
        .col_expr(
            certificates::Column::VerifyUrl,
            Expr::value(verify_url.to_string()),
        )
        .col_expr(
            certificates::Column::QrCode,
            Expr::value(qr_code.to_string()),
        )
        .col_expr(certificates::Column::UpdatedAt, Expr::value(now))
        .filter(certificates::Column::Id.eq(certificate_id))
        .filter(certificates::Column::Revoked.eq(true))
        .exec(db)
        .await?;

    certificates::Entity::find_by_id(certificate_id)
        .one(db)
        .await?
        .ok_or_else(|| MedError::not_found(format!("certificate {certificate_id}")))
}

/// 撤销：一次性写入三个撤销字段
///
/// 条件限定 `revoked = false`。零行受影响时回读区分
/// `NotFound` 与 `AlreadyRevoked`，重复撤销按调用方缺陷显式报错。
pub async fn revoke(
    db: &DatabaseConnection,
    certificate_id: Uuid,
    reason: &str,
    actor_id: Uuid,
) -> Result<certificates::Model, MedError> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let result = certificates::Entity::update_many()
        .col_expr(certificates::Column::Revoked, Expr::value(true))
        .col_expr(
            certificates::Column::RevokedReason,
            Expr::value(Some(reason.to_string())),
        )
        .col_expr(certificates::Column::RevokedAt, Expr::value(Some(now)))
        .col_expr(certificates::Column::RevokedBy, Expr::value(Some(actor_id)))
        .col_expr(certificates::Column::UpdatedAt, Expr::value(now))
        .filter(certificates::Column::Id.eq(certificate_id))
        .filter(certificates::Column::Revoked.eq(false))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return match certificates::Entity::find_by_id(certificate_id).one(db).await? {
            None => Err(MedError::not_found(format!("certificate {certificate_id}"))),
            Some(_) => Err(MedError::AlreadyRevoked(certificate_id)),
        };
    }

    certificates::Entity::find_by_id(certificate_id)
        .one(db)
        .await?
        .ok_or_else(|| MedError::not_found(format!("certificate {certificate_id}")))
}
