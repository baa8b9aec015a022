//! Medevents 统一错误类型定义
//!
//! 全项目共享一个错误类型，简化错误传播和处理。
//! 证书子系统的业务错误（资格、撤销、编号冲突）与基础设施错误共用同一枚举。

use thiserror::Error;
use uuid::Uuid;

/// Medevents 统一错误类型
#[derive(Error, Debug)]
pub enum MedError {
    /// 资源未找到 (404)
    #[error("not found: {0}")]
    NotFound(String),

    /// 请求参数错误 (400)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// 报名不具备发证资格 (422)
    #[error("registration {0} is not eligible for a certificate")]
    NotEligible(Uuid),

    /// 撤销缺少理由 (400)
    #[error("revocation requires a non-empty reason")]
    ReasonRequired,

    /// 证书已处于撤销状态 (409)
    #[error("certificate {0} is already revoked")]
    AlreadyRevoked(Uuid),

    /// 编号冲突重试耗尽 (500)
    #[error("certificate issuance failed: {0}")]
    IssuanceFailed(String),

    /// 验证码渲染失败 (500)
    #[error("verification code encoding failed: {0}")]
    Encoding(String),

    /// 未认证 (401)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 权限不足 (403)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// 数据库错误 (500)
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// 序列化错误 (500)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 其他内部错误 (500)
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl MedError {
    /// 创建未找到错误
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// 创建请求参数错误
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// 创建发证失败错误
    pub fn issuance_failed(msg: impl Into<String>) -> Self {
        Self::IssuanceFailed(msg.into())
    }

    /// 创建编码错误
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// 创建未认证错误
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// 创建权限不足错误
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// 判断是否为客户端错误（4xx）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::BadRequest(_)
                | Self::NotEligible(_)
                | Self::ReasonRequired
                | Self::AlreadyRevoked(_)
                | Self::Unauthorized(_)
                | Self::Forbidden(_)
        )
    }

    /// 判断是否为服务端错误（5xx）
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// 获取 HTTP 状态码
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::BadRequest(_) | Self::ReasonRequired => 400,
            Self::NotEligible(_) => 422,
            Self::AlreadyRevoked(_) => 409,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            _ => 500,
        }
    }

    /// 获取 HTTP 状态码（axum 类型）
    #[cfg(feature = "api")]
    pub fn axum_status_code(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::from_u16(self.http_status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Medevents Result 类型别名
pub type Result<T> = std::result::Result<T, MedError>;

// ============ Axum HTTP 响应支持 ============

#[cfg(feature = "api")]
mod axum_impl {
    use super::*;
    use axum::{
        Json,
        response::{IntoResponse, Response},
    };
    use serde_json::json;

    /// 为 MedError 实现 Axum IntoResponse trait
    /// 这样 api crate 可以直接在处理函数中返回 MedError
    impl IntoResponse for MedError {
        fn into_response(self) -> Response {
            let status = self.axum_status_code();

            // 根据错误类型和严重程度记录结构化日志
            match &self {
                // 客户端错误（4xx）- info 级别，通常是正常的业务流程
                MedError::NotFound(resource) => {
                    tracing::info!(
                        status = status.as_u16(),
                        resource = %resource,
                        "Resource not found"
                    );
                }
                MedError::BadRequest(msg) => {
                    tracing::info!(
                        status = status.as_u16(),
                        reason = %msg,
                        "Bad request"
                    );
                }
                MedError::NotEligible(registration_id) => {
                    tracing::info!(
                        status = status.as_u16(),
                        registration_id = %registration_id,
                        "Registration not eligible for certificate"
                    );
                }
                MedError::ReasonRequired => {
                    tracing::info!(status = status.as_u16(), "Revocation reason missing");
                }
                MedError::AlreadyRevoked(certificate_id) => {
                    tracing::info!(
                        status = status.as_u16(),
                        certificate_id = %certificate_id,
                        "Certificate already revoked"
                    );
                }
                // 认证/授权错误 - warn 级别，可能是探测行为
                MedError::Unauthorized(msg) => {
                    tracing::warn!(
                        status = status.as_u16(),
                        reason = %msg,
                        "Unauthorized request"
                    );
                }
                MedError::Forbidden(msg) => {
                    tracing::warn!(
                        status = status.as_u16(),
                        reason = %msg,
                        "Forbidden request"
                    );
                }
                // 发证/编码错误 - error 级别，需要告警
                MedError::IssuanceFailed(msg) => {
                    tracing::error!(
                        status = status.as_u16(),
                        issuance_error = %msg,
                        "Certificate issuance failed"
                    );
                }
                MedError::Encoding(msg) => {
                    tracing::error!(
                        status = status.as_u16(),
                        encoding_error = %msg,
                        "Verification code encoding failed"
                    );
                }
                // 数据库错误 - error 级别，需要关注
                MedError::Database(db_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        error = %db_err,
                        "Database operation failed"
                    );
                }
                MedError::Serialization(json_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        serialization_error = %json_err,
                        "JSON serialization failed"
                    );
                }
                MedError::Internal(internal_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        internal_error = ?internal_err,
                        "Internal server error"
                    );
                }
            }

            let body = Json(json!({"error": self.to_string()}));
            (status, body).into_response()
        }
    }
}

// ============ 事务错误支持 ============

/// SeaORM 事务错误转换
impl<T> From<sea_orm::TransactionError<T>> for MedError
where
    T: Into<MedError>,
{
    fn from(err: sea_orm::TransactionError<T>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(db) => Self::Database(db),
            sea_orm::TransactionError::Transaction(app) => app.into(),
        }
    }
}
