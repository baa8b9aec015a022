//! API 数据传输对象
//!
//! 证书子系统对外的请求/响应结构。验证结果刻意保持统一形状：
//! 无论证书未找到、格式非法还是已撤销，负向结果的结构一致，
//! 不向匿名调用方泄露具体失败模式（撤销理由按策略公开除外）。

use crate::entities::{certificates, events, users};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// 验证结果中的负向理由：未找到（含格式非法）
pub const REASON_NOT_FOUND: &str = "not_found";
/// 验证结果中的负向理由：已撤销
pub const REASON_REVOKED: &str = "revoked";

/// 发证结果，显式区分三种情形
///
/// 调用方与测试据此判断本次调用创建了新证书、命中了已有有效证书，
/// 还是对已撤销证书执行了重签，而不必比对字段差异。
#[derive(Debug, Clone)]
pub enum IssueOutcome {
    /// 首次签发，新建账本行
    Created(certificates::Model),
    /// 报名已有有效证书，原样返回（幂等）
    AlreadyActive(certificates::Model),
    /// 原证书已撤销，重签恢复有效性（编号保持不变）
    Reissued(certificates::Model),
}

impl IssueOutcome {
    pub fn certificate(&self) -> &certificates::Model {
        match self {
            Self::Created(m) | Self::AlreadyActive(m) | Self::Reissued(m) => m,
        }
    }

    pub fn into_certificate(self) -> certificates::Model {
        match self {
            Self::Created(m) | Self::AlreadyActive(m) | Self::Reissued(m) => m,
        }
    }

    /// 指标标签与响应体中的结果名
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::AlreadyActive(_) => "already_active",
            Self::Reissued(_) => "reissued",
        }
    }
}

/// 发证接口响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResponse {
    pub outcome: String,
    pub certificate: certificates::Model,
}

impl From<IssueOutcome> for IssueResponse {
    fn from(outcome: IssueOutcome) -> Self {
        let label = outcome.label();
        Self {
            outcome: label.to_string(),
            certificate: outcome.into_certificate(),
        }
    }
}

/// 撤销接口请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeRequest {
    pub reason: String,
}

/// 认证路径下的证书详情（含持证人完整信息）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateDetail {
    pub certificate: certificates::Model,
    pub event: events::Model,
    pub holder: users::Model,
}

/// 公开验证路径可披露的活动信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub title: String,
    pub venue: Option<String>,
    pub starts_at: DateTime<FixedOffset>,
    pub ends_at: DateTime<FixedOffset>,
}

impl From<&events::Model> for EventSummary {
    fn from(event: &events::Model) -> Self {
        Self {
            title: event.title.clone(),
            venue: event.venue.clone(),
            starts_at: event.starts_at,
            ends_at: event.ends_at,
        }
    }
}

/// 公开验证路径可披露的持证人信息
///
/// 验证端点不要求任何凭证，这里刻意不包含邮箱等联系方式。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderSummary {
    pub full_name: String,
    pub organization: Option<String>,
}

impl From<&users::Model> for HolderSummary {
    fn from(user: &users::Model) -> Self {
        Self {
            full_name: user.full_name.clone(),
            organization: user.organization.clone(),
        }
    }
}

/// 公开验证结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<HolderSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_reason: Option<String>,
}

impl VerificationResult {
    /// 未找到/格式非法统一走这个出口
    pub fn not_found() -> Self {
        Self {
            valid: false,
            reason: Some(REASON_NOT_FOUND.to_string()),
            certificate_number: None,
            issued_at: None,
            event: None,
            holder: None,
            revoked_at: None,
            revoked_reason: None,
        }
    }

    /// 已撤销：按策略披露撤销时间与操作员填写的理由
    pub fn revoked(
        revoked_at: Option<DateTime<FixedOffset>>,
        revoked_reason: Option<String>,
    ) -> Self {
        Self {
            valid: false,
            reason: Some(REASON_REVOKED.to_string()),
            certificate_number: None,
            issued_at: None,
            event: None,
            holder: None,
            revoked_at,
            revoked_reason,
        }
    }

    /// 有效：仅包含可公开字段
    pub fn active(
        certificate: &certificates::Model,
        event: &events::Model,
        holder: &users::Model,
    ) -> Self {
        Self {
            valid: true,
            reason: None,
            certificate_number: Some(certificate.certificate_number.clone()),
            issued_at: Some(certificate.issued_at),
            event: Some(EventSummary::from(event)),
            holder: Some(HolderSummary::from(holder)),
            revoked_at: None,
            revoked_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_event() -> events::Model {
        events::Model {
            id: Uuid::new_v4(),
            title: "Regional Cardiology Summit".to_string(),
            venue: Some("Tunis".to_string()),
            starts_at: Utc::now().into(),
            ends_at: Utc::now().into(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn sample_user() -> users::Model {
        users::Model {
            id: Uuid::new_v4(),
            full_name: "Dr. Amina Haddad".to_string(),
            organization: Some("CHU Sahloul".to_string()),
            email: "amina@example.org".to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn sample_certificate() -> certificates::Model {
        certificates::Model {
            id: Uuid::new_v4(),
            registration_id: Uuid::new_v4(),
            certificate_number: "MED-2608-ABC234".to_string(),
            verify_url: "https://example.org/certificates/verify/MED-2608-ABC234".to_string(),
            qr_code: "data:image/png;base64,".to_string(),
            issued_at: Utc::now().into(),
            revoked: false,
            revoked_reason: None,
            revoked_at: None,
            revoked_by: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_not_found_shape() {
        let json = serde_json::to_value(VerificationResult::not_found()).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["reason"], REASON_NOT_FOUND);
        assert!(json.get("certificate_number").is_none());
        assert!(json.get("holder").is_none());
    }

    #[test]
    fn test_revoked_shape_discloses_reason_verbatim() {
        let result = VerificationResult::revoked(
            Some(Utc::now().into()),
            Some("duplicate issuance".to_string()),
        );
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["reason"], REASON_REVOKED);
        assert_eq!(json["revoked_reason"], "duplicate issuance");
        assert!(json.get("holder").is_none());
    }

    #[test]
    fn test_active_result_excludes_contact_information() {
        let result =
            VerificationResult::active(&sample_certificate(), &sample_event(), &sample_user());
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["valid"], true);
        assert!(json.get("reason").is_none());
        assert_eq!(json["certificate_number"], "MED-2608-ABC234");
        assert_eq!(json["holder"]["full_name"], "Dr. Amina Haddad");
        // 公开路径不得出现邮箱
        assert!(json["holder"].get("email").is_none());
        assert_eq!(json["event"]["title"], "Regional Cardiology Summit");
    }

    #[test]
    fn test_issue_outcome_labels() {
        let cert = sample_certificate();
        assert_eq!(IssueOutcome::Created(cert.clone()).label(), "created");
        assert_eq!(
            IssueOutcome::AlreadyActive(cert.clone()).label(),
            "already_active"
        );
        assert_eq!(IssueOutcome::Reissued(cert.clone()).label(), "reissued");
    }

    #[test]
    fn test_issue_response_from_outcome() {
        let cert = sample_certificate();
        let number = cert.certificate_number.clone();
        let response = IssueResponse::from(IssueOutcome::Created(cert));
        assert_eq!(response.outcome, "created");
        assert_eq!(response.certificate.certificate_number, number);
    }
}
