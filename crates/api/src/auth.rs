//! 认证与权限层
//!
//! Bearer 令牌格式：`{role}:{user_id}:{secret}`，`user_id` 可为空。
//! 与其在路由层为公开端点开"免认证"特例，这里把 `anonymous`
//! 作为权限阶梯上的一等角色：缺失 Authorization 头的请求照常进入
//! 处理函数，只携带匿名身份；各端点自行声明所需权限，
//! 匿名身份不足时由权限检查产生 401。
//! 密钥比较使用常数时间实现，避免时序侧信道泄露前缀。

use axum::Json;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use medevents_common::MedError;
use serde_json::json;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// 角色阶梯，声明顺序即权限高低
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// 未认证调用方，仅能访问公开验证
    Anonymous,
    /// 可读取证书详情与列表
    Auditor,
    /// 可为报名签发证书
    Organizer,
    /// 全部操作，含撤销
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Auditor => "auditor",
            Self::Organizer => "organizer",
            Self::Admin => "admin",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "anonymous" => Some(Self::Anonymous),
            "auditor" => Some(Self::Auditor),
            "organizer" => Some(Self::Organizer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// 证书子系统的权限词汇
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Verify,
    Read,
    Generate,
    Revoke,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verify => "certificate:verify",
            Self::Read => "certificate:read",
            Self::Generate => "certificate:generate",
            Self::Revoke => "certificate:revoke",
        }
    }

    /// 持有该权限所需的最低角色
    fn minimum_role(&self) -> Role {
        match self {
            Self::Verify => Role::Anonymous,
            Self::Read => Role::Auditor,
            Self::Generate => Role::Organizer,
            Self::Revoke => Role::Admin,
        }
    }
}

/// 请求发起者身份，由认证中间件注入请求扩展
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub role: Role,
    pub user_id: Option<Uuid>,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self {
            role: Role::Anonymous,
            user_id: None,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role >= permission.minimum_role()
    }

    /// 权限不足时返回类型化错误：匿名身份缺权限是 401，
    /// 已认证但角色不够是 403。
    pub fn require(&self, permission: Permission) -> Result<(), MedError> {
        if self.has_permission(permission) {
            return Ok(());
        }
        if self.role == Role::Anonymous {
            Err(MedError::unauthorized(format!(
                "{} requires authentication",
                permission.as_str()
            )))
        } else {
            Err(MedError::forbidden(format!(
                "{} required, caller has role '{}'",
                permission.as_str(),
                self.role.as_str()
            )))
        }
    }

    /// 审计记录中的 actor 文本
    pub fn audit_label(&self) -> String {
        match self.user_id {
            Some(id) => id.to_string(),
            None => self.role.as_str().to_string(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Actor>()
            .cloned()
            .unwrap_or_else(Actor::anonymous))
    }
}

/// 认证配置；Debug 输出脱敏，防止密钥进日志
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// 常数时间比较 Bearer 密钥
///
/// 长度不等时也做一次哑比较，避免长度信息从耗时差泄露。
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// 解析 `{role}:{user_id}:{secret}` 格式的 Bearer 令牌
///
/// `expected_secret` 为 `None` 表示开发模式：跳过密钥比对，
/// 但角色与 user_id 照常解析，权限模型始终生效。
pub fn parse_bearer_token(
    provided: &str,
    expected_secret: Option<&str>,
) -> Result<Actor, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();
    if parts.len() != 3 {
        return Err("invalid token format, expected {role}:{user_id}:{secret}".to_string());
    }

    if let Some(expected) = expected_secret {
        if !constant_time_token_eq(parts[2], expected) {
            return Err("invalid bearer token".to_string());
        }
    }

    let role = Role::parse(parts[0]).ok_or_else(|| format!("unknown role: {}", parts[0]))?;

    let user_id = if parts[1].is_empty() {
        None
    } else {
        Some(
            parts[1]
                .parse::<Uuid>()
                .map_err(|err| format!("invalid user_id: {err}"))?,
        )
    };

    Ok(Actor { role, user_id })
}

/// 认证中间件
///
/// 缺失 Authorization 头不是错误：注入匿名身份后放行，
/// 由端点的权限声明决定可达性。头存在但无法通过校验时返回 401，
/// 静默降级为匿名会掩盖调用方的配置错误。
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let config = request.extensions().get::<AuthConfig>().cloned();
    let expected_secret = config.as_ref().and_then(|c| c.token.as_deref());

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    match auth_header {
        None => {
            request.extensions_mut().insert(Actor::anonymous());
            next.run(request).await
        }
        Some(header_value) => match header_value.strip_prefix("Bearer ") {
            Some(provided) => match parse_bearer_token(provided, expected_secret) {
                Ok(actor) => {
                    request.extensions_mut().insert(actor);
                    next.run(request).await
                }
                Err(msg) => {
                    tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                    unauthorized_response(&msg)
                }
            },
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                unauthorized_response("authorization header must use Bearer scheme")
            }
        },
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": format!("unauthorized: {message}")})),
    )
        .into_response()
}
