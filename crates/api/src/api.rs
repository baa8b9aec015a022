use crate::auth::{self, Actor, AuthConfig, Permission};
use crate::state::AppState;
use crate::{issuance, metrics, revocation, verification};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, middleware};
use medevents_common::MedError;
use medevents_common::entities::{certificates, events, registrations, users};
use medevents_common::models::{
    CertificateDetail, IssueResponse, RevokeRequest, VerificationResult,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

type ApiResult<T> = std::result::Result<T, MedError>;

pub fn router(state: AppState) -> axum::Router {
    let auth_config = AuthConfig {
        token: state.auth_token.clone(),
    };
    // 路径无版本前缀：二维码里的验证链接是长期有效的对外承诺
    axum::Router::new()
        .route("/registrations/{id}/certificate", post(issue_certificate))
        .route("/certificates", get(list_certificates))
        .route("/certificates/{id}", get(get_certificate))
        .route("/certificates/{id}/revoke", post(revoke_certificate))
        .route("/certificates/verify/{number}", get(verify_certificate))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_endpoint))
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(middleware::from_fn(auth::auth_middleware))
        .layer(axum::Extension(auth_config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn issue_certificate(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<IssueResponse>> {
    actor.require(Permission::Generate)?;
    let outcome = issuance::issue(
        &state.db,
        &state.generator,
        &state.public_base_url,
        state.issue_max_attempts,
        id,
        &actor.audit_label(),
    )
    .await?;
    metrics::inc_issued(outcome.label());
    Ok(Json(IssueResponse::from(outcome)))
}

#[derive(Debug, Deserialize)]
struct CertificateListQuery {
    event_id: Option<Uuid>,
    revoked: Option<bool>,
}

async fn list_certificates(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<CertificateListQuery>,
) -> ApiResult<Json<Vec<certificates::Model>>> {
    actor.require(Permission::Read)?;
    let mut query = certificates::Entity::find().order_by_desc(certificates::Column::IssuedAt);
    if let Some(revoked) = params.revoked {
        query = query.filter(certificates::Column::Revoked.eq(revoked));
    }
    if let Some(event_id) = params.event_id {
        query = query
            .inner_join(registrations::Entity)
            .filter(registrations::Column::EventId.eq(event_id));
    }
    let list = query.all(&state.db).await?;
    Ok(Json(list))
}

async fn get_certificate(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CertificateDetail>> {
    actor.require(Permission::Read)?;
    let certificate = certificates::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| MedError::not_found(format!("certificate {id}")))?;
    let registration = registrations::Entity::find_by_id(certificate.registration_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            MedError::Internal(anyhow::anyhow!(
                "certificate {} references missing registration {}",
                certificate.id,
                certificate.registration_id
            ))
        })?;
    let event = events::Entity::find_by_id(registration.event_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            MedError::Internal(anyhow::anyhow!(
                "registration {} references missing event {}",
                registration.id,
                registration.event_id
            ))
        })?;
    let holder = users::Entity::find_by_id(registration.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            MedError::Internal(anyhow::anyhow!(
                "registration {} references missing user {}",
                registration.id,
                registration.user_id
            ))
        })?;
    Ok(Json(CertificateDetail {
        certificate,
        event,
        holder,
    }))
}

/// 公开验证端点：唯一不要求凭证的证书操作
async fn verify_certificate(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> ApiResult<Json<VerificationResult>> {
    let result = verification::verify(&state.db, &state.certificate_prefix, &number).await?;
    metrics::inc_verification(result.reason.as_deref().unwrap_or("valid"));
    Ok(Json(result))
}

async fn revoke_certificate(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<RevokeRequest>,
) -> ApiResult<Json<certificates::Model>> {
    actor.require(Permission::Revoke)?;
    // 撤销字段要记录操作者，令牌必须绑定用户
    let actor_id = actor
        .user_id
        .ok_or_else(|| MedError::forbidden("certificate:revoke requires a user-bound token"))?;
    let model = revocation::revoke(&state.db, id, actor_id, &payload.reason).await?;
    metrics::inc_revocation();
    Ok(Json(model))
}

async fn healthz(State(state): State<AppState>) -> ApiResult<Json<JsonValue>> {
    state.db.ping().await?;
    Ok(Json(json!({"status": "ok"})))
}

async fn metrics_endpoint() -> axum::response::Response {
    metrics::render_metrics()
}
