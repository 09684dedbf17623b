use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ed25519_dalek::VerifyingKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use taxtron_shared::constants::APP_NAME;
use taxtron_shared::{TransferId, TransferStatus, VehicleId};

use crate::auth::{AuthAdmin, AuthUser};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::workflow::{CompleteRequest, InitiateRequest, TransferService};

type ApiResult = Result<axum::response::Response, ServerError>;

#[derive(Clone)]
pub struct AppState {
    pub service: TransferService,
    pub verifying_key: VerifyingKey,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .nest("/ownership-transfer", transfer_routes())
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/search-vehicle/:chassis_number", get(search_vehicle))
        .route("/search-user/:cnic", get(search_user))
        .route("/initiate", post(initiate))
        .route("/cancel/:transfer_id", post(cancel))
        .route("/complete/:transfer_id", post(complete))
        .route("/history/:vehicle_id", get(history_by_vehicle))
        .route("/search-history/:chassis_number", get(history_by_chassis))
        .route("/transfer-status/:transfer_id", get(transfer_status))
        .route("/my-transfers", get(my_transfers))
        .route("/admin/pending-transfers", get(admin_pending))
        .route("/admin/all-transfers", get(admin_all))
        .route("/admin/approve/:transfer_id", post(admin_approve))
        .route("/admin/reject/:transfer_id", post(admin_reject))
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApproveBody {
    admin_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectBody {
    rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusFilter {
    status: Option<String>,
}

// ---------------------------------------------------------------------------
// Service endpoints
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: &'static str,
    version: &'static str,
    default_transfer_fee: i64,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: APP_NAME,
        version: env!("CARGO_PKG_VERSION"),
        default_transfer_fee: state.config.default_transfer_fee,
    })
}

// ---------------------------------------------------------------------------
// Owner endpoints
// ---------------------------------------------------------------------------

async fn search_vehicle(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(chassis_number): Path<String>,
) -> ApiResult {
    let vehicle = state.service.search_vehicle(&chassis_number, user).await?;
    Ok(Json(json!({ "success": true, "vehicle": vehicle })).into_response())
}

async fn search_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(cnic): Path<String>,
) -> ApiResult {
    let recipient = state.service.search_recipient(&cnic, user).await?;
    Ok(Json(json!({ "success": true, "user": recipient })).into_response())
}

async fn initiate(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<InitiateRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body.map_err(bad_body)?;
    let transfer = state.service.initiate(req, user).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Ownership transfer initiated, awaiting admin approval",
            "transfer": transfer,
        })),
    )
        .into_response())
}

async fn cancel(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(transfer_id): Path<String>,
) -> ApiResult {
    let transfer = state.service.cancel(parse_transfer_id(&transfer_id)?, user).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Transfer cancelled",
        "transfer": transfer,
    }))
    .into_response())
}

async fn complete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(transfer_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let id = parse_transfer_id(&transfer_id)?;
    let req: CompleteRequest = optional_json(&headers, &body)?;
    let done = state.service.complete(id, user, req).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Ownership transfer completed",
        "transfer": done.transfer,
        "history": done.history,
    }))
    .into_response())
}

async fn history_by_vehicle(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Path(vehicle_id): Path<String>,
) -> ApiResult {
    let vehicle_id = VehicleId::parse(&vehicle_id)
        .map_err(|_| ServerError::BadRequest("Invalid vehicle id".into()))?;
    let history = state.service.history_by_vehicle(vehicle_id).await?;
    Ok(Json(json!({ "success": true, "history": history })).into_response())
}

/// Public: anyone can check a vehicle's ownership chain before buying it.
async fn history_by_chassis(
    State(state): State<AppState>,
    Path(chassis_number): Path<String>,
) -> ApiResult {
    let history = state.service.history_by_chassis(&chassis_number).await?;
    Ok(Json(json!({ "success": true, "history": history })).into_response())
}

async fn transfer_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(transfer_id): Path<String>,
) -> ApiResult {
    let view = state
        .service
        .get_transfer(parse_transfer_id(&transfer_id)?, user)
        .await?;
    Ok(Json(json!({ "success": true, "transfer": view })).into_response())
}

async fn my_transfers(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult {
    let transfers = state.service.list_for_user(user).await?;
    Ok(Json(json!({ "success": true, "data": transfers })).into_response())
}

// ---------------------------------------------------------------------------
// Admin endpoints
// ---------------------------------------------------------------------------

async fn admin_pending(State(state): State<AppState>, AuthAdmin(_): AuthAdmin) -> ApiResult {
    let transfers = state.service.list_pending_for_admin().await?;
    Ok(Json(json!({ "success": true, "data": transfers })).into_response())
}

async fn admin_all(
    State(state): State<AppState>,
    AuthAdmin(_): AuthAdmin,
    Query(filter): Query<StatusFilter>,
) -> ApiResult {
    let status = filter
        .status
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().parse::<TransferStatus>())
        .transpose()
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let transfers = state.service.list_all_for_admin(status).await?;
    Ok(Json(json!({ "success": true, "data": transfers })).into_response())
}

async fn admin_approve(
    State(state): State<AppState>,
    AuthAdmin(admin): AuthAdmin,
    Path(transfer_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let id = parse_transfer_id(&transfer_id)?;
    let notes = optional_json::<ApproveBody>(&headers, &body)?.admin_notes;
    let transfer = state.service.admin_approve(id, admin, notes).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Transfer approved",
        "transfer": transfer,
    }))
    .into_response())
}

async fn admin_reject(
    State(state): State<AppState>,
    AuthAdmin(admin): AuthAdmin,
    Path(transfer_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let id = parse_transfer_id(&transfer_id)?;
    let reason = optional_json::<RejectBody>(&headers, &body)?.rejection_reason;
    let transfer = state.service.admin_reject(id, admin, reason).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Transfer rejected",
        "transfer": transfer,
    }))
    .into_response())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_transfer_id(raw: &str) -> Result<TransferId, ServerError> {
    TransferId::parse(raw).map_err(|_| ServerError::BadRequest("Invalid transfer id".into()))
}

fn bad_body(rejection: JsonRejection) -> ServerError {
    ServerError::BadRequest(rejection.body_text())
}

/// A JSON body that may be left out entirely. An empty body yields
/// `T::default()`; anything else must be well-formed JSON sent as such.
fn optional_json<T: DeserializeOwned + Default>(
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<T, ServerError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    if !is_json_content_type(headers) {
        return Err(ServerError::BadRequest(
            "Expected request with `Content-Type: application/json`".into(),
        ));
    }
    Json::<T>::from_bytes(body).map(|Json(v)| v).map_err(bad_body)
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, Utc};
    use ed25519_dalek::SigningKey;
    use serde_json::Value;
    use taxtron_shared::session::{create_session_token, generate_signing_key, Role};
    use taxtron_shared::UserId;
    use tower::ServiceExt;

    use crate::workflow::tests::{fixture, Fixture};

    struct Harness {
        app: Router,
        key: SigningKey,
        f: Fixture,
    }

    fn harness() -> Harness {
        let f = fixture();
        let key = generate_signing_key();
        let state = AppState {
            service: f.service.clone(),
            verifying_key: key.verifying_key(),
            rate_limiter: RateLimiter::new(1000.0, 1000.0),
            config: Arc::new(ServerConfig::default()),
        };
        Harness {
            app: build_router(state),
            key,
            f,
        }
    }

    impl Harness {
        fn token(&self, subject: UserId, role: Role) -> String {
            create_session_token(subject.0, role, Utc::now() + Duration::hours(1), &self.key)
                .encode()
        }

        async fn call(
            &self,
            method: &str,
            uri: &str,
            auth: Option<(UserId, Role)>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some((subject, role)) = auth {
                req = req.header("authorization", format!("Bearer {}", self.token(subject, role)));
            }
            let req = match body {
                Some(b) => req
                    .header("content-type", "application/json")
                    .body(Body::from(b.to_string())),
                None => req.body(Body::empty()),
            }
            .unwrap();

            let response = self.app.clone().oneshot(req).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = harness();
        let (status, body) = h.call("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn missing_or_forged_token_is_unauthorized() {
        let h = harness();
        let (status, body) = h.call("GET", "/ownership-transfer/my-transfers", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let other_key = generate_signing_key();
        let forged = create_session_token(
            h.f.alice.id.0,
            Role::User,
            Utc::now() + Duration::hours(1),
            &other_key,
        )
        .encode();
        let req = Request::builder()
            .uri("/ownership-transfer/my-transfers")
            .header("authorization", format!("Bearer {forged}"))
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_need_admin_role() {
        let h = harness();
        let (status, _) = h
            .call(
                "GET",
                "/ownership-transfer/admin/pending-transfers",
                Some((h.f.alice.id, Role::User)),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = h
            .call(
                "GET",
                "/ownership-transfer/admin/pending-transfers",
                Some((UserId::new(), Role::Admin)),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn full_transfer_over_http() {
        let h = harness();
        let alice = Some((h.f.alice.id, Role::User));
        let admin = Some((UserId::new(), Role::Admin));

        let (status, body) = h
            .call("GET", "/ownership-transfer/search-vehicle/ABC123", alice, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vehicle"]["chassisNumber"], "ABC123");

        let (status, body) = h
            .call("GET", "/ownership-transfer/search-user/1111122222223", alice, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["cnic"], "11111-2222222-3");

        let (status, body) = h
            .call(
                "POST",
                "/ownership-transfer/initiate",
                alice,
                Some(json!({
                    "vehicleId": h.f.vehicle.id,
                    "recipientCnic": "11111-2222222-3",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["transfer"]["status"], "pending_admin_approval");
        assert_eq!(body["transfer"]["transferFee"], 5000);
        let id = body["transfer"]["transferId"].as_str().unwrap().to_string();

        let (status, body) = h
            .call(
                "POST",
                &format!("/ownership-transfer/admin/reject/{id}"),
                admin,
                Some(json!({ "rejectionReason": "" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = h
            .call(
                "POST",
                &format!("/ownership-transfer/admin/approve/{id}"),
                admin,
                Some(json!({ "adminNotes": "ok" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transfer"]["status"], "approved");

        let (status, _) = h
            .call(
                "POST",
                &format!("/ownership-transfer/admin/approve/{id}"),
                admin,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = h
            .call(
                "POST",
                &format!("/ownership-transfer/complete/{id}"),
                alice,
                Some(json!({ "blockchainTxHash": "0x01" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transfer"]["status"], "completed");
        assert_eq!(body["history"]["totalTransfers"], 1);

        let (status, body) = h
            .call("GET", "/ownership-transfer/search-history/ABC123", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["history"]["ownershipHistory"].as_array().map(Vec::len), Some(2));
        assert_eq!(
            body["history"]["currentOwner"]["ownerId"],
            json!(h.f.bob.id)
        );
    }

    #[tokio::test]
    async fn bystander_cannot_read_transfer() {
        let h = harness();
        let t = h
            .f
            .service
            .initiate(
                InitiateRequest {
                    vehicle_id: h.f.vehicle.id,
                    recipient_cnic: "11111-2222222-3".into(),
                    transfer_fee: None,
                },
                h.f.alice.id,
            )
            .await
            .unwrap();

        let uri = format!("/ownership-transfer/transfer-status/{}", t.transfer_id);
        let (status, body) = h.call("GET", &uri, Some((h.f.carol.id, Role::User)), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);

        let (status, body) = h.call("GET", &uri, Some((h.f.bob.id, Role::User)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transfer"]["vehicle"]["make"], "Honda");
    }

    #[tokio::test]
    async fn malformed_inputs_are_bad_requests() {
        let h = harness();
        let alice = Some((h.f.alice.id, Role::User));

        let (status, _) = h
            .call("GET", "/ownership-transfer/search-user/12-34", alice, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = h
            .call("POST", "/ownership-transfer/cancel/not-a-uuid", alice, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid transfer id");

        let (status, _) = h
            .call(
                "POST",
                "/ownership-transfer/initiate",
                alice,
                Some(json!({ "recipientCnic": "11111-2222222-3" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = h
            .call(
                "GET",
                "/ownership-transfer/admin/all-transfers?status=bogus",
                Some((UserId::new(), Role::Admin)),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    async fn raw_post(
        h: &Harness,
        uri: &str,
        auth: (UserId, Role),
        content_type: Option<&str>,
        body: &str,
    ) -> StatusCode {
        let mut req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("authorization", format!("Bearer {}", h.token(auth.0, auth.1)));
        if let Some(ct) = content_type {
            req = req.header("content-type", ct);
        }
        let req = req.body(Body::from(body.to_string())).unwrap();
        h.app.clone().oneshot(req).await.unwrap().status()
    }

    async fn approved_id(h: &Harness) -> TransferId {
        let t = h
            .f
            .service
            .initiate(
                InitiateRequest {
                    vehicle_id: h.f.vehicle.id,
                    recipient_cnic: "11111-2222222-3".into(),
                    transfer_fee: None,
                },
                h.f.alice.id,
            )
            .await
            .unwrap();
        h.f.service
            .admin_approve(t.transfer_id, UserId::new(), None)
            .await
            .unwrap();
        t.transfer_id
    }

    #[tokio::test]
    async fn complete_rejects_unreadable_body() {
        let h = harness();
        let id = approved_id(&h).await;
        let uri = format!("/ownership-transfer/complete/{id}");
        let alice = (h.f.alice.id, Role::User);

        // JSON without a JSON content type
        let status = raw_post(&h, &uri, alice, None, r#"{"blockchainTxHash":"0xabc"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let status = raw_post(
            &h,
            &uri,
            alice,
            Some("text/plain"),
            r#"{"blockchainTxHash":"0xabc"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // wrong field type
        let (status, body) = h
            .call("POST", &uri, Some(alice), Some(json!({ "blockchainTxHash": 5 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        // truncated JSON
        let status =
            raw_post(&h, &uri, alice, Some("application/json"), r#"{"blockchainTxHash":"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let view = h.f.service.get_transfer(id, h.f.alice.id).await.unwrap();
        assert_eq!(view.transfer.status, TransferStatus::Approved);
        assert!(view.transfer.blockchain_tx_hash.is_none());
    }

    #[tokio::test]
    async fn complete_accepts_empty_body() {
        let h = harness();
        let id = approved_id(&h).await;
        let uri = format!("/ownership-transfer/complete/{id}");

        let (status, body) = h.call("POST", &uri, Some((h.f.alice.id, Role::User)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transfer"]["status"], "completed");
    }

    #[tokio::test]
    async fn complete_with_charset_content_type() {
        let h = harness();
        let id = approved_id(&h).await;
        let uri = format!("/ownership-transfer/complete/{id}");
        let status = raw_post(
            &h,
            &uri,
            (h.f.alice.id, Role::User),
            Some("application/json; charset=utf-8"),
            r#"{"blockchainTxHash":"0xabc","transferDeed":"deed-1"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let view = h.f.service.get_transfer(id, h.f.alice.id).await.unwrap();
        assert_eq!(view.transfer.blockchain_tx_hash.as_deref(), Some("0xabc"));
        assert_eq!(view.transfer.transfer_deed.as_deref(), Some("deed-1"));
    }

    #[tokio::test]
    async fn review_rejects_unreadable_body() {
        let h = harness();
        let t = h
            .f
            .service
            .initiate(
                InitiateRequest {
                    vehicle_id: h.f.vehicle.id,
                    recipient_cnic: "11111-2222222-3".into(),
                    transfer_fee: None,
                },
                h.f.alice.id,
            )
            .await
            .unwrap();
        let admin = (UserId::new(), Role::Admin);

        let approve = format!("/ownership-transfer/admin/approve/{}", t.transfer_id);
        let status = raw_post(&h, &approve, admin, None, r#"{"adminNotes":"ok"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let reject = format!("/ownership-transfer/admin/reject/{}", t.transfer_id);
        let (status, _) = h
            .call("POST", &reject, Some(admin), Some(json!({ "rejectionReason": ["x"] })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let view = h.f.service.get_transfer(t.transfer_id, h.f.alice.id).await.unwrap();
        assert_eq!(view.transfer.status, TransferStatus::PendingAdminApproval);
        assert!(view.transfer.admin_notes.is_none());
    }

    #[tokio::test]
    async fn unknown_history_is_not_found() {
        let h = harness();
        let (status, body) = h
            .call("GET", "/ownership-transfer/search-history/NOPE", None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }
}
