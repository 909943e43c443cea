// 🌐 REST API - axum router over the shared SQLite connection
//
// Every response is wrapped in ApiResponse { success, data, error, code }.
// Typed BrokerageError values map to status codes; anything else is a 500.
// Request bodies that fail to parse are 400s inside the same envelope.

use crate::commission::CommissionSummary;
use crate::config::Config;
use crate::db::{
    delete_agent, delete_party, due_conditions, get_agent, get_party, get_trade, insert_agent,
    insert_party, insert_trade, list_agents, list_parties, list_trades, update_agent, update_party,
    update_trade, DueCondition,
};
use crate::eft::{
    issue_eft, list_efts, list_efts_for_trade, peek_next, EftDraft, EftFamily, EftRecord,
};
use crate::entities::{Agent, Party, PartyKind, Trade};
use crate::error::BrokerageError;
use crate::finalize::{finalize_trade, preview, FinalizeOutcome};
use crate::ledger::{
    get_ledger, post_batch, trial_balance, AccountBalance, LedgerEntry, LedgerFilter, ManualBatch,
    PostResult,
};
use crate::posting::PostingPlan;
use crate::reconciliation::{
    get_settings, save_settings, set_cleared, ReconciliationEngine, ReconciliationReport,
    ReconciliationSettings,
};
use axum::{
    async_trait,
    extract::{FromRequest, Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(conn: Connection, config: Config) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError(anyhow::anyhow!("database lock poisoned")))
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error code, e.g. "already_finalized"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.typed() {
            Some(BrokerageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Some(BrokerageError::AlreadyFinalized(_)) => StatusCode::CONFLICT,
            Some(BrokerageError::Unbalanced { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Some(BrokerageError::CounterExhausted { .. }) => StatusCode::CONFLICT,
            Some(BrokerageError::Validation(_)) => StatusCode::BAD_REQUEST,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn typed(&self) -> Option<&BrokerageError> {
        self.0.downcast_ref::<BrokerageError>()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "request failed");
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.0.to_string()),
            code: Some(self.typed().map_or("internal", |e| e.code()).to_string()),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// Who is acting, for the audit trail
fn actor(headers: &HeaderMap) -> String {
    headers
        .get("x-actor")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("api")
        .to_string()
}

fn parse_body<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError(BrokerageError::Validation(format!("invalid body: {}", e)).into()))
}

/// `Json` extractor whose rejections come back inside the ApiResponse envelope
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError(
                BrokerageError::Validation(format!("invalid body: {}", rejection.body_text()))
                    .into(),
            )),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// API routes, to be nested under /api
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/agents", get(agents_list).post(agents_create))
        .route("/agents/:id", get(agents_get).put(agents_update).delete(agents_delete))
        .route("/parties/:kind", get(parties_list).post(parties_create))
        .route(
            "/parties/:kind/:id",
            get(parties_get).put(parties_update).delete(parties_delete),
        )
        .route("/trades", get(trades_list).post(trades_create))
        .route("/trades/finalize", post(trades_finalize))
        .route("/trades/conditions/due", get(trades_due_conditions))
        .route("/trades/:id", get(trades_get).put(trades_update))
        .route("/trades/:id/commission", get(trades_commission))
        .route("/trades/:id/postings", get(trades_postings))
        .route("/trades/:id/efts", get(trades_efts))
        .route("/ledger", get(ledger_list).post(ledger_post))
        .route("/ledger/trial-balance", get(ledger_trial_balance))
        .route("/eft/:family", get(eft_list).post(eft_issue))
        .route("/eft/:family/next", get(eft_next))
        .route(
            "/reconciliation/:account/:period",
            get(reconciliation_get).put(reconciliation_save),
        )
        .route("/reconciliation/:account/:period/clear", post(reconciliation_clear))
        .route("/reconciliation/:account/:period/report", get(reconciliation_report))
        .with_state(state)
}

/// Full application router: /api plus permissive CORS and request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> ApiResult<&'static str> {
    ok("OK")
}

// --- agents -----------------------------------------------------------------

async fn agents_list(State(state): State<AppState>) -> ApiResult<Vec<Agent>> {
    let conn = state.conn()?;
    ok(list_agents(&conn)?)
}

async fn agents_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(mut agent): ApiJson<Agent>,
) -> Result<(StatusCode, Json<ApiResponse<Agent>>), ApiError> {
    let conn = state.conn()?;
    insert_agent(&conn, &mut agent, &actor(&headers))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(agent))))
}

async fn agents_get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Agent> {
    let conn = state.conn()?;
    ok(get_agent(&conn, &id)?)
}

async fn agents_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(mut agent): ApiJson<Agent>,
) -> ApiResult<Agent> {
    let conn = state.conn()?;
    agent.id = id;
    update_agent(&conn, &agent, &actor(&headers))?;
    ok(get_agent(&conn, &agent.id)?)
}

async fn agents_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<String> {
    let conn = state.conn()?;
    delete_agent(&conn, &id, &actor(&headers))?;
    ok(id)
}

// --- parties ----------------------------------------------------------------

fn party_from_body(kind: PartyKind, mut body: serde_json::Value) -> Result<Party, ApiError> {
    if let Some(obj) = body.as_object_mut() {
        obj.insert("kind".to_string(), serde_json::json!(kind));
    }
    parse_body(body)
}

async fn parties_list(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Vec<Party>> {
    let kind: PartyKind = kind.parse()?;
    let conn = state.conn()?;
    ok(list_parties(&conn, kind)?)
}

async fn parties_create(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> Result<(StatusCode, Json<ApiResponse<Party>>), ApiError> {
    let mut party = party_from_body(kind.parse()?, body)?;
    let conn = state.conn()?;
    insert_party(&conn, &mut party, &actor(&headers))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(party))))
}

async fn parties_get(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<Party> {
    let kind: PartyKind = kind.parse()?;
    let conn = state.conn()?;
    ok(get_party(&conn, kind, &id)?)
}

async fn parties_update(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> ApiResult<Party> {
    let kind: PartyKind = kind.parse()?;
    let mut party = party_from_body(kind, body)?;
    party.id = id;
    let conn = state.conn()?;
    update_party(&conn, &party, &actor(&headers))?;
    ok(get_party(&conn, kind, &party.id)?)
}

async fn parties_delete(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<String> {
    let kind: PartyKind = kind.parse()?;
    let conn = state.conn()?;
    delete_party(&conn, kind, &id, &actor(&headers))?;
    ok(id)
}

// --- trades -----------------------------------------------------------------

async fn trades_list(State(state): State<AppState>) -> ApiResult<Vec<Trade>> {
    let conn = state.conn()?;
    ok(list_trades(&conn)?)
}

async fn trades_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(mut body): ApiJson<serde_json::Value>,
) -> Result<(StatusCode, Json<ApiResponse<Trade>>), ApiError> {
    // New trades take the configured HST rate unless the body names one
    if let Some(obj) = body.as_object_mut() {
        let commission = obj
            .entry("commission")
            .or_insert_with(|| serde_json::json!({}));
        if let Some(commission) = commission.as_object_mut() {
            commission
                .entry("hst_rate")
                .or_insert_with(|| serde_json::json!(state.config.hst_rate));
        }
    }
    let mut trade: Trade = parse_body(body)?;
    if trade.id.is_empty() {
        trade.id = uuid::Uuid::new_v4().to_string();
    }

    let conn = state.conn()?;
    insert_trade(&conn, &mut trade, &actor(&headers))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(trade))))
}

async fn trades_get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Trade> {
    let conn = state.conn()?;
    ok(get_trade(&conn, &id)?)
}

async fn trades_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(mut trade): ApiJson<Trade>,
) -> ApiResult<Trade> {
    let conn = state.conn()?;
    trade.id = id;
    update_trade(&conn, &mut trade, &actor(&headers))?;
    ok(trade)
}

async fn trades_commission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CommissionSummary> {
    let conn = state.conn()?;
    let trade = get_trade(&conn, &id)?;
    let (summary, _) = preview(&conn, &trade)?;
    ok(summary)
}

async fn trades_postings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PostingPlan> {
    let conn = state.conn()?;
    let trade = get_trade(&conn, &id)?;
    let (_, plan) = preview(&conn, &trade)?;
    ok(plan)
}

async fn trades_efts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<EftRecord>> {
    let conn = state.conn()?;
    let trade = get_trade(&conn, &id)?;
    ok(list_efts_for_trade(&conn, &trade.id)?)
}

#[derive(Debug, Deserialize)]
struct FinalizeRequest {
    trade_id: String,
    #[serde(default)]
    actor: Option<String>,
}

async fn trades_finalize(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<FinalizeRequest>,
) -> ApiResult<FinalizeOutcome> {
    let actor = req.actor.unwrap_or_else(|| actor(&headers));
    let mut conn = state.conn()?;
    ok(finalize_trade(&mut conn, &req.trade_id, &actor)?)
}

#[derive(Debug, Deserialize)]
struct DueQuery {
    #[serde(default = "default_due_days")]
    days: i64,
}

fn default_due_days() -> i64 {
    7
}

async fn trades_due_conditions(
    State(state): State<AppState>,
    Query(query): Query<DueQuery>,
) -> ApiResult<Vec<DueCondition>> {
    let conn = state.conn()?;
    ok(due_conditions(&conn, Utc::now().date_naive(), query.days)?)
}

// --- ledger -----------------------------------------------------------------

async fn ledger_list(
    State(state): State<AppState>,
    Query(filter): Query<LedgerFilter>,
) -> ApiResult<Vec<LedgerEntry>> {
    let conn = state.conn()?;
    ok(get_ledger(&conn, &filter)?)
}

async fn ledger_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(manual): ApiJson<ManualBatch>,
) -> Result<(StatusCode, Json<ApiResponse<PostResult>>), ApiError> {
    let mut batch = manual.into_batch()?;
    let mut conn = state.conn()?;
    let tx = conn.transaction()?;
    let result = post_batch(&tx, &mut batch, &actor(&headers))?;
    tx.commit()?;

    let status = if result.duplicate { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(ApiResponse::ok(result))))
}

async fn ledger_trial_balance(State(state): State<AppState>) -> ApiResult<Vec<AccountBalance>> {
    let conn = state.conn()?;
    ok(trial_balance(&conn)?)
}

// --- eft --------------------------------------------------------------------

async fn eft_list(
    State(state): State<AppState>,
    Path(family): Path<String>,
) -> ApiResult<Vec<EftRecord>> {
    let family: EftFamily = family.parse()?;
    let conn = state.conn()?;
    ok(list_efts(&conn, family)?)
}

async fn eft_issue(
    State(state): State<AppState>,
    Path(family): Path<String>,
    headers: HeaderMap,
    ApiJson(draft): ApiJson<EftDraft>,
) -> Result<(StatusCode, Json<ApiResponse<EftRecord>>), ApiError> {
    let family: EftFamily = family.parse()?;
    let mut conn = state.conn()?;
    let tx = conn.transaction()?;
    let record = issue_eft(&tx, family, draft, &actor(&headers))?;
    tx.commit()?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(record))))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextEft {
    pub family: EftFamily,
    pub next: i64,
}

async fn eft_next(State(state): State<AppState>, Path(family): Path<String>) -> ApiResult<NextEft> {
    let family: EftFamily = family.parse()?;
    let conn = state.conn()?;
    ok(NextEft {
        family,
        next: peek_next(&conn, family)?,
    })
}

// --- reconciliation ---------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SettingsRequest {
    statement_opening: Decimal,
    statement_closing: Decimal,
    #[serde(default)]
    cleared_entry_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ClearRequest {
    entry_id: String,
    #[serde(default = "default_cleared")]
    cleared: bool,
}

fn default_cleared() -> bool {
    true
}

async fn reconciliation_get(
    State(state): State<AppState>,
    Path((account, period)): Path<(String, String)>,
) -> ApiResult<ReconciliationSettings> {
    let conn = state.conn()?;
    ok(get_settings(&conn, &account, &period)?)
}

async fn reconciliation_save(
    State(state): State<AppState>,
    Path((account, period)): Path<(String, String)>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<SettingsRequest>,
) -> ApiResult<ReconciliationSettings> {
    let mut conn = state.conn()?;
    let tx = conn.transaction()?;
    let mut settings = get_settings(&tx, &account, &period)?;
    settings.statement_opening = req.statement_opening;
    settings.statement_closing = req.statement_closing;
    if let Some(ids) = req.cleared_entry_ids {
        settings.cleared_entry_ids = ids;
    }
    save_settings(&tx, &mut settings, &actor(&headers))?;
    tx.commit()?;
    ok(settings)
}

async fn reconciliation_clear(
    State(state): State<AppState>,
    Path((account, period)): Path<(String, String)>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<ClearRequest>,
) -> ApiResult<ReconciliationSettings> {
    let mut conn = state.conn()?;
    let tx = conn.transaction()?;
    let settings = set_cleared(
        &tx,
        &account,
        &period,
        &req.entry_id,
        req.cleared,
        &actor(&headers),
    )?;
    tx.commit()?;
    ok(settings)
}

async fn reconciliation_report(
    State(state): State<AppState>,
    Path((account, period)): Path<(String, String)>,
) -> ApiResult<ReconciliationReport> {
    let engine = ReconciliationEngine::with_thresholds(
        state.config.recon_tolerance,
        state.config.recon_major_threshold,
    );
    let conn = state.conn()?;
    ok(engine.report(&conn, &account, &period)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app() -> Router {
        test_app_with(Config::default())
    }

    fn test_app_with(config: Config) -> Router {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        router(AppState::new(conn, config))
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map(|b| b.to_string());
        call_raw(app, method, uri, body).await
    }

    async fn call_raw(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<String>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-actor", "tester");
        let request = match body {
            Some(b) => builder.body(Body::from(b)).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create_trade(app: &Router, deposit: &str) -> (String, String) {
        let (status, agent) = call(
            app,
            "POST",
            "/api/agents",
            Some(json!({ "first_name": "Jane", "last_name": "Doe" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let agent_id = agent["data"]["id"].as_str().unwrap().to_string();

        let (status, trade) = call(
            app,
            "POST",
            "/api/trades",
            Some(json!({
                "key_info": { "address": "1 King St W", "closing_date": "2026-06-30" },
                "commission": { "total_commission": "20000" },
                "agent_commissions": [{ "agent_id": agent_id, "award_pct": "100" }],
                "trust_records": [{
                    "received_from": "Buyer",
                    "amount": deposit,
                    "we_hold": true
                }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", trade);
        (trade["data"]["id"].as_str().unwrap().to_string(), agent_id)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = call(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_unknown_agent_is_404() {
        let app = test_app();
        let (status, body) = call(&app, "GET", "/api/agents/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "not_found");
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_malformed_body_uses_envelope() {
        let app = test_app();

        let (status, body) =
            call_raw(&app, "POST", "/api/ledger", Some("{\"date\": ".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "validation");

        let (status, body) = call(&app, "POST", "/api/ledger", Some(json!({ "lines": 3 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("validation failed"));
    }

    #[tokio::test]
    async fn test_party_crud_by_kind() {
        let app = test_app();

        let (status, created) = call(
            &app,
            "POST",
            "/api/parties/lawyers",
            Some(json!({ "name": "Pat Counsel", "company": "Counsel LLP" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["data"]["kind"], "lawyer");
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (_, listed) = call(&app, "GET", "/api/parties/lawyer", None).await;
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);
        let (_, vendors) = call(&app, "GET", "/api/parties/vendors", None).await;
        assert!(vendors["data"].as_array().unwrap().is_empty());

        let (status, _) = call(&app, "GET", "/api/parties/plumbers", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "DELETE", &format!("/api/parties/lawyers/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GET", &format!("/api/parties/lawyers/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_trade_previews() {
        let app = test_app();
        let (trade_id, _) = create_trade(&app, "30000").await;

        let (_, trade) = call(&app, "GET", &format!("/api/trades/{}", trade_id), None).await;
        assert_eq!(trade["data"]["trade_number"], 1);
        assert_eq!(trade["data"]["commission"]["hst_rate"], "0.13");

        let uri = format!("/api/trades/{}/commission", trade_id);
        let (status, summary) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["data"]["total_with_hst"], "22600.00");

        let uri = format!("/api/trades/{}/postings", trade_id);
        let (_, plan) = call(&app, "GET", &uri, None).await;
        assert_eq!(plan["data"]["fully_funded"], true);

        // Preview writes nothing
        let (_, next) = call(&app, "GET", "/api/eft/real-estate-trust/next", None).await;
        assert_eq!(next["data"]["next"], 1000);
    }

    #[tokio::test]
    async fn test_trade_takes_configured_hst_rate() {
        let app = test_app_with(Config {
            hst_rate: dec!(0.05),
            ..Config::default()
        });

        // No commission object at all
        let (status, bare) = call(
            &app,
            "POST",
            "/api/trades",
            Some(json!({ "key_info": { "address": "9 Bay St" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", bare);
        assert_eq!(bare["data"]["commission"]["hst_rate"], "0.05");

        // Commission without a rate
        let (_, partial) = call(
            &app,
            "POST",
            "/api/trades",
            Some(json!({
                "key_info": { "address": "10 Bay St" },
                "commission": { "total_commission": "1000" }
            })),
        )
        .await;
        assert_eq!(partial["data"]["commission"]["hst_rate"], "0.05");

        // An explicit rate wins
        let (_, explicit) = call(
            &app,
            "POST",
            "/api/trades",
            Some(json!({
                "key_info": { "address": "11 Bay St" },
                "commission": { "total_commission": "1000", "hst_rate": "0.13" }
            })),
        )
        .await;
        assert_eq!(explicit["data"]["commission"]["hst_rate"], "0.13");
    }

    #[tokio::test]
    async fn test_trade_with_unnamed_outside_broker_is_400() {
        let app = test_app();
        let (status, body) = call(
            &app,
            "POST",
            "/api/trades",
            Some(json!({
                "key_info": { "address": "1 King St W" },
                "commission": { "total_commission": "20000" },
                "outside_brokers": [{ "name": "", "commission": "5000" }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation");
    }

    #[tokio::test]
    async fn test_finalize_then_conflict() {
        let app = test_app();
        let (trade_id, _) = create_trade(&app, "30000").await;

        let (status, outcome) = call(
            &app,
            "POST",
            "/api/trades/finalize",
            Some(json!({ "trade_id": trade_id, "actor": "broker" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", outcome);
        assert_eq!(outcome["data"]["efts"][0]["number"], 1000);

        let (status, body) = call(
            &app,
            "POST",
            "/api/trades/finalize",
            Some(json!({ "trade_id": trade_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "already_finalized");

        let uri = format!("/api/trades/{}/efts", trade_id);
        let (status, efts) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(efts["data"].as_array().unwrap().len(), 4);
        assert_eq!(efts["data"][0]["number"], 1000);

        // Frozen after finalization
        let uri = format!("/api/trades/{}", trade_id);
        let (_, trade) = call(&app, "GET", &uri, None).await;
        let (status, _) = call(&app, "PUT", &uri, Some(trade["data"].clone())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let uri = format!("/api/ledger?trade_id={}", trade_id);
        let (_, rows) = call(&app, "GET", &uri, None).await;
        assert!(!rows["data"].as_array().unwrap().is_empty());

        let (_, tb) = call(&app, "GET", "/api/ledger/trial-balance", None).await;
        assert!(!tb["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_ledger_batch() {
        let app = test_app();

        let (status, _) = call(
            &app,
            "POST",
            "/api/ledger",
            Some(json!({
                "date": "2026-03-31",
                "lines": [
                    { "account": "50000", "debit": "4.50" },
                    { "account": "10300", "credit": "4.00" }
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let body = json!({
            "source_key": "bank-fee-2026-03",
            "date": "2026-03-31",
            "lines": [
                { "account": "50000", "debit": "4.50", "description": "bank fee" },
                { "account": "10300", "credit": "4.50", "description": "bank fee" }
            ]
        });
        let (status, result) = call(&app, "POST", "/api/ledger", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(result["data"]["entry_number"], 1);

        let (status, replay) = call(&app, "POST", "/api/ledger", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replay["data"]["duplicate"], true);

        let (_, rows) = call(&app, "GET", "/api/ledger?account=10300", None).await;
        assert_eq!(rows["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_eft_issue_and_validation() {
        let app = test_app();

        let (status, issued) = call(
            &app,
            "POST",
            "/api/eft/general_account",
            Some(json!({ "payee": "Landlord", "amount": "1500", "date": "2026-04-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(issued["data"]["number"], 3000);

        let (status, _) = call(
            &app,
            "POST",
            "/api/eft/general_account",
            Some(json!({ "payee": "", "amount": "1500", "date": "2026-04-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, listed) = call(&app, "GET", "/api/eft/general_account", None).await;
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);

        let (status, _) = call(&app, "GET", "/api/eft/petty-cash", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reconciliation_flow() {
        let app = test_app();

        call(
            &app,
            "POST",
            "/api/ledger",
            Some(json!({
                "date": "2026-03-10",
                "lines": [
                    { "account": "10100", "debit": "5000" },
                    { "account": "21000", "credit": "5000" }
                ]
            })),
        )
        .await;
        let (_, rows) = call(&app, "GET", "/api/ledger?account=10100", None).await;
        let entry_id = rows["data"][0]["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            "PUT",
            "/api/reconciliation/10100/2026-03",
            Some(json!({ "statement_opening": "0", "statement_closing": "5000" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, report) = call(&app, "GET", "/api/reconciliation/10100/2026-03/report", None).await;
        assert_eq!(report["data"]["outstanding"].as_array().unwrap().len(), 1);

        let (status, settings) = call(
            &app,
            "POST",
            "/api/reconciliation/10100/2026-03/clear",
            Some(json!({ "entry_id": entry_id, "cleared": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(settings["data"]["cleared_entry_ids"][0], entry_id.as_str());

        let (_, report) = call(&app, "GET", "/api/reconciliation/10100/2026-03/report", None).await;
        assert!(report["data"]["result"]["Balanced"].is_object());

        let (status, _) = call(&app, "GET", "/api/reconciliation/40000/2026-03", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reconciliation_save_checks_cleared_ids() {
        let app = test_app();

        call(
            &app,
            "POST",
            "/api/ledger",
            Some(json!({
                "date": "2026-03-10",
                "lines": [
                    { "account": "10100", "debit": "5000" },
                    { "account": "40000", "credit": "5000" }
                ]
            })),
        )
        .await;
        let (_, bank) = call(&app, "GET", "/api/ledger?account=10100", None).await;
        let bank_id = bank["data"][0]["id"].as_str().unwrap().to_string();
        let (_, income) = call(&app, "GET", "/api/ledger?account=40000", None).await;
        let income_id = income["data"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "PUT",
            "/api/reconciliation/10100/2026-03",
            Some(json!({
                "statement_opening": "0",
                "statement_closing": "5000",
                "cleared_entry_ids": [bank_id, income_id]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        let (_, rows) = call(&app, "GET", "/api/ledger?account=10100", None).await;
        assert_eq!(rows["data"][0]["cleared"], false);

        let (status, _) = call(
            &app,
            "PUT",
            "/api/reconciliation/10100/2026-03",
            Some(json!({
                "statement_opening": "0",
                "statement_closing": "5000",
                "cleared_entry_ids": [bank_id]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, rows) = call(&app, "GET", "/api/ledger?account=10100", None).await;
        assert_eq!(rows["data"][0]["cleared"], true);

        let (status, _) = call(&app, "GET", "/api/reconciliation/10100/2026-3", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
