//! # REST + JSON-RPC API
//!
//! Builds the axum router that exposes the hosted vault. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                          |
//! |--------|------------------------|--------------------------------------|
//! | GET    | `/health`              | Liveness check                       |
//! | GET    | `/vault`               | Vault summary: totals, rate, fee     |
//! | GET    | `/accounts/:address`   | Shares, asset balance and limits     |
//! | POST   | `/rpc`                 | JSON-RPC 2.0 gateway                 |
//!
//! ## Callers
//!
//! Mutating RPC methods take the acting address in a `from` parameter.
//! The node trusts it as given; there is no signature check.
//!
//! ## Error Codes
//!
//! Vault errors map to one code per category so clients can branch on the
//! kind of failure without parsing messages:
//!
//! | Code   | Category          |
//! |--------|-------------------|
//! | -32010 | input validation  |
//! | -32020 | authorization     |
//! | -32030 | policy veto       |
//! | -32040 | liquidity         |
//! | -32050 | temporal          |
//! | -32060 | collaborator      |

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use aloc_contracts::line_of_credit::ErrorCategory;
use aloc_contracts::protocol_config::ProtocolConfigError;
use aloc_contracts::{VaultError, VaultStatus};
use aloc_protocol::{Address, AssetToken, Assets, BasisPoints, Shares, Timestamp};

use crate::service::{ServiceError, VaultService};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    pub service: Arc<VaultService>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/vault", get(vault_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/rpc", post(rpc_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    pub method: String,
    /// Named parameters.
    pub params: Option<Value>,
    /// Request identifier. Echoed back in the response.
    pub id: Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self {
            code: -32602,
            message: format!("Invalid params: {}", detail),
            data: None,
        }
    }

    fn internal(detail: impl std::fmt::Display) -> Self {
        Self {
            code: -32603,
            message: format!("Internal error: {}", detail),
            data: None,
        }
    }
}

fn category_code(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::InputValidation => -32010,
        ErrorCategory::Authorization => -32020,
        ErrorCategory::PolicyVeto => -32030,
        ErrorCategory::Liquidity => -32040,
        ErrorCategory::Temporal => -32050,
        ErrorCategory::Collaborator => -32060,
    }
}

impl From<VaultError> for JsonRpcError {
    fn from(err: VaultError) -> Self {
        let category = err.category();
        Self {
            code: category_code(category),
            message: err.to_string(),
            data: Some(serde_json::json!({ "category": category.as_str() })),
        }
    }
}

impl From<ServiceError> for JsonRpcError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Vault(e) => e.into(),
            ServiceError::Protocol(e) => {
                let category = match &e {
                    ProtocolConfigError::Unauthorized(_) => ErrorCategory::Authorization,
                    _ => ErrorCategory::InputValidation,
                };
                Self {
                    code: category_code(category),
                    message: e.to_string(),
                    data: Some(serde_json::json!({ "category": category.as_str() })),
                }
            }
            other => JsonRpcError::internal(other),
        }
    }
}

// ---------------------------------------------------------------------------
// RPC Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DepositParams {
    from: Address,
    assets: Assets,
    /// Defaults to `from`.
    receiver: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct MintParams {
    from: Address,
    shares: Shares,
    receiver: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct WithdrawParams {
    from: Address,
    assets: Assets,
    receiver: Option<Address>,
    owner: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct RedeemParams {
    from: Address,
    shares: Shares,
    receiver: Option<Address>,
    owner: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct AmountParams {
    from: Address,
    amount: Assets,
}

#[derive(Debug, Deserialize)]
struct FromParams {
    from: Address,
}

/// Asset approval. The spender defaults to the vault.
#[derive(Debug, Deserialize)]
struct ApproveParams {
    from: Address,
    spender: Option<Address>,
    amount: Assets,
}

#[derive(Debug, Deserialize)]
struct ApproveSharesParams {
    from: Address,
    spender: Address,
    shares: Shares,
}

#[derive(Debug, Deserialize)]
struct TransferParams {
    from: Address,
    to: Address,
    shares: Shares,
    /// Share owner when moving on someone else's behalf.
    owner: Option<Address>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetMaxSizeParams {
    from: Address,
    max_size: Assets,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetFeeRateParams {
    from: Address,
    fee_rate: BasisPoints,
}

#[derive(Debug, Deserialize)]
struct AssetsParams {
    assets: Assets,
}

#[derive(Debug, Deserialize)]
struct SharesParams {
    shares: Shares,
}

fn parse<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(JsonRpcError::invalid_params)
}

fn to_value<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(JsonRpcError::internal)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /vault`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultResponse {
    pub version: String,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub asset: String,
    pub decimals: u8,
    pub borrower: String,
    pub status: VaultStatus,
    pub end_time: Timestamp,
    pub max_size: Assets,
    pub total_assets: Assets,
    pub total_debt: Assets,
    pub liquid_assets: Assets,
    pub total_supply: Shares,
    pub utilization: BasisPoints,
    /// `None` while no rate policy is installed.
    pub interest_rate: Option<BasisPoints>,
    pub unpaid_fee: Assets,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub address: String,
    pub shares: Shares,
    /// Asset token balance held outside the vault.
    pub asset_balance: Assets,
    /// Current value of the shares.
    pub share_value: Assets,
    pub max_deposit: Assets,
    pub max_mint: Shares,
    pub max_withdraw: Assets,
    pub max_redeem: Shares,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// `GET /vault`: the vault summary with accrual projected to now.
async fn vault_handler(State(state): State<AppState>) -> impl IntoResponse {
    let asset = state.service.token().symbol();
    let summary = state.service.read(|vault| -> Result<VaultResponse, VaultError> {
        Ok(VaultResponse {
            version: state.version.clone(),
            address: vault.address().to_string(),
            name: vault.name().to_string(),
            symbol: vault.symbol().to_string(),
            asset,
            decimals: vault.decimals(),
            borrower: vault.borrower().to_string(),
            status: vault.status()?,
            end_time: vault.end_time(),
            max_size: vault.max_size(),
            total_assets: vault.total_assets()?,
            total_debt: vault.total_debt()?,
            liquid_assets: vault.liquid_assets()?,
            total_supply: vault.total_supply(),
            utilization: vault.utilization()?,
            interest_rate: vault.interest_rate().ok(),
            unpaid_fee: vault.get_fee()?,
        })
    });
    match summary {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// `GET /accounts/:address`: a holder's position and current limits.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let address = match Address::new(address) {
        Ok(a) => a,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    let asset_balance = state.service.token().balance_of(&address);
    let account = state.service.read(|vault| -> Result<AccountResponse, VaultError> {
        let shares = vault.balance_of(&address);
        Ok(AccountResponse {
            address: address.to_string(),
            shares,
            asset_balance,
            share_value: vault.convert_to_assets(shares)?,
            max_deposit: vault.max_deposit(&address)?,
            max_mint: vault.max_mint(&address)?,
            max_withdraw: vault.max_withdraw(&address)?,
            max_redeem: vault.max_redeem(&address)?,
        })
    });
    match account {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// `POST /rpc`: JSON-RPC 2.0 gateway.
///
/// Unknown methods return error code -32601 (Method not found).
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code: -32600,
                message: "Invalid Request: jsonrpc must be \"2.0\"".into(),
                data: None,
            }),
            id: req.id,
        });
    }

    let (result, error) = match dispatch(&state.service, &req.method, req.params) {
        Ok(value) => (Some(value), None),
        Err(e) => (None, Some(e)),
    };
    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

fn dispatch(service: &VaultService, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
    match method {
        // -- Lenders ----------------------------------------------------------
        "aloc_deposit" => {
            let p: DepositParams = parse(params)?;
            let receiver = p.receiver.unwrap_or_else(|| p.from.clone());
            let shares = service.execute("deposit", |v| v.deposit(&p.from, p.assets, &receiver))?;
            to_value(serde_json::json!({ "shares": shares }))
        }
        "aloc_mint" => {
            let p: MintParams = parse(params)?;
            let receiver = p.receiver.unwrap_or_else(|| p.from.clone());
            let assets = service.execute("mint", |v| v.mint(&p.from, p.shares, &receiver))?;
            to_value(serde_json::json!({ "assets": assets }))
        }
        "aloc_withdraw" => {
            let p: WithdrawParams = parse(params)?;
            let receiver = p.receiver.unwrap_or_else(|| p.from.clone());
            let owner = p.owner.unwrap_or_else(|| p.from.clone());
            let shares =
                service.execute("withdraw", |v| v.withdraw(&p.from, p.assets, &receiver, &owner))?;
            to_value(serde_json::json!({ "shares": shares }))
        }
        "aloc_redeem" => {
            let p: RedeemParams = parse(params)?;
            let receiver = p.receiver.unwrap_or_else(|| p.from.clone());
            let owner = p.owner.unwrap_or_else(|| p.from.clone());
            let assets =
                service.execute("redeem", |v| v.redeem(&p.from, p.shares, &receiver, &owner))?;
            to_value(serde_json::json!({ "assets": assets }))
        }

        // -- Borrower ---------------------------------------------------------
        "aloc_borrow" => {
            let p: AmountParams = parse(params)?;
            service.execute("borrow", |v| v.borrow(&p.from, p.amount))?;
            Ok(Value::Bool(true))
        }
        "aloc_repay" => {
            let p: AmountParams = parse(params)?;
            service.execute("repay", |v| v.repay(&p.from, p.amount))?;
            Ok(Value::Bool(true))
        }
        "aloc_repayInFull" => {
            let p: FromParams = parse(params)?;
            let repaid = service.execute("repay_in_full", |v| v.repay_in_full(&p.from))?;
            to_value(serde_json::json!({ "repaid": repaid }))
        }
        "aloc_updateAndPayFee" => {
            let paid = service.execute("update_and_pay_fee", |v| v.update_and_pay_fee())?;
            to_value(serde_json::json!({ "paid": paid }))
        }

        // -- Tokens and shares ------------------------------------------------
        "aloc_approve" => {
            let p: ApproveParams = parse(params)?;
            service.approve_asset(&p.from, p.spender.as_ref(), p.amount)?;
            Ok(Value::Bool(true))
        }
        "aloc_approveShares" => {
            let p: ApproveSharesParams = parse(params)?;
            service.execute("approve_shares", |v| {
                v.approve(&p.from, &p.spender, p.shares);
                Ok(())
            })?;
            Ok(Value::Bool(true))
        }
        "aloc_transfer" => {
            let p: TransferParams = parse(params)?;
            match p.owner {
                Some(owner) => service.execute("transfer_from", |v| {
                    v.transfer_from(&p.from, &owner, &p.to, p.shares)
                })?,
                None => service.execute("transfer", |v| v.transfer(&p.from, &p.to, p.shares))?,
            }
            Ok(Value::Bool(true))
        }

        // -- Administration ---------------------------------------------------
        "aloc_setMaxSize" => {
            let p: SetMaxSizeParams = parse(params)?;
            service.execute("set_max_size", |v| v.set_max_size(&p.from, p.max_size))?;
            Ok(Value::Bool(true))
        }
        "aloc_setProtocolFeeRate" => {
            let p: SetFeeRateParams = parse(params)?;
            service.set_protocol_fee_rate(&p.from, p.fee_rate)?;
            Ok(Value::Bool(true))
        }

        // -- Quotes -----------------------------------------------------------
        "aloc_previewDeposit" => {
            let p: AssetsParams = parse(params)?;
            to_value(service.read(|v| v.preview_deposit(p.assets))?)
        }
        "aloc_previewMint" => {
            let p: SharesParams = parse(params)?;
            to_value(service.read(|v| v.preview_mint(p.shares))?)
        }
        "aloc_previewWithdraw" => {
            let p: AssetsParams = parse(params)?;
            to_value(service.read(|v| v.preview_withdraw(p.assets))?)
        }
        "aloc_previewRedeem" => {
            let p: SharesParams = parse(params)?;
            to_value(service.read(|v| v.preview_redeem(p.shares))?)
        }
        "aloc_convertToShares" => {
            let p: AssetsParams = parse(params)?;
            to_value(service.read(|v| v.convert_to_shares(p.assets))?)
        }
        "aloc_convertToAssets" => {
            let p: SharesParams = parse(params)?;
            to_value(service.read(|v| v.convert_to_assets(p.shares))?)
        }

        _ => Err(JsonRpcError {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
