//! Paystack client
//!
//! One merchant balance backs every chat user, so `user_id` is only used
//! for logging here.

use super::{
    match_bank_name, BankInfo, BankingApi, BankingError, BankingResult, ResolvedAccount,
    TransferReceipt, TransferRequest, TransferStatus,
};
use crate::error::EngineError;
use crate::models::{Balance, DateRange, Kobo, Transaction, TransactionDirection};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

const CURRENCY: &str = "NGN";
const PAGE_SIZE: &str = "100";

/// A dispatch is the money-moving call; anything but a refused connection
/// leaves its outcome unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Read,
    Dispatch,
}

pub struct PaystackClient {
    client: Client,
    base_url: String,
    secret_key: String,
    bank_directory: OnceCell<Vec<BankInfo>>,
}

impl PaystackClient {
    pub fn new(secret_key: &str, base_url: Option<&str>) -> crate::Result<Self> {
        if secret_key.trim().is_empty() {
            return Err(EngineError::ConfigError("Paystack secret key is empty".to_string()));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EngineError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            secret_key: secret_key.trim().to_string(),
            bank_directory: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> BankingResult<Value> {
        let request = self.client.get(self.url(path)).query(query);
        self.send(request, path, CallKind::Read).await
    }

    async fn post_json(&self, path: &str, body: &Value, kind: CallKind) -> BankingResult<Value> {
        let request = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json")
            .json(body);
        self.send(request, path, kind).await
    }

    async fn send(&self, request: RequestBuilder, path: &str, kind: CallKind) -> BankingResult<Value> {
        let response = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| {
                let detail = format!("Paystack request failed for {}: {}", path, e);
                if e.is_connect() || e.is_builder() {
                    BankingError::Unavailable(detail)
                } else {
                    unreachable_or_unknown(kind, detail)
                }
            })?;

        let status = response.status();
        let body = match response.json::<Value>().await {
            Ok(body) => body,
            Err(e) => {
                return Err(unreachable_or_unknown(
                    kind,
                    format!("Invalid JSON response from {} ({}): {}", path, status, e),
                ))
            }
        };

        if status.is_server_error() {
            return Err(unreachable_or_unknown(
                kind,
                format!("Paystack returned {} for {}", status, path),
            ));
        }

        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Request failed")
            .to_string();

        if status == StatusCode::UNAUTHORIZED {
            return Err(BankingError::Unavailable(format!(
                "Paystack rejected the API key: {}",
                message
            )));
        }

        let accepted = body.get("status").and_then(Value::as_bool).unwrap_or(false);
        if !status.is_success() || !accepted {
            warn!(path = %path, status = %status, message = %message, "Paystack request refused");
            return Err(classify_failure(&message));
        }

        debug!(path = %path, status = %status, "Paystack request completed");
        Ok(body)
    }

    async fn bank_directory(&self) -> BankingResult<&Vec<BankInfo>> {
        self.bank_directory
            .get_or_try_init(|| async {
                let body = self
                    .get_json(
                        "/bank",
                        &[("currency", CURRENCY.to_string()), ("perPage", PAGE_SIZE.to_string())],
                    )
                    .await?;
                let banks = parse_bank_directory(&body);
                info!(count = banks.len(), "Loaded Paystack bank directory");
                Ok::<_, BankingError>(banks)
            })
            .await
    }

    async fn create_recipient(&self, request: &TransferRequest) -> BankingResult<String> {
        let body = self
            .post_json(
                "/transferrecipient",
                &json!({
                    "type": "nuban",
                    "name": request.account_name,
                    "account_number": request.account_number,
                    "bank_code": request.bank_code,
                    "currency": CURRENCY,
                }),
                CallKind::Read,
            )
            .await?;

        body.pointer("/data/recipient_code")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BankingError::Rejected("Paystack returned no recipient code".to_string()))
    }
}

fn unreachable_or_unknown(kind: CallKind, detail: String) -> BankingError {
    match kind {
        CallKind::Read => BankingError::Unavailable(detail),
        CallKind::Dispatch => BankingError::Timeout(detail),
    }
}

fn classify_failure(message: &str) -> BankingError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient") || lower.contains("balance is not enough") {
        BankingError::InsufficientFunds
    } else if lower.contains("could not resolve") || lower.contains("invalid account") {
        BankingError::InvalidAccount(message.to_string())
    } else {
        BankingError::Rejected(message.to_string())
    }
}

fn parse_transfer_status(status: &str) -> TransferStatus {
    match status.to_lowercase().as_str() {
        "success" => TransferStatus::Success,
        "failed" | "reversed" | "rejected" | "abandoned" => TransferStatus::Failed,
        // pending, otp, processing, queued, received
        _ => TransferStatus::Pending,
    }
}

fn parse_bank_directory(body: &Value) -> Vec<BankInfo> {
    body.get("data")
        .and_then(Value::as_array)
        .map(|banks| {
            banks
                .iter()
                .filter_map(|bank| {
                    Some(BankInfo {
                        name: bank.get("name")?.as_str()?.to_string(),
                        code: bank.get("code")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_timestamp(item: &Value) -> Option<DateTime<Utc>> {
    ["paid_at", "paidAt", "created_at", "createdAt"]
        .iter()
        .filter_map(|key| item.get(*key).and_then(Value::as_str))
        .find_map(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// `/transaction` items are money in, `/transfer` items are money out.
fn parse_history_items(body: &Value, direction: TransactionDirection) -> Vec<Transaction> {
    let Some(items) = body.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let counterparty = match direction {
                TransactionDirection::Credit => item.pointer("/customer/email"),
                TransactionDirection::Debit => item
                    .pointer("/recipient/name")
                    .or_else(|| item.pointer("/recipient/details/account_name")),
            }
            .and_then(Value::as_str)
            .map(str::to_string);

            Some(Transaction {
                reference: item
                    .get("reference")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                amount: Kobo(item.get("amount")?.as_i64()?),
                direction,
                counterparty,
                status: item
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                occurred_at: parse_timestamp(item)?,
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl BankingApi for PaystackClient {
    async fn get_balance(&self, user_id: &str) -> BankingResult<Balance> {
        debug!(user_id = %user_id, "Fetching balance");
        let body = self.get_json("/balance", &[]).await?;

        let available = body
            .get("data")
            .and_then(Value::as_array)
            .and_then(|balances| {
                balances
                    .iter()
                    .find(|b| b.get("currency").and_then(Value::as_str) == Some(CURRENCY))
            })
            .and_then(|b| b.get("balance"))
            .and_then(Value::as_i64)
            .ok_or_else(|| BankingError::Unavailable("No NGN balance in Paystack response".to_string()))?;

        Ok(Balance {
            available: Kobo(available),
            currency: CURRENCY.to_string(),
        })
    }

    async fn resolve_account(&self, account_number: &str, bank_code: &str) -> BankingResult<ResolvedAccount> {
        let body = self
            .get_json(
                "/bank/resolve",
                &[
                    ("account_number", account_number.to_string()),
                    ("bank_code", bank_code.to_string()),
                ],
            )
            .await
            .map_err(|e| match e {
                BankingError::InvalidAccount(_) | BankingError::Rejected(_) => BankingError::NotFound,
                other => other,
            })?;

        let account_name = body
            .pointer("/data/account_name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .ok_or(BankingError::NotFound)?;

        Ok(ResolvedAccount {
            account_number: account_number.to_string(),
            account_name: account_name.trim().to_string(),
            bank_code: bank_code.to_string(),
        })
    }

    async fn transfer(&self, request: &TransferRequest) -> BankingResult<TransferReceipt> {
        let recipient_code = self.create_recipient(request).await?;

        info!(
            reference = %request.idempotency_key,
            amount = request.amount.value(),
            "Dispatching Paystack transfer"
        );

        let body = self
            .post_json(
                "/transfer",
                &json!({
                    "source": "balance",
                    "amount": request.amount.value(),
                    "recipient": recipient_code,
                    "reason": request.narration,
                    "currency": CURRENCY,
                    "reference": request.idempotency_key,
                }),
                CallKind::Dispatch,
            )
            .await?;

        let status = body
            .pointer("/data/status")
            .and_then(Value::as_str)
            .map(parse_transfer_status)
            .unwrap_or(TransferStatus::Pending);
        let reference = body
            .pointer("/data/reference")
            .and_then(Value::as_str)
            .unwrap_or(&request.idempotency_key)
            .to_string();

        Ok(TransferReceipt {
            reference,
            status,
            message: body.get("message").and_then(Value::as_str).map(str::to_string),
        })
    }

    async fn get_history(&self, user_id: &str, range: DateRange) -> BankingResult<Vec<Transaction>> {
        debug!(user_id = %user_id, from = %range.from, to = %range.to, "Fetching history");

        // `to` is exclusive on Paystack's side
        let query = [
            ("from", range.from.format("%Y-%m-%d").to_string()),
            ("to", (range.to + ChronoDuration::days(1)).format("%Y-%m-%d").to_string()),
            ("perPage", PAGE_SIZE.to_string()),
        ];

        let incoming = self.get_json("/transaction", &query).await?;
        let outgoing = self.get_json("/transfer", &query).await?;

        let mut history = parse_history_items(&incoming, TransactionDirection::Credit);
        history.extend(parse_history_items(&outgoing, TransactionDirection::Debit));
        history.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(history)
    }

    async fn find_bank(&self, name: &str) -> BankingResult<Option<BankInfo>> {
        let directory = self.bank_directory().await?;
        Ok(match_bank_name(directory, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    async fn spawn_mock(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request() -> TransferRequest {
        TransferRequest {
            amount: Kobo::from_naira(5000),
            account_number: "1234567890".into(),
            bank_code: "044".into(),
            account_name: "JOHN DOE".into(),
            idempotency_key: "abc123".into(),
            narration: "chat transfer".into(),
        }
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure("Your balance is not enough to fulfil this request"),
            BankingError::InsufficientFunds
        );
        assert!(matches!(
            classify_failure("Could not resolve account name. Check parameters or try again."),
            BankingError::InvalidAccount(_)
        ));
        assert!(matches!(classify_failure("Transfer limit exceeded"), BankingError::Rejected(_)));
    }

    #[test]
    fn test_transfer_status_mapping() {
        assert_eq!(parse_transfer_status("success"), TransferStatus::Success);
        assert_eq!(parse_transfer_status("otp"), TransferStatus::Pending);
        assert_eq!(parse_transfer_status("reversed"), TransferStatus::Failed);
    }

    #[test]
    fn test_parse_history_items() {
        let body = json!({
            "status": true,
            "data": [
                {"reference": "t1", "amount": 250000, "status": "success",
                 "createdAt": "2024-05-14T10:00:00.000Z", "recipient": {"name": "ADA OBI"}},
                {"reference": "t2", "amount": 100000, "status": "success"}
            ]
        });
        let items = parse_history_items(&body, TransactionDirection::Debit);
        // second item has no timestamp and is skipped
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].counterparty.as_deref(), Some("ADA OBI"));
        assert_eq!(items[0].amount, Kobo(250_000));
    }

    #[test]
    fn test_empty_secret_key_rejected() {
        assert!(PaystackClient::new("  ", None).is_err());
    }

    #[tokio::test]
    async fn test_balance_and_resolve_against_mock() {
        let router = Router::new()
            .route(
                "/balance",
                get(|| async {
                    Json(json!({"status": true, "message": "Balances retrieved",
                                "data": [{"currency": "NGN", "balance": 1250000}]}))
                }),
            )
            .route(
                "/bank/resolve",
                get(|| async {
                    (
                        AxumStatus::UNPROCESSABLE_ENTITY,
                        Json(json!({"status": false, "message": "Could not resolve account name"})),
                    )
                }),
            );
        let base = spawn_mock(router).await;
        let client = PaystackClient::new("sk_test_x", Some(&base)).unwrap();

        let balance = client.get_balance("u1").await.unwrap();
        assert_eq!(balance.available, Kobo(1_250_000));

        let missing = client.resolve_account("0000000000", "044").await;
        assert_eq!(missing, Err(BankingError::NotFound));
    }

    #[tokio::test]
    async fn test_server_error_on_dispatch_is_ambiguous() {
        let router = Router::new()
            .route(
                "/transferrecipient",
                post(|| async {
                    Json(json!({"status": true, "message": "ok", "data": {"recipient_code": "RCP_1"}}))
                }),
            )
            .route(
                "/transfer",
                post(|| async {
                    (
                        AxumStatus::BAD_GATEWAY,
                        Json(json!({"status": false, "message": "upstream"})),
                    )
                }),
            );
        let base = spawn_mock(router).await;
        let client = PaystackClient::new("sk_test_x", Some(&base)).unwrap();

        let result = client.transfer(&request()).await;
        assert!(matches!(result, Err(BankingError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = PaystackClient::new("sk_test_x", Some(&format!("http://{}", addr))).unwrap();
        let result = client.transfer(&request()).await;
        assert!(matches!(result, Err(BankingError::Unavailable(_))));
    }
}
