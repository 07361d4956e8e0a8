use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use crate::payment::{ChargeRequest, ChargeResponse, GatewayError, PaymentGateway, StatusResponse};

/// Midtrans Core API (v2) client
#[derive(Debug, Clone)]
pub struct MidtransGateway {
    client: Client,
    base_url: String,
    server_key: String,
}

impl MidtransGateway {
    pub fn new(base_url: &str, server_key: &str) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            server_key: server_key.to_string(),
        })
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.server_key.is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        Ok(())
    }

    /// Midtrans answers HTTP 200 even for failures; the body's status_code decides
    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let body: serde_json::Value = response.json().await?;
        let status_code = body
            .get("status_code")
            .and_then(|v| v.as_str())
            .unwrap_or("500")
            .to_string();

        if !status_code.starts_with('2') {
            let message = body
                .get("status_message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            return Err(GatewayError::Rejected { status_code, message });
        }

        serde_json::from_value(body).map_err(|e| GatewayError::Rejected {
            status_code,
            message: format!("unexpected response body: {}", e),
        })
    }
}

/// JSON body of a GoPay charge
pub fn charge_body(request: &ChargeRequest) -> serde_json::Value {
    let mut gopay = json!({ "enable_callback": request.callback_url.is_some() });
    if let Some(url) = &request.callback_url {
        gopay["callback_url"] = json!(url);
    }

    json!({
        "payment_type": "gopay",
        "transaction_details": {
            "order_id": request.order_id,
            "gross_amount": request.gross_amount,
        },
        "gopay": gopay,
    })
}

#[async_trait]
impl PaymentGateway for MidtransGateway {
    async fn charge_gopay(&self, request: &ChargeRequest) -> Result<ChargeResponse, GatewayError> {
        self.ensure_configured()?;
        info!("Creating GoPay charge {} for {}", request.order_id, request.gross_amount);

        let response = self
            .client
            .post(format!("{}/v2/charge", self.base_url))
            .basic_auth(&self.server_key, Some(""))
            .json(&charge_body(request))
            .send()
            .await?;

        let charge: ChargeResponse = Self::read(response).await?;
        debug!("Charge {} created: {:?}", request.order_id, charge.transaction_status);
        Ok(charge)
    }

    async fn transaction_status(&self, order_id: &str) -> Result<StatusResponse, GatewayError> {
        self.ensure_configured()?;

        let response = self
            .client
            .get(format!("{}/v2/{}/status", self.base_url, order_id))
            .basic_auth(&self.server_key, Some(""))
            .send()
            .await?;

        let status: StatusResponse = Self::read(response).await?;
        debug!("Order {} is {}", order_id, status.transaction_status);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test the charge body shape
    #[test]
    fn test_charge_body() {
        let body = charge_body(&ChargeRequest {
            order_id: "order-1-1700000000-abcd1234".to_string(),
            gross_amount: 50_000,
            callback_url: Some("https://desk.example/webhook/payment".to_string()),
        });

        assert_eq!(body["payment_type"], "gopay");
        assert_eq!(body["transaction_details"]["gross_amount"], 50_000);
        assert_eq!(body["gopay"]["enable_callback"], true);
        assert_eq!(body["gopay"]["callback_url"], "https://desk.example/webhook/payment");
    }

    #[test]
    fn test_charge_body_without_callback() {
        let body = charge_body(&ChargeRequest {
            order_id: "order-1".to_string(),
            gross_amount: 1,
            callback_url: None,
        });
        assert_eq!(body["gopay"]["enable_callback"], false);
        assert!(body["gopay"].get("callback_url").is_none());
    }

    // Test an unconfigured gateway refuses to call out
    #[tokio::test]
    async fn test_unconfigured_gateway() {
        let gateway = MidtransGateway::new("https://api.sandbox.midtrans.com/", "").unwrap();
        assert_eq!(gateway.base_url, "https://api.sandbox.midtrans.com");
        let result = gateway.transaction_status("order-1").await;
        assert!(matches!(result, Err(GatewayError::NotConfigured)));
    }
}
