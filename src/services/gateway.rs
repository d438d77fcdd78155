use crate::config::PaymentGatewayConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha512;
use std::collections::BTreeMap;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

type HmacSha512 = Hmac<Sha512>;

/// Verified-callback result code signalling a captured payment.
pub const RESULT_CAPTURED: i32 = 1;
/// Verified-callback result code for a declined charge.
pub const RESULT_DECLINED: i32 = 0;
/// Callback whose signature did not verify.
pub const RESULT_INVALID_SIGNATURE: i32 = -1;

/// Callback parameter carrying the order correlation id.
pub const PARAM_ORDER_REF: &str = "order_ref";
/// Callback parameter carrying the gateway's response code ("00" = approved).
pub const PARAM_RESPONSE_CODE: &str = "response_code";
const PARAM_SIGNATURE: &str = "signature";

/// Request-scoped context forwarded to the gateway when opening a session.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub client_ip: String,
}

/// Payment gateway collaborator: open a hosted-checkout session for an
/// order, and verify the signed callback the gateway redirects back with.
/// `verify_callback` returns 1 on a captured payment; any other code means
/// the charge did not complete.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(
        &self,
        amount: Decimal,
        order_id: Uuid,
        ctx: &SessionContext,
    ) -> Result<String, ServiceError>;

    async fn verify_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<i32, ServiceError>;
}

/// Hosted-checkout gateway integration. Sessions are redirect URLs whose
/// query string is signed with HMAC-SHA512 over the sorted parameters;
/// callbacks carry the same signature scheme and are re-verified before the
/// response code is trusted.
pub struct HostedCheckoutGateway {
    config: PaymentGatewayConfig,
}

impl HostedCheckoutGateway {
    pub fn new(config: PaymentGatewayConfig) -> Self {
        Self { config }
    }

    fn sign(&self, params: &BTreeMap<String, String>) -> Result<String, ServiceError> {
        let canonical = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let mut mac = HmacSha512::new_from_slice(self.config.secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("invalid gateway secret: {}", e)))?;
        mac.update(canonical.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for HostedCheckoutGateway {
    async fn create_session(
        &self,
        amount: Decimal,
        order_id: Uuid,
        ctx: &SessionContext,
    ) -> Result<String, ServiceError> {
        let mut params = BTreeMap::new();
        params.insert("terminal_id".to_string(), self.config.terminal_id.clone());
        params.insert("amount".to_string(), amount.to_string());
        params.insert(PARAM_ORDER_REF.to_string(), order_id.to_string());
        params.insert("return_url".to_string(), self.config.return_url.clone());
        params.insert(
            "created_at".to_string(),
            chrono::Utc::now().format("%Y%m%d%H%M%S").to_string(),
        );
        if !ctx.client_ip.is_empty() {
            params.insert("client_ip".to_string(), ctx.client_ip.clone());
        }

        let signature = self.sign(&params)?;
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!(
            "{}?{}&{}={}",
            self.config.endpoint, query, PARAM_SIGNATURE, signature
        );

        info!(%order_id, %amount, "payment session created");
        Ok(url)
    }

    async fn verify_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<i32, ServiceError> {
        let provided = match params.get(PARAM_SIGNATURE) {
            Some(sig) => sig.clone(),
            None => {
                warn!("payment callback missing signature");
                return Ok(RESULT_INVALID_SIGNATURE);
            }
        };

        let signed: BTreeMap<String, String> = params
            .iter()
            .filter(|(k, _)| k.as_str() != PARAM_SIGNATURE)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let expected = self.sign(&signed)?;

        if !provided.eq_ignore_ascii_case(&expected) {
            warn!("payment callback signature mismatch");
            return Ok(RESULT_INVALID_SIGNATURE);
        }

        let approved = params
            .get(PARAM_RESPONSE_CODE)
            .map(|code| code == "00")
            .unwrap_or(false);
        Ok(if approved {
            RESULT_CAPTURED
        } else {
            RESULT_DECLINED
        })
    }
}
