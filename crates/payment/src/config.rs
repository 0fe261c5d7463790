//! Payment terms and the declarative payment requirement.

use serde::{Deserialize, Serialize};

/// Payment scheme identifier used by the facilitator protocol.
pub const SCHEME_EXACT: &str = "exact";

/// Payment terms for the generation resource.
///
/// Read once at startup; requirements are re-derived from this per request,
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfig {
    /// Settlement network identifier (e.g. "base").
    pub network: String,
    /// Exact price in the asset's atomic units (USDC has 6 decimals).
    pub price_atomic: String,
    /// Destination address for the payment.
    pub pay_to: String,
    /// Asset contract address.
    pub asset: String,
    /// Human-readable description echoed in payment requirements.
    pub description: String,
    /// How long a signed payment authorization stays acceptable.
    pub max_timeout_seconds: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            network: "base".to_string(),
            price_atomic: "200000".to_string(),
            pay_to: "0x0000000000000000000000000000000000000000".to_string(),
            // USDC on Base.
            asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            description: "Generate royalty-free instrumental music. Returns unique \
                          tracks per request. Styles: lo-fi, ambient, cinematic, \
                          chiptune, synthwave, and more."
                .to_string(),
            max_timeout_seconds: 300,
        }
    }
}

impl PaymentConfig {
    /// Build the configuration from the environment, falling back to dev
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let pay_to = std::env::var("PAY_TO_ADDRESS").unwrap_or_else(|_| {
            tracing::warn!("PAY_TO_ADDRESS not set; using zero-address dev placeholder");
            defaults.pay_to.clone()
        });

        Self {
            network: std::env::var("PAYMENT_NETWORK").unwrap_or(defaults.network),
            price_atomic: std::env::var("PRICE_ATOMIC").unwrap_or(defaults.price_atomic),
            pay_to,
            asset: std::env::var("PAYMENT_ASSET").unwrap_or(defaults.asset),
            description: defaults.description,
            max_timeout_seconds: defaults.max_timeout_seconds,
        }
    }

    /// Derive the payment requirement for a resource URL.
    ///
    /// Pure function of the configuration and the resource; deterministic and
    /// side-effect free, so it can be rebuilt for every 402 response.
    pub fn requirement(&self, resource: &str) -> PaymentRequirement {
        PaymentRequirement {
            scheme: SCHEME_EXACT.to_string(),
            network: self.network.clone(),
            max_amount_required: self.price_atomic.clone(),
            resource: resource.to_string(),
            description: self.description.clone(),
            mime_type: "application/json".to_string(),
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.asset.clone(),
        }
    }

    /// Price formatted for humans, e.g. "0.20 USDC".
    pub fn price_display(&self) -> String {
        match self.price_atomic.parse::<u128>() {
            Ok(atomic) => {
                // USDC-style 6-decimal asset.
                let whole = atomic / 1_000_000;
                let cents = (atomic % 1_000_000) / 10_000;
                format!("{whole}.{cents:02} USDC")
            }
            Err(_) => format!("{} (atomic units)", self.price_atomic),
        }
    }
}

/// What the gate demands for a given resource, in the x402 wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    pub scheme: String,
    pub network: String,
    pub max_amount_required: String,
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub asset: String,
}
