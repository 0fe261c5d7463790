//! Service wiring: job store, payment gate, operator notifier, configuration.

use std::sync::Arc;

use trackforge_jobs::{InMemoryJobStore, Job, JobStore};
use trackforge_payment::{HttpFacilitator, PaymentConfig, PaymentGate};

/// Fixed average generation time used for wait estimates. Not measured
/// dynamically.
pub const AVERAGE_JOB_DURATION_SECS: u64 = 90;

/// Off-path operator alert for newly paid jobs.
///
/// Dispatch must never block the response path; outcomes are logged and
/// discarded.
pub trait Notifier: Send + Sync {
    fn notify_new_job(&self, job: &Job);
}

/// Telegram-backed operator channel.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    http_client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            http_client: reqwest::Client::new(),
        }
    }
}

impl Notifier for TelegramNotifier {
    fn notify_new_job(&self, job: &Job) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let payer = job
            .payment
            .as_ref()
            .map(|p| p.payer.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let text = format!(
            "New paid order\njob: {}\ntitle: {}\nstyle: {}\npayer: {}",
            job.id, job.title, job.style, payer
        );
        let body = serde_json::json!({ "chat_id": self.chat_id, "text": text });

        let client = self.http_client.clone();
        let job_id = job.id;
        // Detached send; the response path never waits on the operator channel.
        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(res) if res.status().is_success() => {
                    tracing::debug!(%job_id, "operator notification sent");
                }
                Ok(res) => {
                    tracing::warn!(%job_id, status = %res.status(), "operator notification rejected");
                }
                Err(e) => {
                    tracing::warn!(%job_id, error = %e, "operator notification failed");
                }
            }
        });
    }
}

/// Notifier used when no operator channel is configured.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify_new_job(&self, job: &Job) {
        tracing::debug!(job_id = %job.id, "no operator channel configured; skipping notification");
    }
}

/// Shared per-process services, `Extension`-injected into handlers.
pub struct AppServices {
    pub jobs: Arc<dyn JobStore>,
    pub gate: PaymentGate,
    pub notifier: Arc<dyn Notifier>,
    pub worker_secret: String,
    pub public_base_url: String,
}

impl AppServices {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        gate: PaymentGate,
        notifier: Arc<dyn Notifier>,
        worker_secret: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            gate,
            notifier,
            worker_secret: worker_secret.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Wire the production services from the environment.
pub fn build_services() -> AppServices {
    let worker_secret = std::env::var("WORKER_SECRET").unwrap_or_else(|_| {
        tracing::warn!("WORKER_SECRET not set; using insecure dev default");
        "dev-secret-change-me".to_string()
    });

    let public_base_url =
        std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

    let facilitator_url = std::env::var("FACILITATOR_URL")
        .unwrap_or_else(|_| "https://api.cdp.coinbase.com/platform/v2/x402".to_string());
    let facilitator_api_key = std::env::var("FACILITATOR_API_KEY").ok();
    if facilitator_api_key.is_none() {
        tracing::warn!("FACILITATOR_API_KEY not set; facilitator requests will be unauthenticated");
    }

    let gate = PaymentGate::new(
        PaymentConfig::from_env(),
        Arc::new(HttpFacilitator::new(facilitator_url, facilitator_api_key)),
    );

    let notifier: Arc<dyn Notifier> = match (
        std::env::var("TELEGRAM_BOT_TOKEN"),
        std::env::var("TELEGRAM_CHAT_ID"),
    ) {
        (Ok(bot_token), Ok(chat_id)) => Arc::new(TelegramNotifier::new(bot_token, chat_id)),
        _ => {
            tracing::info!("TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID not set; operator notifications disabled");
            Arc::new(NoopNotifier)
        }
    };

    AppServices::new(
        Arc::new(InMemoryJobStore::new()),
        gate,
        notifier,
        worker_secret,
        public_base_url,
    )
}
