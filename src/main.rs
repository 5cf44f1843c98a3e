//! billing-sweep - runs one nightly billing sweep and exits.
//!
//! Invoked by an external scheduler once a day. Safe to re-run: a second
//! invocation on the same day charges nothing already handled.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use hearth_billing::adapters::postgres::{
    PostgresAuditLog, PostgresBillingAccountRepository, PostgresBillingLedger,
    PostgresMembershipStore, PostgresReminderOutbox, PostgresReminderStore, PostgresUsageStore,
};
use hearth_billing::adapters::stripe::{StripeConfig, StripePaymentAdapter};
use hearth_billing::application::{BillingContext, NightlySweep};
use hearth_billing::config::{AppConfig, LogFormat};
use hearth_billing::ports::SystemClock;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.runtime.environment,
        live_mode = config.payment.is_live_mode(),
        "Starting billing sweep"
    );

    let pool = config.database.pool_options().connect(&config.database.url).await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    let stripe = StripeConfig::new(config.payment.stripe_api_key.clone())
        .with_base_url(config.payment.api_base_url.clone())
        .with_timeout(config.payment.http_timeout());
    let ctx = BillingContext {
        accounts: Arc::new(PostgresBillingAccountRepository::new(pool.clone())),
        ledger: Arc::new(PostgresBillingLedger::new(pool.clone())),
        memberships: Arc::new(PostgresMembershipStore::new(pool.clone())),
        usage: Arc::new(PostgresUsageStore::new(pool.clone())),
        processor: Arc::new(StripePaymentAdapter::new(stripe)),
        audit: Arc::new(PostgresAuditLog::new(pool.clone())),
        reminder_store: Arc::new(PostgresReminderStore::new(pool.clone())),
        notifier: Arc::new(PostgresReminderOutbox::new(pool.clone())),
        clock: Arc::new(SystemClock),
        settings: Arc::new(config.billing.engine_settings()),
    };

    let summary = NightlySweep::new(ctx).run().await?;
    pool.close().await;

    for (account_id, error) in &summary.errors {
        tracing::warn!(account_id = %account_id, error = %error, "Account needs attention");
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.runtime.log_level));

    match config.runtime.log_format() {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
