/// Bank Auth service entry point
use bank_auth::{config::LoggingConfig, server, AppContext, BankResult, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> BankResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    init_tracing(&config.logging);

    print_banner();

    // Create application context; an undersized signing key stops here
    let ctx = match AppContext::new(config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!("Startup failed: {}", e);
            return Err(e);
        }
    };

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level)
        .unwrap_or_else(|_| EnvFilter::new("bank_auth=debug,tower_http=debug"));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn print_banner() {
    println!(
        r#"
    ____              __       ___         __  __
   / __ )____ _____  / /__    /   | __  __/ /_/ /_
  / __  / __ `/ __ \/ //_/   / /| |/ / / / __/ __ \
 / /_/ / /_/ / / / / ,<     / ___ / /_/ / /_/ / / /
/_____/\__,_/_/ /_/_/|_|   /_/  |_\__,_/\__/_/ /_/
        Account registration and authentication v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
