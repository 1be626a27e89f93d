use anyhow::Context;

use ecommerce_users::{config::AppConfig, db, UserService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "ecommerce_users=debug,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let command = std::env::args().nth(1).unwrap_or_else(|| "list".into());

    let config = AppConfig::from_env()?;
    let pool = db::connect(&config).await?;

    if let Err(e) = db::migrate(&pool).await {
        tracing::warn!(error = %e, "schema bootstrap failed; continuing");
    }

    let service = UserService::from_pool(pool);
    let result = run(&service, &command).await;
    service.close().await;
    result
}

async fn run(service: &UserService, command: &str) -> anyhow::Result<()> {
    match command {
        "list" => {
            let users = service.list_all().await.context("list users")?;
            for user in &users {
                println!("{}", serde_json::to_string(user)?);
            }
            tracing::info!(count = users.len(), "listed users");
        }
        "clear-test-data" => {
            let removed = service
                .clear_test_data()
                .await
                .context("clear test data")?;
            tracing::info!(removed, "removed test users");
        }
        other => anyhow::bail!("unknown command `{other}` (expected `list` or `clear-test-data`)"),
    }
    Ok(())
}
