use mealpay_payment::{config::Config, Application};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mealpay_core::observability::init_tracing(
        "mealpay-payment",
        "info,mealpay_payment=debug,sqlx=warn",
    );

    let config = Config::from_env().expect("Failed to load configuration");
    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
