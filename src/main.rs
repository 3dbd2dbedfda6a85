use anyhow::Result;
use traced_api::{api::Api, config::Config, telemetry::init_subscribers};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let configuration = Config::build()?;

    let guard = init_subscribers(&configuration.telemetry)?;
    let tracer = guard.request_tracer(configuration.telemetry.flush_timeout());

    let api = Api::build(&configuration, tracer).await?;

    api.run_until_stopped().await?;

    Ok(())
}
