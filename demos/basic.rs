use pay_rest_client::{ClientOptions, Hooks, RequestOptions, RestClient};
use reqwest::header::{HeaderMap, HeaderValue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pay_rest_client=debug,info".into()),
        )
        .init();

    let base_url = std::env::var("CONNECTOR_URL")?;

    let options = ClientOptions::from_env()
        .with_hooks(Hooks::tracing())
        .with_request_headers(|| {
            let mut headers = HeaderMap::new();
            headers.insert("x-request-id", HeaderValue::from_static("demo-request"));
            headers
        });
    let client = RestClient::new("demo").with_configuration(base_url, options)?;

    let response = client
        .get(
            "/healthcheck",
            "check connector health",
            RequestOptions::new().logging_field("caller", "demo"),
        )
        .await?;

    println!("{} {}", response.status(), response.text());
    Ok(())
}
