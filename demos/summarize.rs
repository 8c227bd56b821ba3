use std::io::Read;

use resilient_call::{
    default_summarizer_policy, ResilientCaller, RetryOptions, RetryPolicy, Summarizer,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;

    // RETRY_* overrides replace the summarizer policy, which retries only 500.
    let policy = if std::env::vars().any(|(name, _)| name.starts_with("RETRY_")) {
        RetryPolicy::try_from(RetryOptions::from_env()?)?
    } else {
        default_summarizer_policy()
    };
    let summarizer = Summarizer::from_env()?.with_caller(ResilientCaller::new(policy));

    println!("{}", summarizer.summarize_or_sentinel(&text).await);
    Ok(())
}
