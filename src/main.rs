use std::{io::IsTerminal, process::ExitCode};

use clap::Parser;
use color_eyre::eyre::Result;
use error::Error;

use crate::fetch_context::FetchContext;

mod claims;
mod cli;
mod credential;
mod error;
mod fetch;
mod fetch_context;
mod iam_credentials;
mod metadata;

pub(crate) fn build_http_client() -> reqwest::ClientBuilder {
    reqwest::Client::builder().user_agent("idtoken-fetch")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::config::HookBuilder::default()
        .issue_url(concat!(env!("CARGO_PKG_REPOSITORY"), "/issues/new"))
        .add_issue_metadata("version", env!("CARGO_PKG_VERSION"))
        .add_issue_metadata("os", std::env::consts::OS)
        .add_issue_metadata("arch", std::env::consts::ARCH)
        .theme(if !std::io::stderr().is_terminal() {
            color_eyre::config::Theme::new()
        } else {
            color_eyre::config::Theme::dark()
        })
        .issue_filter(|kind| match kind {
            color_eyre::ErrorKind::NonRecoverable(_) => true,
            color_eyre::ErrorKind::Recoverable(error) => {
                if let Some(known_error) = error.downcast_ref::<Error>() {
                    known_error.should_suggest_issue()
                } else {
                    true
                }
            }
        })
        .install()?;

    execute().await
}

async fn execute() -> Result<ExitCode> {
    let mut cli = cli::IdTokenFetchCli::parse();
    cli.instrumentation.setup()?;

    let ctx = FetchContext::from_cli_and_env(&mut cli).await?;

    let outcome = fetch::fetch_and_print(&ctx).await?;
    tracing::debug!(
        status = %outcome.status,
        token_bytes = outcome.token.len(),
        body_bytes = outcome.body.len(),
        "Authorized fetch complete"
    );

    Ok(ExitCode::SUCCESS)
}
