use color_eyre::eyre::{eyre, Result};

use crate::{cli::IdTokenFetchCli, metadata};

/// Everything the workflow needs, resolved once at process start.
pub(crate) struct FetchContext {
    pub(crate) url: url::Url,
    pub(crate) audience: String,
    pub(crate) principal: String,
    pub(crate) include_email: bool,
    pub(crate) iam_host: url::Url,
    pub(crate) source_token: String,
}

impl FetchContext {
    pub(crate) async fn from_cli_and_env(cli: &mut IdTokenFetchCli) -> Result<Self> {
        cli.populate_missing_from_env();

        let service_account = cli.service_account.trim();
        if service_account.is_empty() || !service_account.contains('@') {
            return Err(eyre!(
                "`--service-account` must be a service account email like `oidc-federated@example.iam.gserviceaccount.com`"
            ));
        }
        let principal = format!("projects/-/serviceAccounts/{service_account}");

        let audience = match &cli.audience.0 {
            Some(audience) => audience.clone(),
            None => {
                let audience = cli.url.origin().ascii_serialization();
                tracing::debug!(%audience, "Audience derived from `--url`");
                audience
            }
        };

        let source_token = match &cli.access_token.0 {
            Some(token) => token.clone(),
            None => {
                let metadata_host = cli
                    .metadata_host
                    .0
                    .as_deref()
                    .unwrap_or(metadata::DEFAULT_METADATA_HOST);
                metadata::get_default_access_token(metadata_host).await?
            }
        };

        Ok(Self {
            url: cli.url.clone(),
            audience,
            principal,
            include_email: cli.include_email,
            iam_host: cli.iam_host.clone(),
            source_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::{IdTokenFetchCli, OptionString};

    use super::*;

    fn test_cli() -> IdTokenFetchCli {
        IdTokenFetchCli {
            url: url::Url::parse("https://svc.example.com/dump").unwrap(),
            audience: OptionString(None),
            service_account: "oidc-federated@example.iam.gserviceaccount.com".into(),
            include_email: true,
            iam_host: url::Url::parse("https://iamcredentials.googleapis.com").unwrap(),
            access_token: OptionString(Some("ya29.source-token".into())),
            metadata_host: OptionString(None),
            instrumentation: Default::default(),
        }
    }

    #[tokio::test]
    async fn audience_defaults_to_the_url_origin() {
        let mut cli = test_cli();

        let ctx = FetchContext::from_cli_and_env(&mut cli).await.unwrap();

        assert_eq!(ctx.audience, "https://svc.example.com");
        assert_eq!(
            ctx.principal,
            "projects/-/serviceAccounts/oidc-federated@example.iam.gserviceaccount.com"
        );
        assert_eq!(ctx.source_token, "ya29.source-token");
    }

    #[tokio::test]
    async fn explicit_audience_wins() {
        let mut cli = test_cli();
        cli.audience = OptionString(Some("https://other.example.com".into()));

        let ctx = FetchContext::from_cli_and_env(&mut cli).await.unwrap();

        assert_eq!(ctx.audience, "https://other.example.com");
    }

    #[tokio::test]
    async fn rejects_a_service_account_that_is_not_an_email() {
        for service_account in ["", "   ", "not-an-email"] {
            let mut cli = test_cli();
            cli.service_account = service_account.into();

            assert!(FetchContext::from_cli_and_env(&mut cli).await.is_err());
        }
    }
}
