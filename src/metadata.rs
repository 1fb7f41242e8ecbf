use color_eyre::eyre::{eyre, Context, Result};
use http::StatusCode;

use crate::build_http_client;

pub(crate) const DEFAULT_METADATA_HOST: &str = "http://metadata.google.internal";

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Fetches the caller's own access token from the metadata server. Used when
/// no token was supplied via flag or environment.
#[tracing::instrument(skip_all, fields(host = %host))]
pub(crate) async fn get_default_access_token(host: &str) -> Result<String> {
    let token_url = url::Url::parse(host)
        .wrap_err("Parsing metadata server host")?
        .join(TOKEN_PATH)?;

    let client = build_http_client().build()?;
    let response = client
        .get(token_url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .wrap_err("Getting access token from the metadata server")?;

    let response_status = response.status();
    if response_status != StatusCode::OK {
        return Err(eyre!(
            "Status {response_status} from metadata server token GET; pass `--access-token` or set `GOOGLE_OAUTH_ACCESS_TOKEN` when running outside a cloud instance"
        ));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .wrap_err("Decoding metadata server token response")?;

    if token_response.access_token.is_empty() {
        return Err(eyre!("Metadata server returned an empty access token"));
    }

    Ok(token_response.access_token)
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn fetches_token_with_metadata_flavor_header() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/computeMetadata/v1/instance/service-accounts/default/token")
                .header("metadata-flavor", "Google");
            then.status(200).json_body(json!({
                "access_token": "ya29.source-token",
                "expires_in": 3599,
                "token_type": "Bearer",
            }));
        });

        let token = get_default_access_token(&server.base_url()).await.unwrap();

        mock.assert();
        assert_eq!(token, "ya29.source-token");
    }

    #[tokio::test]
    async fn non_ok_status_is_an_error() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(GET);
            then.status(404).body("not found");
        });

        assert!(get_default_access_token(&server.base_url()).await.is_err());
    }
}
