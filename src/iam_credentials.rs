use color_eyre::eyre::{eyre, Context, Result};
use http::StatusCode;
use reqwest::header::HeaderMap;

use crate::error::Error;
use crate::fetch::response_text;

/// Client for the IAM Credentials `generateIdToken` endpoint, authenticated
/// with the caller's own short-lived access token.
pub struct IamCredentialsClient {
    host: url::Url,
    source_token: String,
    client: reqwest::Client,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateIdTokenRequest<'a> {
    audience: &'a str,
    include_email: bool,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct IdToken {
    pub(crate) token: String,
}

// TODO(future): static init
pub fn iam_headers() -> HeaderMap {
    let mut header_map = HeaderMap::new();

    header_map.insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    header_map
}

impl IamCredentialsClient {
    pub fn new(host: url::Url, source_token: String) -> Result<Self> {
        let builder = crate::build_http_client();

        let client = builder.build()?;

        let client = Self {
            client,
            source_token,
            host,
        };

        Ok(client)
    }

    /// Mints an identity token for `principal` with an `aud` claim equal to
    /// `audience`. The expiry is set by the issuing service.
    pub async fn generate_id_token(
        &self,
        principal: &str,
        audience: &str,
        include_email: bool,
    ) -> Result<IdToken> {
        if principal
            .strip_prefix("projects/-/serviceAccounts/")
            .filter(|email| !email.is_empty())
            .is_none()
        {
            // Reject locally; the service would answer 404 for this anyway.
            return Err(Error::NotFound(format!(
                "`{principal}` is not a `projects/-/serviceAccounts/{{email}}` resource name"
            )))?;
        }

        let relative_url = format!("v1/{principal}:generateIdToken");
        let token_post_url = self.host.join(&relative_url)?;

        tracing::debug!(
            url = %token_post_url,
            "Computed generateIdToken POST URL"
        );

        let response = self
            .client
            .post(token_post_url)
            .bearer_auth(&self.source_token)
            .headers(iam_headers())
            .json(&GenerateIdTokenRequest {
                audience,
                include_email,
            })
            .send()
            .await
            .wrap_err("Requesting ID token")?;

        let response_status = response.status();
        tracing::trace!(
            status = tracing::field::display(response_status),
            "Got generateIdToken POST response"
        );

        match response_status {
            StatusCode::OK => {
                let id_token: IdToken = response
                    .json()
                    .await
                    .map_err(|_| eyre!("Decoding generateIdToken response"))?;

                if id_token.token.is_empty() {
                    return Err(eyre!("Identity service returned an empty token"));
                }

                Ok(id_token)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(Error::Authentication(response_text(response).await))?
            }
            StatusCode::NOT_FOUND => Err(Error::NotFound(response_text(response).await))?,
            _ => Err(eyre!(
                "\
                Status {} from generateIdToken POST\n\
                {}\
                ",
                response_status,
                response_text(response).await,
            )),
        }
    }
}
