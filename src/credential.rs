use color_eyre::eyre::{eyre, Result};

use crate::error::Error;

/// Wraps an identity token and attaches it to outgoing requests as an
/// `Authorization: Bearer` header. Pure wrapping, no network interaction.
pub struct BearerCredential {
    token: String,
}

impl BearerCredential {
    pub fn new(token: String) -> Result<Self> {
        if token.is_empty() {
            return Err(eyre!("Cannot build a bearer credential from an empty token"));
        }

        Ok(Self { token })
    }

    pub fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    /// Issues one authorized GET. Transport failures are fatal; a rejection
    /// status from the server is not, and is left to the caller to interpret.
    pub async fn get(
        &self,
        client: &reqwest::Client,
        url: url::Url,
    ) -> Result<reqwest::Response, Error> {
        self.authorize(client.get(url))
            .send()
            .await
            .map_err(Error::Network)
    }
}
