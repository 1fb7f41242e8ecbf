use color_eyre::eyre::Result;
use http::StatusCode;
use reqwest::Response;

use crate::{
    build_http_client, claims, credential::BearerCredential, fetch_context::FetchContext,
    iam_credentials::IamCredentialsClient,
};

#[derive(Debug)]
pub(crate) struct FetchOutcome {
    pub(crate) token: String,
    pub(crate) status: StatusCode,
    pub(crate) body: String,
}

/// The whole workflow: mint an ID token for the context's principal, wrap it
/// in a bearer credential, issue one authorized GET, and print the token, the
/// status code, and the body to stdout, in that order.
#[tracing::instrument(
    skip_all,
    fields(
        url = %ctx.url,
        audience = %ctx.audience,
        principal = %ctx.principal,
        include_email = ctx.include_email,
    )
)]
pub(crate) async fn fetch_and_print(ctx: &FetchContext) -> Result<FetchOutcome> {
    let iam_client = IamCredentialsClient::new(ctx.iam_host.clone(), ctx.source_token.clone())?;
    let id_token = iam_client
        .generate_id_token(&ctx.principal, &ctx.audience, ctx.include_email)
        .await?;

    // Printed as soon as it exists, so a failing GET still surfaces it.
    println!("{}", id_token.token);

    match claims::peek_claims(&id_token.token) {
        Ok(claims) => {
            tracing::debug!(
                audience = %claims.aud,
                issuer = %claims.iss,
                expiry = claims.exp,
                email = claims.email.as_deref().unwrap_or("<none>"),
                "Decoded ID token claims"
            );
            if claims.aud != ctx.audience {
                tracing::warn!(
                    "Minted token carries audience `{}` but `{}` was requested; the target service will likely reject it",
                    claims.aud,
                    ctx.audience,
                );
            }
        }
        Err(e) => tracing::debug!("Could not decode ID token claims: {e}"),
    }

    let token = id_token.token.clone();
    let credential = BearerCredential::new(id_token.token)?;

    let client = build_http_client().build()?;
    let response = credential.get(&client, ctx.url.clone()).await?;

    let status = response.status();
    let body = response_text(response).await;

    // A rejection status (401/403 and friends) is the caller's to interpret;
    // status and body pass through verbatim.
    println!("{}", status.as_u16());
    println!("{body}");

    Ok(FetchOutcome {
        token,
        status,
        body,
    })
}

pub(crate) async fn response_text(res: Response) -> String {
    if let Ok(message) = res.text().await {
        message
    } else {
        String::from("no body")
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::{claims::encode_unsigned_jwt, error::Error};

    use super::*;

    const SERVICE_ACCOUNT: &str = "oidc-federated@example.iam.gserviceaccount.com";

    fn test_ctx(iam_server: &MockServer, target_server: &MockServer) -> FetchContext {
        FetchContext {
            url: url::Url::parse(&target_server.url("/dump")).unwrap(),
            audience: "https://svc.example.com".into(),
            principal: format!("projects/-/serviceAccounts/{SERVICE_ACCOUNT}"),
            include_email: true,
            iam_host: url::Url::parse(&iam_server.base_url()).unwrap(),
            source_token: "ya29.source-token".into(),
        }
    }

    fn mint_mock<'a>(server: &'a MockServer, token: &str) -> httpmock::Mock<'a> {
        let token = token.to_string();
        server.mock(move |when, then| {
            when.method(POST)
                .path(format!(
                    "/v1/projects/-/serviceAccounts/{SERVICE_ACCOUNT}:generateIdToken"
                ))
                .header("authorization", "Bearer ya29.source-token")
                .json_body(json!({
                    "audience": "https://svc.example.com",
                    "includeEmail": true,
                }));
            then.status(200).json_body(json!({ "token": token }));
        })
    }

    #[tokio::test]
    async fn mints_then_fetches_with_the_bearer_token() {
        let iam_server = MockServer::start();
        let target_server = MockServer::start();

        let token = encode_unsigned_jwt(&json!({
            "aud": "https://svc.example.com",
            "iss": "https://accounts.google.com",
            "exp": 1_700_003_600,
            "email": SERVICE_ACCOUNT,
        }));
        let mint = mint_mock(&iam_server, &token);
        let bearer = format!("Bearer {token}");
        let target = target_server.mock(|when, then| {
            when.method(GET)
                .path("/dump")
                .header("authorization", bearer.as_str());
            then.status(200).body("dump contents");
        });

        let outcome = fetch_and_print(&test_ctx(&iam_server, &target_server))
            .await
            .unwrap();

        mint.assert();
        target.assert();
        assert!(!outcome.token.is_empty());
        assert_eq!(outcome.token, token);
        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(outcome.body, "dump contents");
    }

    #[tokio::test]
    async fn rejection_status_passes_through_verbatim() {
        let iam_server = MockServer::start();
        let target_server = MockServer::start();

        // Audience mismatch: the target rejects the token, the workflow does not.
        let token = encode_unsigned_jwt(&json!({
            "aud": "https://elsewhere.example.com",
            "iss": "https://accounts.google.com",
            "exp": 1_700_003_600,
        }));
        let _mint = mint_mock(&iam_server, &token);
        let _target = target_server.mock(|when, then| {
            when.method(GET).path("/dump");
            then.status(403).body("audience mismatch");
        });

        let outcome = fetch_and_print(&test_ctx(&iam_server, &target_server))
            .await
            .unwrap();

        assert_eq!(outcome.status, StatusCode::FORBIDDEN);
        assert_eq!(outcome.body, "audience mismatch");
    }

    #[tokio::test]
    async fn failed_mint_sends_nothing_to_the_target() {
        let iam_server = MockServer::start();
        let target_server = MockServer::start();

        let _mint = iam_server.mock(|when, then| {
            when.method(POST);
            then.status(403).body("caller may not impersonate");
        });
        let target = target_server.mock(|when, then| {
            when.method(GET);
            then.status(200);
        });

        let error = fetch_and_print(&test_ctx(&iam_server, &target_server))
            .await
            .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::Authentication(_))
        ));
        assert_eq!(target.hits(), 0);
    }

    #[tokio::test]
    async fn opaque_tokens_are_still_usable() {
        let iam_server = MockServer::start();
        let target_server = MockServer::start();

        // Not a JWT; the claims peek is diagnostics only and must not fail
        // the workflow.
        let _mint = mint_mock(&iam_server, "opaque-token");
        let target = target_server.mock(|when, then| {
            when.method(GET)
                .path("/dump")
                .header("authorization", "Bearer opaque-token");
            then.status(200).body("ok");
        });

        let outcome = fetch_and_print(&test_ctx(&iam_server, &target_server))
            .await
            .unwrap();

        target.assert();
        assert_eq!(outcome.status, StatusCode::OK);
    }
}
