use base64::Engine;
use color_eyre::eyre::{eyre, Context, Result};

/// The subset of ID-token claims this tool reports on.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct IdTokenClaims {
    pub(crate) aud: String,
    pub(crate) iss: String,
    pub(crate) exp: i64,
    #[serde(default)]
    pub(crate) email: Option<String>,
}

/// Decodes a JWT payload without verifying the signature. Signature and
/// audience enforcement belong to the receiving service; this exists so the
/// minted audience and expiry can be logged.
pub(crate) fn peek_claims(token: &str) -> Result<IdTokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_header), Some(payload), Some(_signature)) => payload,
        _ => return Err(eyre!("Token is not a JWT")),
    };

    let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .wrap_err("Decoding JWT payload")?;

    serde_json::from_slice(&payload_bytes).wrap_err("Parsing JWT claims")
}

#[cfg(test)]
pub(crate) fn encode_unsigned_jwt(claims: &serde_json::Value) -> String {
    let engine = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
    format!(
        "{}.{}.sig",
        engine.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
        engine.encode(claims.to_string()),
    )
}
