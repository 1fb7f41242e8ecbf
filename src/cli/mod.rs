mod instrumentation;

#[derive(Debug, clap::Parser)]
#[clap(version)]
pub(crate) struct IdTokenFetchCli {
    /// Destination of the authorized GET request.
    #[clap(long, env = "IDTOKEN_FETCH_URL")]
    pub(crate) url: url::Url,
    /// Audience embedded in the minted ID token. Defaults to the origin of `--url`.
    #[clap(long, env = "IDTOKEN_FETCH_AUDIENCE", value_parser = StringToNoneParser, default_value = "")]
    pub(crate) audience: OptionString,
    /// Email of the service account to impersonate.
    #[clap(long, env = "IDTOKEN_FETCH_SERVICE_ACCOUNT")]
    pub(crate) service_account: String,
    /// Whether the minted token's claims embed the service account's email.
    #[clap(long, env = "IDTOKEN_FETCH_INCLUDE_EMAIL", value_parser = EmptyBoolParser, default_value_t = true)]
    pub(crate) include_email: bool,
    #[clap(
        long,
        env = "IDTOKEN_FETCH_IAM_HOST",
        default_value = "https://iamcredentials.googleapis.com"
    )]
    pub(crate) iam_host: url::Url,
    // Will also detect `GOOGLE_OAUTH_ACCESS_TOKEN`
    #[clap(long, env = "IDTOKEN_FETCH_ACCESS_TOKEN", value_parser = StringToNoneParser, default_value = "")]
    pub(crate) access_token: OptionString,
    /// Base URL of a metadata server to fetch the caller's access token from.
    ///
    /// Used instead of `http://metadata.google.internal` when developing locally.
    #[clap(long, env = "IDTOKEN_FETCH_METADATA_HOST", value_parser = StringToNoneParser, default_value = "")]
    pub(crate) metadata_host: OptionString,

    #[clap(flatten)]
    pub instrumentation: instrumentation::Instrumentation,
}

impl IdTokenFetchCli {
    #[tracing::instrument(skip_all)]
    pub(crate) fn populate_missing_from_env(&mut self) {
        if self.access_token.0.is_none() {
            let env_key = "GOOGLE_OAUTH_ACCESS_TOKEN";
            if let Ok(env_val) = std::env::var(env_key) {
                if !env_val.is_empty() {
                    tracing::debug!("Access token set via `${env_key}`");
                    self.access_token.0 = Some(env_val);
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct OptionString(pub Option<String>);

#[derive(Clone)]
struct StringToNoneParser;

impl clap::builder::TypedValueParser for StringToNoneParser {
    type Value = OptionString;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let inner = clap::builder::StringValueParser::new();
        let val = inner.parse_ref(cmd, arg, value)?;

        if val.is_empty() {
            Ok(OptionString(None))
        } else {
            Ok(OptionString(Some(Into::<String>::into(val))))
        }
    }
}

#[derive(Clone)]
struct EmptyBoolParser;

impl clap::builder::TypedValueParser for EmptyBoolParser {
    type Value = bool;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let inner = clap::builder::StringValueParser::new();
        let val = inner.parse_ref(cmd, arg, value)?;

        if val.is_empty() {
            Ok(false)
        } else {
            let val = match val.as_ref() {
                "true" => true,
                "false" => false,
                v => {
                    return Err(clap::Error::raw(
                        clap::error::ErrorKind::InvalidValue,
                        format!("`{v}` was not `true` or `false`\n"),
                    ))
                }
            };
            Ok(val)
        }
    }
}
