//! Minimal wrapper around the X API v2 create-post endpoint.
//!
//! Every request is signed with OAuth 1.0a (HMAC-SHA1) from the four app and user
//! credentials; those never expire, unlike OAuth 2.0 user tokens. Transport goes through
//! the shared HTTP client with retries disabled: a post is sent at most once per call,
//! and rate-limit handling is left to [`crate::publisher::Publisher`].
use crate::twitter::types::{CreatePostRequest, CreatePostResponse};
use crate::{PostError, PostId, PostSink};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newsrant_http::header::{AUTHORIZATION, HeaderValue};
use newsrant_http::{Auth, HttpClient, HttpError, RequestOpts};
use url::Url;

const X_API_BASE: &str = "https://api.twitter.com/";
const CREATE_POST_PATH: &str = "2/tweets";

/// OAuth 1.0a consumer (app) and access (user) credentials.
#[derive(Clone)]
pub struct OAuth1Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl std::fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl OAuth1Credentials {
    /// `Authorization` header value for a POST to `url`.
    ///
    /// JSON bodies are not part of the OAuth 1.0a signature base string, so only the
    /// method, URL and oauth_* parameters are signed. Nonce and timestamp are fresh on
    /// every call.
    fn sign_post(&self, url: &Url) -> Result<HeaderValue, HttpError> {
        let token = oauth1_request::Token::from_parts(
            self.consumer_key.as_str(),
            self.consumer_secret.as_str(),
            self.access_token.as_str(),
            self.access_token_secret.as_str(),
        );
        let header = oauth1_request::post(url.as_str(), &(), &token, oauth1_request::HMAC_SHA1);
        HeaderValue::from_str(&header)
            .map_err(|e| HttpError::Build(format!("invalid OAuth header: {e}")))
    }
}

#[derive(Clone)]
pub struct TwitterApi {
    http: HttpClient,
    endpoint: Url,
    credentials: OAuth1Credentials,
}

impl TwitterApi {
    pub fn new(credentials: OAuth1Credentials) -> Result<Self, HttpError> {
        Self::with_base_url(X_API_BASE, credentials)
    }

    /// Point the client at another host (proxies, test servers).
    pub fn with_base_url(base: &str, credentials: OAuth1Credentials) -> Result<Self, HttpError> {
        let http = HttpClient::new(base)?.with_retries(0);
        let endpoint = http
            .base()
            .join(CREATE_POST_PATH)
            .map_err(|e| HttpError::Url(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            credentials,
        })
    }

    pub async fn create_post(&self, text: &str) -> Result<PostId, PostError> {
        let value = self
            .credentials
            .sign_post(&self.endpoint)
            .map_err(|e| PostError::Other(e.to_string()))?;
        let resp: CreatePostResponse = self
            .http
            .post_json_opts(
                self.endpoint.as_str(),
                &CreatePostRequest { text },
                RequestOpts {
                    auth: Some(Auth::Header {
                        name: AUTHORIZATION,
                        value,
                    }),
                    retries: Some(0),
                    allow_absolute: true,
                    ..Default::default()
                },
            )
            .await
            .map_err(classify)?;

        tracing::info!(post_id = %resp.data.id, "twitter.post.created");
        Ok(PostId(resp.data.id))
    }
}

fn classify(err: HttpError) -> PostError {
    if err.is_rate_limited() {
        let reset = err
            .rate_limit_reset()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        PostError::RateLimited { reset }
    } else {
        PostError::Other(err.to_string())
    }
}

#[async_trait]
impl PostSink for TwitterApi {
    async fn create_post(&self, text: &str) -> Result<PostId, PostError> {
        TwitterApi::create_post(self, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> OAuth1Credentials {
        OAuth1Credentials {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            access_token: "at".into(),
            access_token_secret: "ats".into(),
        }
    }

    #[test]
    fn signed_header_carries_oauth_params() {
        let url = Url::parse("https://api.twitter.com/2/tweets").unwrap();
        let value = creds().sign_post(&url).unwrap();
        let header = value.to_str().unwrap();
        assert!(header.starts_with("OAuth "));
        assert!(header.contains(r#"oauth_consumer_key="ck""#));
        assert!(header.contains(r#"oauth_token="at""#));
        assert!(header.contains(r#"oauth_signature_method="HMAC-SHA1""#));
        assert!(header.contains("oauth_signature="));
    }

    #[test]
    fn endpoint_joins_base() {
        let api = TwitterApi::with_base_url("http://127.0.0.1:9", creds()).unwrap();
        assert_eq!(api.endpoint.as_str(), "http://127.0.0.1:9/2/tweets");
    }

    #[test]
    fn debug_hides_secrets() {
        let shown = format!("{:?}", creds());
        assert!(!shown.contains("ats"));
        assert!(!shown.contains("\"cs\""));
    }
}
