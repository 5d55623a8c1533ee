use newsrant_http::header::{AUTHORIZATION, HeaderValue};
use newsrant_http::{Auth, HttpClient, HttpError, RequestOpts};
use reqwest::StatusCode;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UA: &str = "Mozilla/5.0 (newsrant-tests)";

#[tokio::test]
async fn get_text_sends_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", UA))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>front page</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri())
        .unwrap()
        .with_user_agent(UA)
        .unwrap();
    let html = client.get_text("/", RequestOpts::default()).await.unwrap();
    assert_eq!(html, "<html>front page</html>");
}

#[tokio::test]
async fn absolute_urls_bypass_the_base() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/politics/story-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("story"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new("https://unused.example").unwrap();
    let url = format!("{}/politics/story-1", server.uri());
    let body = client
        .get_text(
            &url,
            RequestOpts {
                allow_absolute: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(body, "story");
}

#[tokio::test]
async fn rate_limit_reset_is_surfaced_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-rate-limit-reset", "1700000000")
                .insert_header("x-rate-limit-remaining", "0")
                .set_body_json(json!({"title": "Too Many Requests", "detail": "Too Many Requests", "status": 429})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .post_json_opts::<_, Value>(
            "2/tweets",
            &json!({"text": "hi"}),
            RequestOpts {
                retries: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(err.rate_limit_reset(), Some(1_700_000_000));
    match err {
        HttpError::Api {
            status, message, ..
        } => {
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
            assert_eq!(message, "Too Many Requests");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(1);
    let got: Value = client.get_json("flaky", RequestOpts::default()).await.unwrap();
    assert_eq!(got, json!({"ok": true}));
}

#[tokio::test]
async fn header_auth_and_json_body_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(header("authorization", "OAuth oauth_token=\"user-token\""))
        .and(body_json(json!({"text": "hello"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "1", "text": "hello"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let got: Value = client
        .post_json_opts(
            "2/tweets",
            &json!({"text": "hello"}),
            RequestOpts {
                auth: Some(Auth::Header {
                    name: AUTHORIZATION,
                    value: HeaderValue::from_static("OAuth oauth_token=\"user-token\""),
                }),
                retries: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(got["data"]["id"], "1");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(3);
    let err = client
        .get_text("missing", RequestOpts::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert!(!err.is_rate_limited());
}
