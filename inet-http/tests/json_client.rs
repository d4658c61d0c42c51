use inet_common::observability::init_test_tracing;
use inet_http::{Auth, HttpClient, HttpError, RequestOpts};
use serde_json::Value;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn retries_server_errors_then_decodes() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"total": 1})))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(1);
    let got: Value = client
        .get_json(
            "search",
            RequestOpts {
                query: Some(vec![("q", "acme".into())]),
                ..Default::default()
            },
        )
        .await
        .expect("second attempt succeeds");
    assert_eq!(got["total"], 1);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({"errors": [{"error": "invalid-authorization"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(3);
    let err = client
        .get_json::<Value>("search/companies", RequestOpts::default())
        .await
        .unwrap_err();
    match err {
        HttpError::Api { status, message, .. } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(message, "invalid-authorization");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn posts_form_with_basic_auth() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/accesstoken"))
        // base64("key:secret")
        .and(header("authorization", "Basic a2V5OnNlY3JldA=="))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t0k"})),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let got: Value = client
        .post_form_json(
            "auth/accesstoken",
            &[("grant_type", "client_credentials")],
            RequestOpts {
                auth: Some(Auth::Basic {
                    username: "key",
                    password: Some("secret"),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(got["access_token"], "t0k");
}
