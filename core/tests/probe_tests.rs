use std::net::TcpListener;
use std::time::Duration;

use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use xsschk_core::{
    probe_reflected, probe_stored, HttpClient, ProbeError, ProbeKind, ProbeOptions, ServerAnomaly,
    Target,
};

/// Echoes the `input` form field back inside an HTML page.
struct EchoForm;

impl Respond for EchoForm {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let input = url::form_urlencoded::parse(&request.body)
            .find(|(k, _)| k == "input")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_string(format!("<html><body>{}</body></html>", input))
    }
}

/// Echoes the `q` query parameter back inside an HTML page.
struct EchoQuery;

impl Respond for EchoQuery {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let q = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_string(format!("<p>You searched for {}</p>", q))
    }
}

fn options() -> ProbeOptions {
    ProbeOptions::with_timeout(Duration::from_secs(5))
}

fn client() -> HttpClient {
    HttpClient::with_defaults().unwrap()
}

async fn echo_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/comment"))
        .respond_with(EchoForm)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(EchoQuery)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_stored_echo_classification() {
    let server = echo_server().await;
    let target = Target::stored(&format!("{}/comment", server.uri())).unwrap();
    let client = client();

    let hit = probe_stored(&client, &target, "<script>alert(1)</script>", &options()).await;
    assert_eq!(hit.kind, ProbeKind::Stored);
    assert!(hit.vulnerable);
    assert_eq!(hit.status, Some(200));
    assert!(hit.error.is_none());

    let miss = probe_stored(&client, &target, "hello", &options()).await;
    assert!(!miss.vulnerable);
    assert!(miss.error.is_none());
}

#[tokio::test]
async fn test_stored_probe_submits_input_form_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/comment"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("input=%3Cb%3Ehi%3C%2Fb%3E"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let target = Target::stored(&format!("{}/comment", server.uri())).unwrap();
    let outcome = probe_stored(&client(), &target, "<b>hi</b>", &options()).await;
    assert!(outcome.error.is_none());
    assert!(!outcome.vulnerable);
}

#[tokio::test]
async fn test_stored_probe_is_idempotent_against_echo() {
    let server = echo_server().await;
    let target = Target::stored(&format!("{}/comment", server.uri())).unwrap();
    let client = client();

    for payload in ["<img src=x onerror=alert(1)>", "plain text"] {
        let first = probe_stored(&client, &target, payload, &options()).await;
        let second = probe_stored(&client, &target, payload, &options()).await;
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn test_onerror_without_script_is_vulnerable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<img src=x onerror=alert(1)>"))
        .mount(&server)
        .await;

    let target = Target::stored(&server.uri()).unwrap();
    let outcome = probe_stored(&client(), &target, "anything", &options()).await;
    assert!(outcome.vulnerable);
}

#[tokio::test]
async fn test_stripped_payload_is_not_vulnerable() {
    let server = MockServer::start().await;
    // "<script>x</script><img onerror=y>" with both markers removed
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x</script><img =y>"))
        .mount(&server)
        .await;

    let target = Target::stored(&server.uri()).unwrap();
    let outcome = probe_stored(&client(), &target, "<script>x</script><img onerror=y>", &options()).await;
    assert!(!outcome.vulnerable);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_timeout_yields_request_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<script>late</script>")
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let target = Target::stored(&server.uri()).unwrap();
    let opts = ProbeOptions::with_timeout(Duration::from_millis(100));
    let outcome = probe_stored(&client(), &target, "<script>alert(1)</script>", &opts).await;

    assert_eq!(outcome.payload, "<script>alert(1)</script>");
    assert!(!outcome.vulnerable);
    assert!(matches!(outcome.error, Some(ProbeError::RequestFailed(_))));
    assert_eq!(outcome.status, None);
}

#[tokio::test]
async fn test_connection_refused_yields_request_failed() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let stored = Target::stored(&format!("http://127.0.0.1:{}/comment", port)).unwrap();
    let reflected = Target::reflected(&format!("http://127.0.0.1:{}/search?q=", port)).unwrap();
    let client = client();

    let outcome = probe_stored(&client, &stored, "x", &options()).await;
    assert!(!outcome.vulnerable);
    assert!(matches!(outcome.error, Some(ProbeError::RequestFailed(_))));

    let outcome = probe_reflected(&client, &reflected, "x", &options()).await;
    assert!(!outcome.vulnerable);
    assert!(matches!(outcome.error, Some(ProbeError::RequestFailed(_))));
}

#[tokio::test]
async fn test_not_found_is_anomaly_and_failure_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<script>not found</script>"))
        .mount(&server)
        .await;

    let target = Target::stored(&server.uri()).unwrap();
    let outcome = probe_stored(&client(), &target, "<script>", &options()).await;

    assert_eq!(outcome.status, Some(404));
    assert_eq!(outcome.anomaly, Some(ServerAnomaly::PageNotFound));
    assert!(!outcome.vulnerable);
    assert_eq!(outcome.error, Some(ProbeError::RequestFailed("HTTP 404".to_string())));
}

#[tokio::test]
async fn test_server_error_body_classified_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("crash near onerror"))
        .mount(&server)
        .await;

    let target = Target::stored(&server.uri()).unwrap();
    let opts = ProbeOptions { classify_error_pages: true, ..options() };
    let outcome = probe_stored(&client(), &target, "x", &opts).await;

    assert_eq!(outcome.anomaly, Some(ServerAnomaly::ServerError));
    assert!(outcome.error.is_none());
    assert!(outcome.vulnerable);
}

#[tokio::test]
async fn test_not_found_clean_body_stays_clean_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nothing here"))
        .mount(&server)
        .await;

    let target = Target::stored(&server.uri()).unwrap();
    let opts = ProbeOptions { classify_error_pages: true, ..options() };
    let outcome = probe_stored(&client(), &target, "<script>", &opts).await;

    assert_eq!(outcome.anomaly, Some(ServerAnomaly::PageNotFound));
    assert!(!outcome.vulnerable);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_other_client_errors_have_no_anomaly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let target = Target::reflected(&format!("{}/search?q=", server.uri())).unwrap();
    let outcome = probe_reflected(&client(), &target, "x", &options()).await;

    assert_eq!(outcome.status, Some(403));
    assert_eq!(outcome.anomaly, None);
    assert!(matches!(outcome.error, Some(ProbeError::RequestFailed(_))));
}

#[tokio::test]
async fn test_reflected_payload_is_percent_encoded_into_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "<script>alert(1)</script>"))
        .respond_with(EchoQuery)
        .expect(1)
        .mount(&server)
        .await;

    let target = Target::reflected(&format!("{}/search?q=", server.uri())).unwrap();
    let outcome = probe_reflected(&client(), &target, "<script>alert(1)</script>", &options()).await;

    assert_eq!(outcome.kind, ProbeKind::Reflected);
    assert!(outcome.vulnerable);
}

#[tokio::test]
async fn test_reflected_ampersand_stays_in_parameter() {
    let server = echo_server().await;
    let target = Target::reflected(&format!("{}/search?q=", server.uri())).unwrap();

    // an unencoded '&' would split the value and drop the marker
    let outcome = probe_reflected(&client(), &target, "a&b=<img onerror=1>", &options()).await;
    assert!(outcome.vulnerable);
}

#[tokio::test]
async fn test_reflected_fixed_body_never_vulnerable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>static page</html>"))
        .mount(&server)
        .await;

    let target = Target::reflected(&format!("{}/search?q=", server.uri())).unwrap();
    let client = client();
    for payload in ["<script>alert(1)</script>", "<img src=x onerror=alert(1)>", "hello"] {
        let outcome = probe_reflected(&client, &target, payload, &options()).await;
        assert!(!outcome.vulnerable);
        assert!(outcome.error.is_none());
    }
}
