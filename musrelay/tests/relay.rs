//! End-to-end tests of `POST /musicas` against a mocked upstream

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use musmodel::Track;
use musrelay::{CatalogSearch, HttpResolver, RelayState, StaticCredentials, StreamRelay, create_router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{header as has_header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOTAL: usize = 1000;

fn media() -> Vec<u8> {
    (0..TOTAL).map(|i| (i % 251) as u8).collect()
}

/// Upstream honouring ranges on `/song.mp3` and ignoring them on `/plain.mp3`
///
/// `bytes=200-299` on `/song.mp3` stops after 50 bytes.
async fn upstream() -> MockServer {
    let server = MockServer::start().await;
    let body = media();

    Mock::given(method("GET"))
        .and(path("/song.mp3"))
        .and(has_header("range", "bytes=0-0"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", format!("bytes 0-0/{}", TOTAL).as_str())
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(body[..1].to_vec()),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/song.mp3"))
        .and(has_header("range", "bytes=100-199"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", format!("bytes 100-199/{}", TOTAL).as_str())
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(body[100..200].to_vec()),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    // Connection lost halfway through the requested window
    Mock::given(method("GET"))
        .and(path("/song.mp3"))
        .and(has_header("range", "bytes=200-299"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", format!("bytes 200-299/{}", TOTAL).as_str())
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(body[200..250].to_vec()),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/song.mp3"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(body.clone()),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/plain.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing.mp3"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    server
}

fn router(upstream: &MockServer) -> Router {
    let credentials = Arc::new(StaticCredentials::default());
    let catalog = Arc::new(CatalogSearch::new(vec![
        Track::new("42", "Wave", "Tom Jobim", 180, format!("{}/song.mp3", upstream.uri())),
        Track::new("43", "Insensatez", "Tom Jobim", 170, format!("{}/plain.mp3", upstream.uri())),
    ]));
    let client = reqwest::Client::new();
    let resolver = HttpResolver::new(client.clone(), credentials.clone()).with_catalog(catalog.clone());
    let relay = StreamRelay::new(client, Arc::new(resolver), credentials);
    create_router(RelayState::new(relay, catalog))
}

async fn call(router: Router, body: Value, range: Option<&str>) -> (StatusCode, header::HeaderMap, Vec<u8>) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/musicas")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(range) = range {
        request = request.header(header::RANGE, range);
    }
    let request = request.body(Body::from(body.to_string())).unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

fn stream_request(url: String) -> Value {
    json!({"method": "audio_stream", "data": {"url": url}})
}

#[tokio::test]
async fn test_range_request_returns_partial_content() {
    let upstream = upstream().await;
    let url = format!("{}/song.mp3", upstream.uri());

    let (status, headers, body) =
        call(router(&upstream), stream_request(url), Some("bytes=100-199")).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 100-199/1000");
    assert_eq!(headers[header::CONTENT_LENGTH], "100");
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mp3");
    assert_eq!(body, media()[100..200]);
}

#[tokio::test]
async fn test_no_range_returns_whole_media() {
    let upstream = upstream().await;
    let url = format!("{}/song.mp3", upstream.uri());

    let (status, headers, body) = call(router(&upstream), stream_request(url), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_LENGTH], "1000");
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(body, media());
}

#[tokio::test]
async fn test_upstream_ignoring_range_is_windowed() {
    let upstream = upstream().await;
    let url = format!("{}/plain.mp3", upstream.uri());

    let (status, headers, body) =
        call(router(&upstream), stream_request(url), Some("bytes=-10")).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 990-999/1000");
    assert_eq!(body, media()[990..]);
}

#[tokio::test]
async fn test_range_past_end_is_not_satisfiable() {
    let upstream = upstream().await;
    let url = format!("{}/song.mp3", upstream.uri());

    let (status, headers, body) =
        call(router(&upstream), stream_request(url), Some("bytes=2000-")).await;

    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes */1000");
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["erro"], "Range not satisfiable");
}

#[tokio::test]
async fn test_malformed_range_is_ignored() {
    let upstream = upstream().await;
    let url = format!("{}/song.mp3", upstream.uri());

    let (status, _, body) =
        call(router(&upstream), stream_request(url), Some("bytes=abc")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.len(), TOTAL);
}

#[tokio::test]
async fn test_missing_upstream_media_is_not_found() {
    let upstream = upstream().await;
    let url = format!("{}/missing.mp3", upstream.uri());

    let (status, _, body) = call(router(&upstream), stream_request(url), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["erro"], "Media not found");
}

#[tokio::test]
async fn test_validation_errors() {
    let upstream = upstream().await;

    let cases = [
        json!({"method": "audio_stream", "data": {}}),
        json!({"method": "audio_stream"}),
        json!({"data": {"url": "http://x/y"}}),
        json!({"method": "teleport", "data": {"url": "http://x/y"}}),
        json!({"method": "video_stream", "data": {"url": "ftp://x/y"}}),
        json!({"method": "search", "data": {"termo": "  "}}),
    ];
    for case in cases {
        let (status, _, body) = call(router(&upstream), case.clone(), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case}");
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert!(error["erro"].is_string(), "{case}");
        assert!(error["detalhes"].is_string(), "{case}");
    }
}

#[tokio::test]
async fn test_invalid_json_body_is_bad_request() {
    let upstream = upstream().await;
    let request = Request::builder()
        .method("POST")
        .uri("/musicas")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = router(&upstream).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_results_and_empty_search() {
    let upstream = upstream().await;

    let (status, _, body) = call(
        router(&upstream),
        json!({"method": "search", "data": {"termo": "jobim", "limite": "1"}}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(results["termo_busca"], "jobim");
    assert_eq!(results["total"], 1);
    assert_eq!(results["musicas"][0]["id_song"], "42");

    let (status, _, _) = call(
        router(&upstream),
        json!({"method": "search", "data": {"termo": "nothing matches"}}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_audio_info_describes_catalogued_track() {
    let upstream = upstream().await;
    let url = format!("{}/song.mp3", upstream.uri());

    let (status, _, body) = call(
        router(&upstream),
        json!({"method": "audio_info", "data": {"url": url}}),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let info: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(info["id_song"], "42");
    assert_eq!(info["song_name"], "Wave");
    assert_eq!(info["song_url"], url);
    assert_eq!(info["formato"], "mpeg");
    assert_eq!(info["tamanho"], 1000);
}

#[tokio::test]
async fn test_video_stream_uses_video_content_type() {
    let upstream = upstream().await;
    let url = format!("{}/song.mp3", upstream.uri());
    let request = json!({"method": "video_stream", "data": {"url": url}});

    let (status, headers, body) = call(router(&upstream), request.clone(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(body.len(), TOTAL);

    let (status, headers, body) = call(router(&upstream), request, Some("bytes=100-199")).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 100-199/1000");
    assert_eq!(body, media()[100..200]);
}

#[tokio::test]
async fn test_open_ended_range_runs_to_the_end() {
    let upstream = upstream().await;
    let url = format!("{}/song.mp3", upstream.uri());

    let (status, headers, body) =
        call(router(&upstream), stream_request(url), Some("bytes=900-")).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 900-999/1000");
    assert_eq!(headers[header::CONTENT_LENGTH], "100");
    assert_eq!(body, media()[900..]);
}

#[tokio::test]
async fn test_upstream_ending_early_aborts_partial_response() {
    let upstream = upstream().await;
    let url = format!("{}/song.mp3", upstream.uri());
    let request = Request::builder()
        .method("POST")
        .uri("/musicas")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::RANGE, "bytes=200-299")
        .body(Body::from(stream_request(url).to_string()))
        .unwrap();

    let response = router(&upstream).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");

    let mut body = response.into_body();
    let mut received = Vec::new();
    let mut failed = false;
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Ok(data) = frame.into_data() {
                    received.extend_from_slice(&data);
                }
            }
            Err(_) => {
                failed = true;
                break;
            }
        }
    }

    assert!(failed, "a truncated upstream must end the body with an error");
    assert_eq!(received, media()[200..250]);
}
