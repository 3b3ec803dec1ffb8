//! End-to-end gateway tests against mock capsules.

mod common;

use common::{closed_port, http_client, local_config, start_bridge, start_mock_capsule};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HOST, LOCATION};
use reqwest::StatusCode;

const PROXY_HOST: &str = "proxy.example.org";

const PAGE: &str = "# Hello capsule\n\
                    Some <text> here\n\
                    => /other.gmi Other page\n\
                    => https://web.example/ The web\n\
                    * one\n\
                    * two\n";

async fn page_capsule() -> std::net::SocketAddr {
    start_mock_capsule(|line| {
        if line.ends_with("/moved") {
            b"31 /new-home\r\n".to_vec()
        } else if line.ends_with("/away") {
            b"30 https://web.example/elsewhere\r\n".to_vec()
        } else if line.ends_with("/missing") {
            b"51 Nothing here\r\n".to_vec()
        } else if line.ends_with("/cert") {
            b"60 Certificate required\r\n".to_vec()
        } else if line.ends_with("/search") {
            b"10 Enter a term\r\n".to_vec()
        } else if line.ends_with("/image.png") {
            let mut reply = b"20 image/png\r\n".to_vec();
            reply.extend_from_slice(&[0x89, b'P', b'N', b'G']);
            reply
        } else if line.ends_with("/garbage") {
            b"not a header\r\n".to_vec()
        } else {
            format!("20 text/gemini; lang=en\r\n{}", PAGE).into_bytes()
        }
    })
    .await
}

#[tokio::test]
async fn gemtext_is_transcoded_to_html() {
    let dir = tempfile::tempdir().unwrap();
    let capsule = page_capsule().await;
    let (services, shutdown) = start_bridge(local_config(dir.path())).await;

    let response = http_client()
        .get(format!("http://{}/{}/index.gmi", services.http_addr(), capsule))
        .header(HOST, PROXY_HOST)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    let body = response.text().await.unwrap();
    assert!(body.contains("<title>Hello capsule"));
    assert!(body.contains("<h1>Hello capsule</h1>"));
    assert!(body.contains("Some &lt;text&gt; here"));
    assert!(body.contains(&format!(r#"href="/{}/other.gmi""#, capsule)));
    assert!(body.contains(r#"href="https://web.example/""#));
    assert!(body.contains("<ul>\n<li>one</li>\n<li>two</li>\n</ul>"));

    shutdown.trigger();
    services.join().await.unwrap();
}

#[tokio::test]
async fn raw_flag_and_accept_return_source() {
    let dir = tempfile::tempdir().unwrap();
    let capsule = page_capsule().await;
    let (services, shutdown) = start_bridge(local_config(dir.path())).await;
    let client = http_client();

    let response = client
        .get(format!("http://{}/{}/?raw", services.http_addr(), capsule))
        .header(HOST, PROXY_HOST)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/gemini; lang=en");
    assert_eq!(response.text().await.unwrap(), PAGE);

    let response = client
        .get(format!("http://{}/{}/", services.http_addr(), capsule))
        .header(HOST, PROXY_HOST)
        .header(ACCEPT, "text/gemini, */*;q=0.1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), PAGE);

    shutdown.trigger();
    services.join().await.unwrap();
}

#[tokio::test]
async fn other_media_types_pass_through() {
    let dir = tempfile::tempdir().unwrap();
    let capsule = page_capsule().await;
    let (services, shutdown) = start_bridge(local_config(dir.path())).await;

    let response = http_client()
        .get(format!("http://{}/{}/image.png", services.http_addr(), capsule))
        .header(HOST, PROXY_HOST)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
    assert_eq!(&response.bytes().await.unwrap()[..], &[0x89, b'P', b'N', b'G']);

    shutdown.trigger();
    services.join().await.unwrap();
}

#[tokio::test]
async fn redirects_are_rewritten_into_the_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let capsule = page_capsule().await;
    let (services, shutdown) = start_bridge(local_config(dir.path())).await;
    let client = http_client();

    let response = client
        .get(format!("http://{}/{}/moved", services.http_addr(), capsule))
        .header(HOST, PROXY_HOST)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[LOCATION], format!("/{}/new-home", capsule).as_str());

    let response = client
        .get(format!("http://{}/{}/away", services.http_addr(), capsule))
        .header(HOST, PROXY_HOST)
        .send()
        .await
        .unwrap();
    assert!(response.headers().get(LOCATION).is_none());
    assert!(response.text().await.unwrap().contains("https://web.example/elsewhere"));

    shutdown.trigger();
    services.join().await.unwrap();
}

#[tokio::test]
async fn native_errors_map_to_http_statuses() {
    let dir = tempfile::tempdir().unwrap();
    let capsule = page_capsule().await;
    let (services, shutdown) = start_bridge(local_config(dir.path())).await;
    let client = http_client();
    let get = |path: &str| {
        client
            .get(format!("http://{}/{}/{}", services.http_addr(), capsule, path))
            .header(HOST, PROXY_HOST)
            .send()
    };

    let missing = get("missing").await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert!(missing.text().await.unwrap().contains("Nothing here"));

    assert_eq!(get("search").await.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);

    let cert = get("cert").await.unwrap();
    assert_eq!(cert.status(), StatusCode::NOT_IMPLEMENTED);
    assert!(cert.text().await.unwrap().contains("Not supported"));
    assert_eq!(get("garbage").await.unwrap().status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
    services.join().await.unwrap();
}

#[tokio::test]
async fn unreachable_capsule_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let (services, shutdown) = start_bridge(local_config(dir.path())).await;

    let response = http_client()
        .get(format!("http://{}/127.0.0.1:{}/", services.http_addr(), closed_port()))
        .header(HOST, PROXY_HOST)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(response.headers()[CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));

    shutdown.trigger();
    services.join().await.unwrap();
}

#[tokio::test]
async fn only_get_and_head_are_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let (services, shutdown) = start_bridge(local_config(dir.path())).await;

    let response = http_client()
        .post(format!("http://{}/a.example/", services.http_addr()))
        .header(HOST, PROXY_HOST)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"], "GET, HEAD");

    shutdown.trigger();
    services.join().await.unwrap();
}
