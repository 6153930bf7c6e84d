//! X publisher against a local stand-in for the API

#[cfg(feature = "twitter")]
mod publisher_tests {
    use sitemap_promo::{
        PostRequest, PromoError, Publisher, XCredentials, XEndpoints, XPublisher,
    };
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    type Route = fn(&str, &str) -> (u16, String);

    /// Serves canned JSON answers and records `METHOD path` of every request.
    async fn serve(route: Route) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let log = log.clone();
                tokio::spawn(async move {
                    let mut data = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let header_end = loop {
                        let n = socket.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        data.extend_from_slice(&chunk[..n]);
                        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                            break pos + 4;
                        }
                    };

                    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
                    let content_length = head
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    while data.len() < header_end + content_length {
                        let n = socket.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        data.extend_from_slice(&chunk[..n]);
                    }

                    let mut parts = head.split_whitespace();
                    let method = parts.next().unwrap_or_default().to_string();
                    let path = parts.next().unwrap_or_default().to_string();
                    log.lock().unwrap().push(format!("{method} {path}"));

                    let (status, body) = route(&method, &path);
                    let response = format!(
                        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (base, seen)
    }

    fn publisher_for(base: &str) -> XPublisher {
        XPublisher::new(XCredentials::new("test-token")).with_endpoints(XEndpoints {
            api_v2: format!("{base}/2"),
            api_v1: format!("{base}/1.1"),
            upload_v1: format!("{base}/upload"),
        })
    }

    #[tokio::test]
    async fn test_v2_post_with_account_link() {
        let (base, seen) = serve(|_, path| match path {
            "/2/tweets" => (201, r#"{"data":{"id":"5","text":"hi"}}"#.into()),
            "/2/users/me" => (200, r#"{"data":{"username":"acme"}}"#.into()),
            _ => (404, "{}".into()),
        })
        .await;

        let published = publisher_for(&base)
            .publish(&PostRequest::text("hello https://example.com"))
            .await
            .unwrap();

        assert_eq!(published.id, "5");
        assert_eq!(published.url.as_deref(), Some("https://x.com/acme/status/5"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["POST /2/tweets", "GET /2/users/me"]
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_v1_on_service_error() {
        let (base, seen) = serve(|_, path| match path {
            "/2/tweets" => (503, r#"{"title":"Service Unavailable"}"#.into()),
            "/1.1/statuses/update.json" => (
                200,
                r#"{"id_str":"77","user":{"screen_name":"acme"}}"#.into(),
            ),
            _ => (404, "{}".into()),
        })
        .await;

        let published = publisher_for(&base)
            .publish(&PostRequest::text("hello"))
            .await
            .unwrap();

        assert_eq!(published.id, "77");
        assert_eq!(published.url.as_deref(), Some("https://x.com/acme/status/77"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["POST /2/tweets", "POST /1.1/statuses/update.json"]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_stops_the_chain() {
        let (base, seen) = serve(|_, _| (401, r#"{"title":"Unauthorized"}"#.into())).await;

        let err = publisher_for(&base)
            .publish(&PostRequest::text("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, PromoError::AuthError(_)));
        assert_eq!(*seen.lock().unwrap(), vec!["POST /2/tweets"]);
    }

    #[tokio::test]
    async fn test_last_error_surfaces_when_both_fail() {
        let (base, _) = serve(|_, _| (500, r#"{"error":"boom"}"#.into())).await;

        let err = publisher_for(&base)
            .publish(&PostRequest::text("hello"))
            .await
            .unwrap_err();

        match err {
            PromoError::ExternalServiceError { service, message } => {
                assert_eq!(service, "X");
                assert!(message.starts_with("status update returned 500"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_credentials_from_values() {
        assert!(XCredentials::from_values(Some("TRUE"), Some("abc")).is_ok());
        assert!(matches!(
            XCredentials::from_values(Some("no"), Some("abc")),
            Err(PromoError::AuthError(_))
        ));
    }
}
