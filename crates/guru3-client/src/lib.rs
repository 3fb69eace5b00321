//! Guru3 event API client.

mod client;
mod error;
mod push;
mod types;

pub use client::Guru3Client;
pub use error::Guru3Error;
pub use push::{parse_hint, PushChannel};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client(mock_server: &MockServer) -> Guru3Client {
        Guru3Client::new(mock_server.uri(), SecretString::new("test-key".into())).unwrap()
    }

    #[test]
    fn test_urls() {
        let client = Guru3Client::new(
            Guru3Client::base_url_for("guru3.example", Some(8443), true),
            SecretString::new("k".into()),
        )
        .unwrap();
        assert_eq!(
            client.messages_url(),
            "https://guru3.example:8443/api/event/1/messages"
        );
        assert_eq!(client.push_url(), "wss://guru3.example:8443/status/stream/");

        let plain = Guru3Client::base_url_for("localhost", None, false);
        assert_eq!(plain, "http://localhost");
    }

    #[tokio::test]
    async fn test_fetch_events() {
        let mock_server = MockServer::start().await;

        let events = serde_json::json!([
            {
                "id": 11,
                "type": "UPDATE_EXTENSION",
                "data": {"number": "2000", "type": "SIP", "password": "pw"},
                "timestamp": 1700000000
            },
            {
                "id": 12,
                "type": "DELETE_EXTENSION",
                "data": {"number": "2001"},
                "timestamp": 1700000001
            }
        ]);

        Mock::given(method("GET"))
            .and(path("/api/event/1/messages"))
            .and(header("ApiKey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&events))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let fetched = client.fetch_events().await.unwrap();

        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].id, 11);
        assert_eq!(fetched[0].kind, "UPDATE_EXTENSION");
        assert_eq!(fetched[1].data["number"], "2001");
        assert_eq!(fetched[1].timestamp.timestamp(), 1700000001);
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/event/1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"oops\": true}"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let err = client.fetch_events().await.unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_transient() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/event/1/messages"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let err = client.fetch_events().await.unwrap_err();
        assert!(matches!(err, Guru3Error::Api { status: 503, .. }));
        assert!(!err.is_protocol_violation());
    }

    #[tokio::test]
    async fn test_acknowledge() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/event/1/messages"))
            .and(body_string_contains("name=\"acklist\""))
            .and(body_string_contains("[7]"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        assert!(client.acknowledge(&[7]).await.is_ok());
    }

    #[tokio::test]
    async fn test_acknowledge_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/event/1/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.acknowledge(&[7]).await;
        assert!(matches!(result, Err(Guru3Error::Api { status: 500, .. })));
    }
}
