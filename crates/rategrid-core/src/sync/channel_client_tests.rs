//! Tests for channel_client module.

#[cfg(test)]
mod tests {
    use super::super::channel_client::*;
    use super::super::compress::CompressedRange;
    use crate::error::SyncError;
    use crate::storage::ChannelManagerConfig;
    use chrono::NaiveDate;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn rates() -> SyncPayload {
        SyncPayload::Rates(vec![
            CompressedRange {
                start: d("2024-06-01"),
                end: d("2024-06-03"),
                value: 100.0,
            },
            CompressedRange {
                start: d("2024-06-04"),
                end: d("2024-06-05"),
                value: 120.5,
            },
        ])
    }

    #[test]
    fn payload_body_shape() {
        let body = rates().to_json().unwrap();
        assert_eq!(
            body,
            json!({"ranges": [
                {"start": "2024-06-01", "end": "2024-06-03", "value": 100.0},
                {"start": "2024-06-04", "end": "2024-06-05", "value": 120.5}
            ]})
        );
    }

    #[test]
    fn endpoint_encodes_ids() {
        let client =
            HttpChannelManager::new("https://cm.example.com/api/", "k", Duration::from_secs(5))
                .unwrap();
        let payload = SyncPayload::Availability(Vec::new());
        let url = client.endpoint("hotel 1", "room/a", &payload).unwrap();
        assert_eq!(
            url.as_str(),
            "https://cm.example.com/api/properties/hotel%201/availability/room%2Fa"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = HttpChannelManager::new("not a url", "k", Duration::from_secs(5));
        assert!(matches!(result, Err(SyncError::Url(_))));
    }

    #[test]
    fn empty_base_url_is_not_configured() {
        let config = ChannelManagerConfig::default();
        assert!(matches!(
            HttpChannelManager::from_config(&config),
            Err(SyncError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn push_posts_ranges_with_bearer_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/properties/cm-h1/rates/cm-p1")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(rates().to_json().unwrap()))
            .with_status(204)
            .create_async()
            .await;

        let client = HttpChannelManager::new(&server.url(), "secret", Duration::from_secs(5)).unwrap();
        client.push_ranges("cm-h1", "cm-p1", &rates()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_a_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/properties/cm-h1/availability/cm-r1")
            .with_status(422)
            .with_body("unknown room")
            .create_async()
            .await;

        let client = HttpChannelManager::new(&server.url(), "secret", Duration::from_secs(5)).unwrap();
        let payload = SyncPayload::Availability(vec![CompressedRange {
            start: d("2024-06-01"),
            end: d("2024-06-01"),
            value: 5,
        }]);
        let err = client.push_ranges("cm-h1", "cm-r1", &payload).await.unwrap_err();
        match err {
            SyncError::Rejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "unknown room");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
