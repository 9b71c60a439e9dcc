//! Integration tests for the Wyze HTTP client
//!
//! Tests behavioral contracts against a mock HTTP server:
//! - Login request shape and token handling
//! - Application API envelope handling and error codes
//! - Device list and property list parsing
//! - The session's current access token is used on every request

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wyze2mqtt::config::WyzeCredentials;
use wyze2mqtt::wyze::{DeviceApi, Session, TokenPair, WyzeClient, WyzeClientConfig, WyzeError};

fn test_client(server: &MockServer, session: Session) -> WyzeClient {
    let config = WyzeClientConfig {
        auth_url: server.uri(),
        api_url: server.uri(),
        timeout: Duration::from_secs(5),
    };
    WyzeClient::new(config, session).unwrap()
}

fn test_credentials() -> WyzeCredentials {
    WyzeCredentials {
        email: "user@example.com".to_string(),
        password: "hunter2".to_string(),
        key_id: "key-id-123".to_string(),
        api_key: "api-key-456".to_string(),
    }
}

fn ok_envelope(data: serde_json::Value) -> serde_json::Value {
    json!({"code": "1", "msg": "SUCCESS", "data": data})
}

#[tokio::test]
async fn test_login_sends_keys_and_hashed_password() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .and(header("keyid", "key-id-123"))
        .and(header("apikey", "api-key-456"))
        .and(body_partial_json(json!({
            "email": "user@example.com",
            "password": WyzeClient::hash_password("hunter2"),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-a",
            "refresh_token": "refresh-a",
            "user_id": "u-1",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, Session::default());
    let tokens = client.login(&test_credentials()).await.unwrap();

    assert_eq!(tokens, TokenPair::new("access-a", "refresh-a"));
}

#[tokio::test]
async fn test_login_rejected_is_authentication_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"errorCode": 1000, "description": "Invalid credentials"})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server, Session::default());
    let result = client.login(&test_credentials()).await;

    match result {
        Err(WyzeError::AuthenticationFailed(message)) => assert!(message.contains("400")),
        other => panic!("Expected AuthenticationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_login_requiring_mfa_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "",
            "mfa_options": ["PrimaryPhone"],
        })))
        .mount(&server)
        .await;

    let client = test_client(&server, Session::default());
    let result = client.login(&test_credentials()).await;

    assert!(matches!(result, Err(WyzeError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_requests_carry_current_session_token() {
    let server = MockServer::start().await;
    let session = Session::new(TokenPair::new("access-1", "refresh-1"));

    Mock::given(method("POST"))
        .and(path("/app/v2/home_page/get_object_list"))
        .and(body_partial_json(json!({"access_token": "access-2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "device_list": []
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, session.clone());

    // A refresh swaps the pair after the client was built
    session.replace(TokenPair::new("access-2", "refresh-2"));
    let devices = client.devices_list().await.unwrap();

    assert!(devices.is_empty());
}

#[tokio::test]
async fn test_refresh_token_returns_new_pair() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/user/refresh_token"))
        .and(body_partial_json(json!({"refresh_token": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2",
        }))))
        .mount(&server)
        .await;

    let client = test_client(&server, Session::new(TokenPair::new("access-1", "refresh-1")));
    let tokens = client.refresh_token("refresh-1").await.unwrap();

    assert_eq!(tokens, TokenPair::new("access-2", "refresh-2"));
}

#[tokio::test]
async fn test_api_error_code_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/user/refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "2001",
            "msg": "AccessTokenError",
            "data": {},
        })))
        .mount(&server)
        .await;

    let client = test_client(&server, Session::default());
    let error = client.refresh_token("stale").await.unwrap_err();

    assert!(error.is_token_expired());
    assert!(matches!(error, WyzeError::Api { ref code, .. } if code == "2001"));
}

#[tokio::test]
async fn test_http_error_body_is_sanitized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/v2/home_page/get_object_list"))
        .respond_with(
            ResponseTemplate::new(502).set_body_string(r#"{"access_token":"leaked-value"}"#),
        )
        .mount(&server)
        .await;

    let client = test_client(&server, Session::default());

    match client.devices_list().await {
        Err(WyzeError::Http { status, body }) => {
            assert_eq!(status, 502);
            assert!(!body.contains("leaked-value"));
        }
        other => panic!("Expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_devices_list_keeps_records_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/v2/home_page/get_object_list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "device_list": [
                {"mac": "B1", "product_model": "WLPA19C", "nickname": "Desk", "firmware_ver": "1.2.10"},
                {"mac": "B2", "product_model": "WLPA19", "nickname": "Hall"},
            ]
        }))))
        .mount(&server)
        .await;

    let client = test_client(&server, Session::default());
    let devices = client.devices_list().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].mac(), Some("B1"));
    assert_eq!(devices[0].nickname(), Some("Desk"));
    assert_eq!(devices[0].fields()["firmware_ver"], "1.2.10");
    assert_eq!(devices[1].product_model(), Some("WLPA19"));
}

#[tokio::test]
async fn test_set_brightness_posts_property() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/v2/device/set_property"))
        .and(body_partial_json(json!({
            "device_mac": "B1",
            "device_model": "WLPA19C",
            "pid": "P1501",
            "pvalue": "75",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, Session::default());
    client.set_brightness("B1", "WLPA19C", 75).await.unwrap();
}

#[tokio::test]
async fn test_turn_off_posts_power_property() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/v2/device/set_property"))
        .and(body_partial_json(json!({"pid": "P3", "pvalue": "0"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, Session::default());
    client.turn_off("B1", "WLPA19C").await.unwrap();
}

#[tokio::test]
async fn test_bulb_info_reads_power_property() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/v2/home_page/get_object_list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "device_list": [
                {"mac": "2CAA8E000001", "product_model": "WLPA19", "device_params": {"switch_state": 0}},
            ]
        }))))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/app/v2/device/get_property_list"))
        .and(body_partial_json(json!({
            "device_mac": "2CAA8E000001",
            "device_model": "WLPA19",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "property_list": [
                {"pid": "P3", "value": "1"},
                {"pid": "P1501", "value": "40"},
            ]
        }))))
        .mount(&server)
        .await;

    let client = test_client(&server, Session::default());
    let info = client.bulb_info("2caa8e000001").await.unwrap();

    assert_eq!(info.mac, "2CAA8E000001");
    assert_eq!(info.model, "WLPA19");
    assert!(info.is_on);
}

#[tokio::test]
async fn test_power_state_reads_only_property_list() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/v2/home_page/get_object_list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "device_list": []
        }))))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/app/v2/device/get_property_list"))
        .and(body_partial_json(json!({
            "device_mac": "2CAA8E000001",
            "device_model": "WLPA19",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "property_list": [{"pid": "P3", "value": "0"}]
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, Session::default());
    let is_on = client.power_state("2CAA8E000001", "WLPA19").await.unwrap();

    assert!(!is_on);
}

#[tokio::test]
async fn test_bulb_info_unknown_device() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/v2/home_page/get_object_list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "device_list": [{"mac": "OTHER", "product_model": "WLPA19"}]
        }))))
        .mount(&server)
        .await;

    let client = test_client(&server, Session::default());
    let result = client.bulb_info("MISSING").await;

    assert!(matches!(result, Err(WyzeError::DeviceNotFound(mac)) if mac == "MISSING"));
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    let config = WyzeClientConfig {
        auth_url: "http://127.0.0.1:1".to_string(),
        api_url: "http://127.0.0.1:1".to_string(),
        timeout: Duration::from_secs(2),
    };
    let client = WyzeClient::new(config, Session::default()).unwrap();

    let result = client.devices_list().await;
    assert!(matches!(result, Err(WyzeError::Network(_))));
}
