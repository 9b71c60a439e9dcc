//! Integration tests against a real MQTT broker
//!
//! Ignored by default. Start a broker (e.g. `mosquitto -p 1883`) and run:
//!
//! ```text
//! MQTT_BROKER_HOST=localhost cargo test --test test_mqtt_broker_integration -- --ignored
//! ```

use std::time::Duration;
use wyze2mqtt::config::MqttSection;
use wyze2mqtt::transport::{BusConnection, BusConnector};
use wyze2mqtt::RumqttcConnector;

fn broker_host() -> String {
    std::env::var("MQTT_BROKER_HOST").unwrap_or_else(|_| "localhost".to_string())
}

fn connector(client_id: &str) -> RumqttcConnector {
    let section = MqttSection {
        client_id: client_id.to_string(),
        ..MqttSection::default()
    };
    RumqttcConnector::new(section, &broker_host(), None).unwrap()
}

#[tokio::test]
#[ignore = "requires a running MQTT broker"]
async fn test_connect_and_disconnect() {
    let mut connection = connector("wyze2mqtt-it-connect").connect().await.unwrap();
    connection.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running MQTT broker"]
async fn test_command_published_by_another_client_is_received() {
    let mut listener = connector("wyze2mqtt-it-listener").connect().await.unwrap();
    listener.subscribe("wyze2mqtt-it/+/set").await.unwrap();

    let mut sender = connector("wyze2mqtt-it-sender").connect().await.unwrap();
    sender
        .publish("wyze2mqtt-it/2CAA8E000001/set", br#"{"state":"on"}"#.to_vec())
        .await
        .unwrap();

    let message = tokio::time::timeout(Duration::from_secs(5), listener.next_message())
        .await
        .expect("message should arrive")
        .unwrap();

    assert_eq!(message.topic, "wyze2mqtt-it/2CAA8E000001/set");
    assert_eq!(message.payload, br#"{"state":"on"}"#.to_vec());

    sender.disconnect().await.unwrap();
    listener.disconnect().await.unwrap();
}
