//! Tests for adapter configuration.

use super::super::*;

#[test]
fn test_default_config() {
    let config = AdapterConfig::default();
    assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    assert_eq!(config.chunk_size, 1024);
    assert_eq!(config.worker_name, "chunk-stream");
    assert_eq!(config.prefetch, 4);
    assert!(config.validate().is_ok());
}

#[test]
fn test_presets_are_valid() {
    let low = AdapterConfig::low_latency();
    assert_eq!((low.chunk_size, low.prefetch), (256, 2));
    assert!(low.validate().is_ok());

    let high = AdapterConfig::high_throughput();
    assert_eq!((high.chunk_size, high.prefetch), (8192, 16));
    assert!(high.validate().is_ok());
}

#[test]
fn test_validation_rejects_unusable_values() {
    let zero_chunk = AdapterConfig {
        chunk_size: 0,
        ..Default::default()
    };
    assert!(matches!(
        zero_chunk.validate(),
        Err(StreamError::InvalidConfig(msg)) if msg.contains("chunk_size")
    ));

    let zero_prefetch = AdapterConfig {
        prefetch: 0,
        ..Default::default()
    };
    assert!(zero_prefetch.validate().is_err());

    let bad_name = AdapterConfig {
        worker_name: "mic\0feed".to_string(),
        ..Default::default()
    };
    assert!(bad_name.validate().is_err());
}

#[test]
fn test_config_from_partial_json() {
    let config: AdapterConfig = serde_json::from_str(r#"{ "chunk_size": 3200 }"#).unwrap();
    assert_eq!(config.chunk_size, 3200);
    assert_eq!(config.prefetch, AdapterConfig::default().prefetch);
    assert_eq!(config.worker_name, "chunk-stream");
}

#[test]
fn test_config_json_roundtrip() {
    let config = AdapterConfig {
        worker_name: "upload".to_string(),
        ..AdapterConfig::high_throughput()
    };
    let json = serde_json::to_string(&config).unwrap();
    let parsed: AdapterConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_reader_publisher_uses_config_chunk_size() {
    let config = AdapterConfig {
        chunk_size: 100,
        ..Default::default()
    };
    let publisher =
        ChunkPublisher::from_reader(std::io::Cursor::new(vec![0u8; 250]), config).unwrap();
    assert_eq!(publisher.config().chunk_size, 100);
    assert!(!publisher.is_subscribed());
}
