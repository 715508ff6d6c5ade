//! TypeScript Generation Tests
//!
//! Validates that mocapflow's data types can be exported to TypeScript
//! when the tauri feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_core_types_implement_specta_type() {
    use specta::Type;

    fn assert_type<T: Type>() {}

    // Stream data
    assert_type::<mocapflow::types::MarkerSample>();
    assert_type::<mocapflow::types::LabeledMarkerSample>();
    assert_type::<mocapflow::types::RigidBodySample>();
    assert_type::<mocapflow::types::MarkerSet>();
    assert_type::<mocapflow::types::FrameOfData>();

    // Negotiation state
    assert_type::<mocapflow::types::MessageId>();
    assert_type::<mocapflow::types::ProtocolVersion>();
    assert_type::<mocapflow::types::ServerDescription>();
    assert_type::<mocapflow::ClientState>();

    // Analytics
    assert_type::<mocapflow::tracking::PersistedRow>();
    assert_type::<mocapflow::tracking::Position>();
    assert_type::<mocapflow::tracking::Smoothing>();
    assert_type::<mocapflow::tracking::TrackerConfig>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types must still build without specta::Type
    let config = mocapflow::TrackerConfig::default();
    assert_eq!(config.smoothing, mocapflow::Smoothing::Disabled);
}
