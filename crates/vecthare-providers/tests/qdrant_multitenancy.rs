//! Qdrant request-shape tests: the multitenancy layout must route every
//! operation to the shared physical collection with a content_type filter,
//! while separate-collection mode uses per-collection names and no filter.

use serde_json::json;

use vecthare_application::registry::QdrantSettings;
use vecthare_domain::value_objects::{Chunk, ChunkMetadata, CollectionId, MULTITENANCY_COLLECTION};
use vecthare_providers::vector_store::{
    QdrantBackend, assemble_url, build_points, physical_collection_name, tenant_filter,
};

fn logical() -> CollectionId {
    CollectionId::parse("vh:chat:abc").unwrap()
}

#[test]
fn multitenancy_routes_to_the_shared_collection() {
    assert_eq!(
        physical_collection_name(true, &logical()),
        MULTITENANCY_COLLECTION
    );
    assert_eq!(physical_collection_name(true, &logical()), "vecthare_multitenancy");
}

#[test]
fn separate_mode_uses_per_collection_names() {
    assert_eq!(physical_collection_name(false, &logical()), "vecthare_chat_abc");
    assert!(tenant_filter(false, &logical()).is_none());
}

#[test]
fn multitenancy_filter_matches_the_logical_id_exactly() {
    let filter = tenant_filter(true, &logical()).unwrap();
    assert_eq!(
        filter,
        json!({
            "must": [
                { "key": "content_type", "match": { "value": "vh:chat:abc" } }
            ]
        })
    );
}

#[test]
fn inserted_points_carry_the_content_type_tag() {
    let chunk = Chunk::new("hello world", 0, ChunkMetadata::with_source("chat"))
        .with_vector(vec![0.1, 0.2, 0.3]);
    let points = build_points(true, &logical(), std::slice::from_ref(&chunk));

    assert_eq!(points.len(), 1);
    let point = &points[0];
    assert_eq!(point["id"], chunk.hash);
    assert_eq!(point["payload"]["content_type"], "vh:chat:abc");
    assert_eq!(point["payload"]["hash"], chunk.hash);
    assert_eq!(point["payload"]["text"], "hello world");
    assert_eq!(point["vector"].as_array().unwrap().len(), 3);
}

#[test]
fn separate_mode_points_omit_the_tenant_tag() {
    let chunk = Chunk::new("hello world", 0, ChunkMetadata::default()).with_vector(vec![0.1]);
    let points = build_points(false, &logical(), std::slice::from_ref(&chunk));
    assert!(points[0]["payload"].get("content_type").is_none());
}

#[test]
fn enveloped_ids_produce_identical_request_shapes() {
    // Registry-key and plain forms must resolve to the same physical
    // collection and filter
    let plain = CollectionId::parse("vh:chat:abc").unwrap();
    let enveloped = CollectionId::parse("qdrant:openai:vh:chat:abc").unwrap();

    assert_eq!(
        physical_collection_name(true, &plain),
        physical_collection_name(true, &enveloped)
    );
    assert_eq!(tenant_filter(true, &plain), tenant_filter(true, &enveloped));
    assert_eq!(
        physical_collection_name(false, &plain),
        physical_collection_name(false, &enveloped)
    );
}

#[test]
fn url_assembly_honours_cloud_and_port_settings() {
    let explicit = QdrantSettings {
        url: Some("https://cluster.qdrant.io:6333/".to_string()),
        ..QdrantSettings::default()
    };
    assert_eq!(assemble_url(&explicit).unwrap(), "https://cluster.qdrant.io:6333");

    let host_port = QdrantSettings {
        host: Some("localhost".to_string()),
        port: Some(7000),
        ..QdrantSettings::default()
    };
    assert_eq!(assemble_url(&host_port).unwrap(), "http://localhost:7000");

    let cloud = QdrantSettings {
        host: Some("cluster.qdrant.io".to_string()),
        use_cloud: true,
        ..QdrantSettings::default()
    };
    assert_eq!(assemble_url(&cloud).unwrap(), "https://cluster.qdrant.io:6333");

    let missing = QdrantSettings::default();
    assert!(assemble_url(&missing).is_err());

    let invalid = QdrantSettings {
        url: Some("not a url".to_string()),
        ..QdrantSettings::default()
    };
    assert!(assemble_url(&invalid).is_err());
}

#[test]
fn backend_constructs_without_network() {
    // Construction is synchronous and offline; transport opens lazily
    let _backend = QdrantBackend::new(
        "http://localhost:6333".to_string(),
        None,
        true,
        None,
        reqwest::Client::new(),
    );
}
