//! Cross-module domain invariants.

use vecthare_domain::hash::string_hash;
use vecthare_domain::similarity::cosine_similarity;
use vecthare_domain::value_objects::{BackendKind, Chunk, ChunkMetadata, CollectionId, Keyword};

#[test]
fn hashes_are_deterministic_across_representations() {
    let texts = [
        "plain ascii",
        "with\nnewlines\tand tabs",
        "ünïcödé — em-dash",
        "",
    ];
    for text in texts {
        assert_eq!(string_hash(text), string_hash(text));
    }
}

#[test]
fn chunk_hash_covers_embedded_keywords() {
    let mut metadata = ChunkMetadata::default();
    metadata.keywords = vec![Keyword::new("dragon", 1.5)];
    let chunk = Chunk::new("The dragon wakes", 0, metadata);

    let annotated = chunk.text_with_embedded_keywords();
    assert_eq!(annotated, "The dragon wakes [KEYWORDS: dragon]");

    // The annotated form hashes as one string, distinct from the bare text
    let stored = Chunk::new(annotated, 0, ChunkMetadata::default());
    assert_ne!(stored.hash, chunk.hash);
    assert_eq!(stored.hash, string_hash(&stored.text));
}

#[test]
fn every_accepted_id_form_is_one_logical_collection() {
    let forms = [
        "vh:chat:abc",
        "vecthare_chat_abc",
        "qdrant:openai:vh:chat:abc",
        "standard:transformers:vecthare_chat_abc",
        "vectra:ollama:vh:chat:abc",
    ];
    let parsed: Vec<CollectionId> = forms
        .iter()
        .map(|f| CollectionId::parse(f).unwrap())
        .collect();
    for id in &parsed {
        assert_eq!(id, &parsed[0]);
        assert_eq!(id.to_string(), "vh:chat:abc");
        assert_eq!(id.legacy_string(), "vecthare_chat_abc");
    }
}

#[test]
fn backend_kinds_are_a_closed_set_with_one_alias() {
    for (name, expected) in [
        ("standard", BackendKind::Standard),
        ("vectra", BackendKind::Standard),
        ("lancedb", BackendKind::LanceDb),
        ("qdrant", BackendKind::Qdrant),
        ("milvus", BackendKind::Milvus),
    ] {
        assert_eq!(BackendKind::normalize(name).unwrap(), expected);
    }
    assert!(BackendKind::normalize("weaviate").is_err());
}

#[test]
fn cosine_similarity_contract() {
    let a = vec![0.6, -0.8, 0.0];
    let b = vec![0.3, 0.9, -0.2];

    // Bounded, symmetric, self-similarity of 1
    let s = cosine_similarity(&a, &b);
    assert!((-1.0..=1.0).contains(&s));
    assert_eq!(s, cosine_similarity(&b, &a));
    assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);

    // Magnitude-invariant
    let scaled: Vec<f32> = a.iter().map(|x| x * 42.0).collect();
    assert!((cosine_similarity(&scaled, &b) - s).abs() < 1e-5);
}

#[test]
fn chunk_serialization_round_trips() {
    let mut metadata = ChunkMetadata::with_source("chat");
    metadata.message_id = Some(7);
    metadata.keywords = vec![Keyword::new("fox", 1.25)];
    let chunk = Chunk::new("A fox appears", 3, metadata).with_vector(vec![0.1, 0.2]);

    let json = serde_json::to_string(&chunk).unwrap();
    let back: Chunk = serde_json::from_str(&json).unwrap();
    assert_eq!(back, chunk);
}
