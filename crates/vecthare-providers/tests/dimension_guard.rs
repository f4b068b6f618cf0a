//! Dimension-mismatch guarding: a model switch must surface a typed,
//! fixable error before any partial write reaches a collection.

use vecthare_domain::error::{Error, FixAction};
use vecthare_domain::value_objects::{Chunk, ChunkMetadata, CollectionId};
use vecthare_providers::vector_store::{parse_dimension_error, validate_batch_dimensions};

fn chunk_with_dims(text: &str, dims: usize) -> Chunk {
    Chunk::new(text, 0, ChunkMetadata::default()).with_vector(vec![0.5; dims])
}

#[test]
fn model_switch_is_rejected_with_remediation() {
    // The collection was built at 384 dimensions; the provider now produces
    // 768-dimension vectors
    let collection = CollectionId::parse("vh:doc:guide").unwrap();
    let batch = vec![
        chunk_with_dims("first", 768),
        chunk_with_dims("second", 768),
    ];

    let err = validate_batch_dimensions(&collection, &batch, Some(384)).unwrap_err();
    match &err {
        Error::DimensionMismatch {
            collection: id,
            expected,
            got,
        } => {
            assert_eq!(id, "vh:doc:guide");
            assert_eq!(*expected, 384);
            assert_eq!(*got, 768);
        }
        other => panic!("expected DimensionMismatch, got {other:?}"),
    }

    // The error names both dimensions and the remediation
    let text = err.to_string();
    assert!(text.contains("expected 384"));
    assert!(text.contains("got 768"));
    assert!(err.is_fixable());
    assert_eq!(err.fix_action(), Some(FixAction::Revectorize));
}

#[test]
fn inconsistent_batches_never_reach_the_wire() {
    let collection = CollectionId::parse("vh:chat:abc").unwrap();
    let batch = vec![chunk_with_dims("a", 384), chunk_with_dims("b", 512)];
    assert!(validate_batch_dimensions(&collection, &batch, None).is_err());
}

#[test]
fn matching_batches_pass_and_establish_dimensions() {
    let collection = CollectionId::parse("vh:chat:abc").unwrap();
    let batch = vec![chunk_with_dims("a", 384), chunk_with_dims("b", 384)];
    assert_eq!(
        validate_batch_dimensions(&collection, &batch, None).unwrap(),
        Some(384)
    );
    assert_eq!(
        validate_batch_dimensions(&collection, &batch, Some(384)).unwrap(),
        Some(384)
    );
}

#[test]
fn server_reported_mismatches_are_promoted() {
    let collection = CollectionId::parse("vh:chat:abc").unwrap();
    for message in [
        "Wrong input: expected dim: 384, got 768",
        "Bad request: EXPECTED DIM: 384, GOT: 768",
    ] {
        let err = parse_dimension_error(&collection, message).expect(message);
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 384,
                got: 768,
                ..
            }
        ));
    }

    assert!(parse_dimension_error(&collection, "timeout talking to server").is_none());
}
