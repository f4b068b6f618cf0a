//! Vector store backends
//!
//! Four adapters behind the uniform [`VectorBackend`] contract: the host's
//! local file-backed store, the host-plugin columnar store, and the Qdrant
//! and Milvus remote servers. Each registers into `VECTOR_BACKENDS`.
//!
//! [`VectorBackend`]: vecthare_domain::ports::VectorBackend

#[cfg(feature = "backend-lancedb")]
mod lancedb;
#[cfg(feature = "backend-milvus")]
mod milvus;
#[cfg(feature = "backend-qdrant")]
mod qdrant;
#[cfg(feature = "backend-standard")]
mod standard;

#[cfg(feature = "backend-lancedb")]
pub use lancedb::LanceDbBackend;
#[cfg(feature = "backend-milvus")]
pub use milvus::MilvusBackend;
#[cfg(feature = "backend-qdrant")]
pub use qdrant::{
    QdrantBackend, assemble_url, build_points, physical_collection_name, tenant_filter,
};
#[cfg(feature = "backend-standard")]
pub use standard::StandardBackend;

use vecthare_domain::error::{Error, Result};
use vecthare_domain::value_objects::{Chunk, CollectionId};

/// Recognize a server-reported dimension mismatch (`expected dim: X, got Y`
/// and close variants) and promote it to the typed error.
pub fn parse_dimension_error(collection: &CollectionId, message: &str) -> Option<Error> {
    let lower = message.to_lowercase();
    let idx = lower.find("expected dim")?;
    let tail = &lower[idx..];

    let mut numbers = tail
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<usize>().ok());
    let expected = numbers.next()?;
    let got = numbers.next()?;
    Some(Error::dimension_mismatch(collection.to_string(), expected, got))
}

/// Verify every vector in an insert batch has the same length, and that it
/// matches the collection's established dimensions when known.
///
/// Runs before anything is sent, so a mismatch never leaves a partial
/// write behind. Returns the batch's dimension, or `None` when no chunk
/// carries a vector (server-side embedding).
pub fn validate_batch_dimensions(
    collection: &CollectionId,
    chunks: &[Chunk],
    expected: Option<usize>,
) -> Result<Option<usize>> {
    let mut batch_dims: Option<usize> = expected;

    for chunk in chunks {
        let Some(vector) = &chunk.vector else {
            continue;
        };
        match batch_dims {
            None => batch_dims = Some(vector.len()),
            Some(dims) if dims != vector.len() => {
                return Err(Error::dimension_mismatch(
                    collection.to_string(),
                    dims,
                    vector.len(),
                ));
            }
            Some(_) => {}
        }
    }

    Ok(batch_dims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecthare_domain::value_objects::ChunkMetadata;

    fn collection() -> CollectionId {
        CollectionId::new("chat", "abc")
    }

    #[test]
    fn server_dimension_errors_are_recognized() {
        let err =
            parse_dimension_error(&collection(), "Wrong input: expected dim: 384, got 768")
                .unwrap();
        match err {
            Error::DimensionMismatch {
                expected,
                got,
                ref collection,
            } => {
                assert_eq!(expected, 384);
                assert_eq!(got, 768);
                assert_eq!(collection, "vh:chat:abc");
            }
            ref other => panic!("unexpected error {other:?}"),
        }
        assert!(err.is_fixable());
    }

    #[test]
    fn unrelated_errors_pass_through() {
        assert!(parse_dimension_error(&collection(), "connection refused").is_none());
    }

    #[test]
    fn mixed_batch_dimensions_are_rejected_before_send() {
        let good = Chunk::new("a", 0, ChunkMetadata::default()).with_vector(vec![0.0; 384]);
        let bad = Chunk::new("b", 1, ChunkMetadata::default()).with_vector(vec![0.0; 768]);

        let err = validate_batch_dimensions(&collection(), &[good.clone(), bad], None).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 384, got: 768, .. }));

        // Against established collection dims
        let err = validate_batch_dimensions(&collection(), &[good.clone()], Some(768)).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 768, got: 384, .. }));

        // Consistent batch passes and reports its dimension
        assert_eq!(
            validate_batch_dimensions(&collection(), &[good], Some(384)).unwrap(),
            Some(384)
        );
    }

    #[test]
    fn vectorless_batches_are_fine() {
        let chunk = Chunk::new("server side", 0, ChunkMetadata::default());
        assert_eq!(
            validate_batch_dimensions(&collection(), &[chunk], None).unwrap(),
            None
        );
    }
}
