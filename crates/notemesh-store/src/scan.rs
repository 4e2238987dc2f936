//! Linear similarity scan shared by the store implementations.

use tracing::warn;

use notemesh_core::{cosine_similarity, FindSimilarOptions, Result, SimilarHit, StoredEmbedding};

/// Scan records by cosine similarity against a query vector.
///
/// Keeps hits at or above the threshold that are not excluded, sorted by
/// similarity descending with a stable sort, so equal scores preserve the
/// iteration order of `records`, keeping results reproducible for
/// identical inputs. Records whose dimension does not match the query
/// (left over from an earlier embedding model) are skipped with a warning
/// rather than failing the scan.
pub(crate) fn scan_similar<'a>(
    records: impl Iterator<Item = &'a StoredEmbedding>,
    query: &[f32],
    opts: &FindSimilarOptions,
) -> Result<Vec<SimilarHit>> {
    let mut hits: Vec<SimilarHit> = Vec::new();

    for record in records {
        if opts.exclude_ids.contains(&record.note_id) {
            continue;
        }
        if record.vector.len() != query.len() {
            warn!(
                note_id = %record.note_id,
                stored_dim = record.vector.len(),
                query_dim = query.len(),
                "Skipping record with mismatched dimension"
            );
            continue;
        }

        let similarity = cosine_similarity(query, &record.vector)?;
        if similarity >= opts.threshold {
            hits.push(SimilarHit {
                note_id: record.note_id.clone(),
                note_path: record.note_path.clone(),
                title: record.title.clone(),
                similarity,
            });
        }
    }

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(opts.limit);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notemesh_core::NoteId;

    fn record(id: &str, vector: Vec<f32>) -> StoredEmbedding {
        StoredEmbedding::new(
            NoteId::new(id).unwrap(),
            format!("notes/{}.md", id),
            format!("Note {}", id),
            "hash",
            vector,
            "mock-embed",
            "mock",
        )
        .unwrap()
    }

    #[test]
    fn test_scan_sorts_descending_and_truncates() {
        let records = vec![
            record("202401010001", vec![1.0, 0.0]),
            record("202401010002", vec![0.9, 0.1]),
            record("202401010003", vec![0.0, 1.0]),
        ];
        let opts = FindSimilarOptions {
            limit: 2,
            threshold: 0.0,
            exclude_ids: vec![],
        };

        let hits = scan_similar(records.iter(), &[1.0, 0.0], &opts).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].note_id.as_str(), "202401010001");
        assert_eq!(hits[1].note_id.as_str(), "202401010002");
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[test]
    fn test_scan_applies_threshold() {
        let records = vec![
            record("202401010001", vec![1.0, 0.0]),
            record("202401010002", vec![0.0, 1.0]),
        ];
        let opts = FindSimilarOptions {
            limit: 10,
            threshold: 0.5,
            exclude_ids: vec![],
        };

        let hits = scan_similar(records.iter(), &[1.0, 0.0], &opts).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].note_id.as_str(), "202401010001");
    }

    #[test]
    fn test_scan_excludes_ids() {
        let records = vec![
            record("202401010001", vec![1.0, 0.0]),
            record("202401010002", vec![1.0, 0.0]),
        ];
        let opts = FindSimilarOptions {
            limit: 10,
            threshold: 0.0,
            exclude_ids: vec![NoteId::new("202401010001").unwrap()],
        };

        let hits = scan_similar(records.iter(), &[1.0, 0.0], &opts).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].note_id.as_str(), "202401010002");
    }

    #[test]
    fn test_scan_skips_mismatched_dimensions() {
        let records = vec![
            record("202401010001", vec![1.0, 0.0, 0.0]),
            record("202401010002", vec![1.0, 0.0]),
        ];
        let opts = FindSimilarOptions {
            limit: 10,
            threshold: 0.0,
            exclude_ids: vec![],
        };

        let hits = scan_similar(records.iter(), &[1.0, 0.0], &opts).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].note_id.as_str(), "202401010002");
    }

    #[test]
    fn test_scan_ties_preserve_iteration_order() {
        // Identical vectors tie exactly; stable sort keeps input order.
        let records = vec![
            record("202401010003", vec![1.0, 0.0]),
            record("202401010001", vec![1.0, 0.0]),
            record("202401010002", vec![1.0, 0.0]),
        ];
        let opts = FindSimilarOptions {
            limit: 10,
            threshold: 0.0,
            exclude_ids: vec![],
        };

        let hits = scan_similar(records.iter(), &[1.0, 0.0], &opts).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.note_id.as_str()).collect();
        assert_eq!(ids, vec!["202401010003", "202401010001", "202401010002"]);
    }
}
