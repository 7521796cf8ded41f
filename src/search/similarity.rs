use crate::util::small_float;

/// Scoring primitives shared by the index and search paths
///
/// The default implementations are the classic tf/idf family; an index
/// written with one similarity should be searched with the same one, since
/// norms bake `length_norm` into a single byte.
pub trait Similarity: Send + Sync {
    fn tf(&self, freq: f32) -> f32 {
        freq.sqrt()
    }

    fn idf(&self, doc_freq: u32, num_docs: u32) -> f32 {
        (num_docs as f32 / (doc_freq as f32 + 1.0)).ln() + 1.0
    }

    fn length_norm(&self, _field: &str, num_terms: u32) -> f32 {
        if num_terms == 0 {
            0.0
        } else {
            1.0 / (num_terms as f32).sqrt()
        }
    }

    fn query_norm(&self, sum_of_squared_weights: f32) -> f32 {
        if sum_of_squared_weights <= 0.0 {
            1.0
        } else {
            1.0 / sum_of_squared_weights.sqrt()
        }
    }

    /// Contribution of a sloppy phrase match `distance` edits away
    fn sloppy_freq(&self, distance: u32) -> f32 {
        1.0 / (distance as f32 + 1.0)
    }

    /// Reward for matching more optional clauses
    fn coord(&self, overlap: u32, max_overlap: u32) -> f32 {
        if max_overlap == 0 {
            1.0
        } else {
            overlap as f32 / max_overlap as f32
        }
    }

    fn encode_norm_value(&self, f: f32) -> u8 {
        small_float::float_to_byte(f)
    }

    fn decode_norm_value(&self, b: u8) -> f32 {
        small_float::byte_to_float(b)
    }

    /// Score contribution of one payload occurrence; the default ignores
    /// payload contents
    fn score_payload(&self, _field: &str, _payload: &[u8]) -> f32 {
        1.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSimilarity;

impl Similarity for DefaultSimilarity {}

/// Reads the payload's first byte as the occurrence score
///
/// Pairs with analyzers that attach small integer payloads to boost
/// individual term occurrences.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadByteSimilarity;

impl Similarity for PayloadByteSimilarity {
    fn score_payload(&self, _field: &str, payload: &[u8]) -> f32 {
        payload.first().copied().map(f32::from).unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shapes() {
        let sim = DefaultSimilarity;
        assert_eq!(sim.tf(4.0), 2.0);
        assert!(sim.idf(1, 100) > sim.idf(50, 100));
        assert_eq!(sim.sloppy_freq(0), 1.0);
        assert_eq!(sim.coord(2, 4), 0.5);
        let norm = sim.encode_norm_value(sim.length_norm("body", 4));
        assert!(sim.decode_norm_value(norm) > 0.0);
    }
}
