pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 256;

/// Boundary to the embedding provider: one fixed-length vector per text,
/// deterministic for a given model version.
pub trait Embedder {
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Offline default: hashed character trigrams over whitespace-normalized,
/// lowercased text, L2-normalized. Deterministic and dependency-free, which
/// keeps ingestion and the test suite runnable without a model server; a
/// deployment swaps in a model-backed implementation behind the same trait.
#[derive(Debug, Clone, Copy)]
pub struct HashedTrigramEmbedder {
    pub dimensions: usize,
}

impl Default for HashedTrigramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

fn fnv1a(bytes: impl Iterator<Item = u8>) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

impl Embedder for HashedTrigramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];

        let normalized = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let chars: Vec<char> = normalized.chars().collect();
        if chars.is_empty() {
            return vector;
        }

        if chars.len() < 3 {
            let bucket = fnv1a(normalized.bytes()) as usize % vector.len();
            vector[bucket] += 1.0;
        } else {
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let bucket = fnv1a(trigram.bytes()) as usize % vector.len();
                vector[bucket] += 1.0;
            }
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

/// Cosine distance between two unit-or-arbitrary vectors; 0.0 is identical,
/// values grow toward 2.0 as vectors diverge. Mismatched or zero vectors
/// score as maximally distant.
pub fn cosine_distance(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() {
        return 2.0;
    }
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let norm_left: f32 = left.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_right: f32 = right.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_left == 0.0 || norm_right == 0.0 {
        return 2.0;
    }
    1.0 - dot / (norm_left * norm_right)
}
