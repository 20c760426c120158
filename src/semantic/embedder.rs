//! Text embedding for semantic intent lookup

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Default dimension for the offline hashing embedder
pub const HASHING_DIM: usize = 256;

/// Turns text into fixed-length vectors
///
/// Implementations must be deterministic for the lifetime of a process so
/// distances between stored and query vectors stay comparable.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier stored next to each vector (model name + dimension family)
    fn model_id(&self) -> &str;

    /// Generate embeddings for multiple texts, in input order
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
    }
}

/// Embedder backed by an `OpenAI`-compatible embeddings endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiEmbedder {
    /// Create a new embedder with an API key
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn new(api_key: SecretString, base_url: &str, model: &str) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("API key required for embeddings".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        #[derive(serde::Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            input: &'a [&'a str],
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
            index: usize,
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("embedding API error {status}: {body}")));
        }

        let mut result: EmbeddingResponse = response.json().await?;

        // Sort by index to maintain input order
        result.data.sort_by_key(|d| d.index);

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Offline embedder using signed feature hashing over words and character trigrams
///
/// Stable across processes and platforms, needs no model download, and is
/// good enough to separate short intent descriptions.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    model_id: String,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(HASHING_DIM)
    }
}

impl HashingEmbedder {
    /// Create a hashing embedder with the given dimension
    #[must_use]
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(8);
        Self {
            dim,
            model_id: format!("hashing-sha256-{dim}"),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dim];
        let lower = text.to_lowercase();

        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.add_feature(&mut vector, word, 1.0);

            let padded: Vec<char> = format!("#{word}#").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vector, &gram, 0.5);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket = [0_u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dim as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Serialize embedding to little-endian f32 bytes for `SQLite` storage
#[must_use]
pub fn to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize embedding from bytes
#[must_use]
pub fn from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().unwrap_or([0; 4]);
            f32::from_le_bytes(arr)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_bytes_roundtrip() {
        let embedding = vec![1.0, 2.5, -3.25, 0.0, 100.0];
        let restored = from_bytes(&to_bytes(&embedding));
        assert_eq!(embedding, restored);
    }

    #[test]
    fn test_empty_api_key() {
        let result = OpenAiEmbedder::new(
            SecretString::from(String::new()),
            "https://api.openai.com/v1",
            "text-embedding-3-small",
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn hashing_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("What's the weather like?").await.unwrap();
        let b = embedder.embed("What's the weather like?").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HASHING_DIM);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn hashing_prefers_shared_words() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("weather forecast").await.unwrap();
        let weather = embedder.embed("current weather for a city").await.unwrap();
        let alarm = embedder.embed("set alarms and reminders").await.unwrap();
        assert!(cosine(&query, &weather) > cosine(&query, &alarm));
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed("   ").await.unwrap();
        assert!(v.iter().all(|x| x.abs() < f32::EPSILON));
    }
}
