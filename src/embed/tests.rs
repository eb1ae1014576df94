//! Tests for the embedding provider chain

use super::*;

struct FixedEmbedder {
    name: &'static str,
    dim: usize,
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    fn name(&self) -> &str {
        self.name
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(vec![0.5; self.dim])
    }
}

struct BrokenEmbedder;

#[async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    fn name(&self) -> &str {
        "broken"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError::RequestFailed {
            provider: "broken".to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

#[tokio::test]
async fn test_first_provider_wins() {
    let service = EmbeddingService::new(vec![
        Arc::new(FixedEmbedder { name: "primary", dim: 8 }),
        Arc::new(FixedEmbedder { name: "secondary", dim: 16 }),
    ]);

    let vec = service.embed("some document text").await;
    assert_eq!(vec.len(), 8);
    assert_eq!(service.native_dim(), 8);
}

#[tokio::test]
async fn test_chain_falls_through_on_failure() {
    let service = EmbeddingService::new(vec![
        Arc::new(BrokenEmbedder),
        Arc::new(FixedEmbedder { name: "backup", dim: 16 }),
    ]);

    let vec = service.embed("some document text").await;
    assert_eq!(vec.len(), 16);
    assert_eq!(service.native_dim(), 16);
}

#[tokio::test]
async fn test_total_failure_yields_zero_vector() {
    let service = EmbeddingService::new(vec![Arc::new(BrokenEmbedder)]);

    let vec = service.embed("some document text").await;
    assert_eq!(vec.len(), DEFAULT_EMBED_DIM);
    assert!(vec.iter().all(|v| *v == 0.0));
}

#[tokio::test]
async fn test_empty_text_is_zero_vector() {
    let service = EmbeddingService::new(vec![Arc::new(FixedEmbedder { name: "p", dim: 4 })]);
    let vec = service.embed("   ").await;
    assert!(vec.iter().all(|v| *v == 0.0));
}

#[tokio::test]
async fn test_dimension_remembered_across_failures() {
    let service = EmbeddingService::new(vec![Arc::new(FixedEmbedder { name: "p", dim: 12 })]);
    service.embed("first call").await;

    // Chain exhaustion afterwards keeps the learned dimension
    let failing = EmbeddingService::new(vec![Arc::new(BrokenEmbedder)]);
    failing.last_known_dim.store(service.native_dim(), Ordering::Relaxed);
    let vec = failing.embed("second call").await;
    assert_eq!(vec.len(), 12);
}

#[tokio::test]
async fn test_embed_matching_dim_prefers_native_match() {
    let service = EmbeddingService::new(vec![
        Arc::new(FixedEmbedder { name: "small", dim: 8 }),
        Arc::new(FixedEmbedder { name: "large", dim: 16 }),
    ]);

    let vec = service.embed_matching_dim("query", 16).await;
    assert_eq!(vec.len(), 16);
    // Came from the second provider natively, not from padding
    assert!(vec.iter().all(|v| *v == 0.5));
}

#[tokio::test]
async fn test_embed_matching_dim_pads_as_last_resort() {
    let service = EmbeddingService::new(vec![Arc::new(FixedEmbedder { name: "small", dim: 8 })]);

    let vec = service.embed_matching_dim("query", 12).await;
    assert_eq!(vec.len(), 12);
    assert!(vec[..8].iter().all(|v| *v == 0.5));
    assert!(vec[8..].iter().all(|v| *v == 0.0));
}

#[test]
fn test_truncate_keeps_head_and_tail() {
    let service = EmbeddingService::new(vec![]);
    let text = format!("{}{}{}", "A".repeat(15_000), "B".repeat(15_000), "C".repeat(15_000));
    let truncated = service.truncate(&text);

    assert!(truncated.len() < text.len());
    assert!(truncated.starts_with('A'));
    assert!(truncated.ends_with('C'));
    assert!(truncated.contains("\n...\n"));
}

#[test]
fn test_truncate_short_text_unchanged() {
    let service = EmbeddingService::new(vec![]);
    assert_eq!(service.truncate("short"), "short");
}
