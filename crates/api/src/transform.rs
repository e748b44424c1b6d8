//! The pluggable try-on transform.
//!
//! The worker only knows this trait: two stored input images in, output
//! image bytes out, or a typed failure. [`MockTransform`] is the reference
//! implementation used until a real model is wired in — it copies the user
//! image to the output and can synthesize domain failures.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tryon_core::session::{TransformError, DOMAIN_FAILURE_REASONS};
use uuid::Uuid;

/// Inputs handed to a transform run. Both paths point at assets already
/// persisted by the storage service.
#[derive(Debug)]
pub struct TransformInput<'a> {
    pub session_id: Uuid,
    pub user_image: &'a Path,
    pub garment_image: &'a Path,
}

/// A produced output image, saved by the worker under the `output` role.
#[derive(Debug)]
pub struct TransformOutput {
    pub bytes: Vec<u8>,
    pub ext: String,
}

/// Strategy interface for the try-on generation step.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn run(&self, input: TransformInput<'_>) -> Result<TransformOutput, TransformError>;
}

/// Placeholder transform: sleeps for a configurable duration, then either
/// fails with one of the fixed domain reasons or echoes the user image
/// back as the output.
pub struct MockTransform {
    pub processing_delay: Duration,
    /// Probability in `0.0..=1.0` of a simulated domain failure.
    pub failure_rate: f64,
}

#[async_trait]
impl Transform for MockTransform {
    async fn run(&self, input: TransformInput<'_>) -> Result<TransformOutput, TransformError> {
        tokio::time::sleep(self.processing_delay).await;

        let simulated_failure = {
            use rand::Rng;
            let mut rng = rand::rng();
            if rng.random::<f64>() < self.failure_rate {
                Some(DOMAIN_FAILURE_REASONS[rng.random_range(0..DOMAIN_FAILURE_REASONS.len())])
            } else {
                None
            }
        };
        if let Some(reason) = simulated_failure {
            return Err(TransformError::Domain(reason));
        }

        let bytes = tokio::fs::read(input.user_image)
            .await
            .map_err(|e| TransformError::Storage(format!("reading user image: {e}")))?;

        let ext = input
            .user_image
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("png")
            .to_string();

        Ok(TransformOutput { bytes, ext })
    }
}
