//! AI vision provider integration.
//!
//! Two providers implement [`VisionProvider`]:
//! - **Remote**: POSTs the image to `AI_VISION_URL` and parses the analysis
//! - **Stub**: deterministic offline analysis, used when no URL is configured
//!
//! The choice is made once at startup by [`create_vision_provider`].

mod provider;
mod remote;
mod stub;

pub use provider::{ProviderAnalysis, VisionProvider};
pub use remote::{ANALYSIS_PROMPT, RemoteVisionProvider, analysis_schema};
pub use stub::StubVisionProvider;

use std::sync::Arc;

use crate::config::VisionConfig;
use crate::error::VisionError;

/// Create the vision provider selected by configuration.
pub fn create_vision_provider(
    config: &VisionConfig,
) -> Result<Arc<dyn VisionProvider>, VisionError> {
    match &config.url {
        Some(url) => {
            tracing::info!(url = %url, "Using remote AI vision provider");
            Ok(Arc::new(RemoteVisionProvider::new(config.clone())?))
        }
        None => {
            tracing::warn!("AI_VISION_URL not configured, using stub vision analysis");
            Ok(Arc::new(StubVisionProvider))
        }
    }
}
