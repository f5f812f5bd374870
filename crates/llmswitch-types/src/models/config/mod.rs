//! Hub configuration models.

mod enums;
mod hub;

pub use enums::{Protocol, Stage};
pub use hub::{GeminiEnvelopeConfig, HubConfig, SignatureCacheConfig, ToolGovernanceConfig};
