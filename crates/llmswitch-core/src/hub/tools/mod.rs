//! Tool-call governance.
//!
//! Leaves first: argument repair, name inference, text markup extraction and
//! thinking-wrapper stripping are pure functions; the registry validates
//! calls; the canonicalizer applies all of them to canonical payloads.

pub mod arguments;
pub mod canonicalizer;
pub mod inference;
pub mod registry;
pub mod text_markup;
pub mod thinking;

pub use arguments::{normalize_arguments, parse_or_repair, serialize_arguments, ArgumentError};
pub use canonicalizer::{
    harvest_message, harvest_validated, should_harvest, value_to_text, CanonicalizeReport, DroppedCall, Side,
    ToolCanonicalizer,
};
pub use inference::{infer_from_keys, infer_tool_name};
pub use registry::{PermissiveToolRegistry, SchemaToolRegistry, ToolRegistry, ToolValidation};
pub use text_markup::{extract_tool_calls, has_tool_markup, ExtractedCall};
pub use thinking::strip_thinking_tags;
