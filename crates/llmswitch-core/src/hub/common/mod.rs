//! Helpers shared by codecs, filters and the tool canonicalizer.

pub mod json_schema;
pub mod random_id;

pub use json_schema::{clean_schema_for_gemini, fix_tool_call_args, lowercase_schema_types, prune_schema_keyword};
pub use random_id::{generate_call_id, generate_random_id};
