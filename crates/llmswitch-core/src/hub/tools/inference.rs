//! Tool-name inference from argument shape.
//!
//! Used when a model emits arguments without a function name. The checks run
//! in a fixed order and the first match wins, so an argument object carrying
//! both `command` and `path` is always a `shell` call. That precedence is
//! ambiguous for some inputs and is kept exactly as is.

use serde_json::{Map, Value};

pub const SHELL: &str = "shell";
pub const APPLY_PATCH: &str = "apply_patch";
pub const UPDATE_PLAN: &str = "update_plan";
pub const VIEW_IMAGE: &str = "view_image";
pub const READ_MCP_RESOURCE: &str = "read_mcp_resource";

pub const PATCH_BEGIN: &str = "*** Begin Patch";
pub const PATCH_END: &str = "*** End Patch";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "tif", "tiff", "svg"];

/// Name inference over bare argument keys (text markup without a function name).
///
/// `command` => shell, `patch` => apply_patch, `plan` => update_plan,
/// image `path` => view_image. Anything else stays unnamed.
pub fn infer_from_keys(args: &Map<String, Value>) -> Option<&'static str> {
    if args.contains_key("command") {
        return Some(SHELL);
    }
    if args.contains_key("patch") {
        return Some(APPLY_PATCH);
    }
    if args.contains_key("plan") {
        return Some(UPDATE_PLAN);
    }
    if args.get("path").and_then(Value::as_str).is_some_and(is_image_path) {
        return Some(VIEW_IMAGE);
    }
    None
}

/// Name inference for structured calls: the key chain first, then shape signals.
pub fn infer_tool_name(args: &Map<String, Value>) -> Option<&'static str> {
    if let Some(name) = infer_from_keys(args) {
        return Some(name);
    }
    if args.get("steps").is_some_and(is_status_list) {
        return Some(UPDATE_PLAN);
    }
    if args.contains_key("server") && args.contains_key("uri") {
        return Some(READ_MCP_RESOURCE);
    }
    if args.get("input").and_then(Value::as_str).is_some_and(|s| s.contains(PATCH_BEGIN)) {
        return Some(APPLY_PATCH);
    }
    None
}

pub fn is_image_path(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn is_status_list(v: &Value) -> bool {
    v.as_array().is_some_and(|items| {
        !items.is_empty() && items.iter().all(|item| item.get("status").is_some())
    })
}
