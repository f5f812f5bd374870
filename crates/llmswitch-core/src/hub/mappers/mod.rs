//! Wire protocol <-> canonical mappers.
//!
//! Each protocol module exposes the same four conversions; the codec
//! registry pairs a source module with a target module.

pub mod claude;
pub mod gemini;
pub mod openai;
