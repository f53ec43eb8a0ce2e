//! Common serde default value functions
//!
//! Used across effect definitions to avoid duplication.

/// Default for enabled fields
pub fn default_true() -> bool {
    true
}

/// Default stack count and stack bounds
pub fn default_stacks() -> u32 {
    1
}
