//! Panel-side drivers: debounced buttons and indicator patterns.

pub mod button;
pub mod indicators;
