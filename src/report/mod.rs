//! Report renderers for resolved dependency records.
//!
//! - [`terminal`] — colored, tabular output; respects `--verbose` / `--quiet`.
//!
//! JSON output has no renderer of its own: `main` serializes the records
//! directly with `serde_json`.

pub mod terminal;
