//! Pipeline stages for prospectus analysis.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and the provider can be swapped without touching
//! the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ prompt ──▶ llm ──▶ validate ──▶ rules ──▶ assemble
//! (path/URL) (pdfium)   (text)    (JSON)   (typed)     (adjust)   (result)
//! ```
//!
//! 1. [`input`]    — resolve a local path or URL to PDF bytes (library and
//!    CLI only; the server already holds the upload)
//! 2. [`extract`]  — concatenate every page's text; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`crate::prompts`] — embed the text and market inputs in the prompt
//! 4. [`llm`]      — provider call, fence stripping and JSON parse under a
//!    bounded retry; the only stage with network I/O
//! 5. [`validate`] — required-key presence check, then typed deserialisation
//! 6. [`rules`]    — deterministic score and verdict corrections
//! 7. [`assemble`] — shape the externally visible result

pub mod assemble;
pub mod extract;
pub mod input;
pub mod llm;
pub mod rules;
pub mod validate;
