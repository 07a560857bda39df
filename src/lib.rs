//! # imgpress
//!
//! Batch image recompression: decode, bound the longer edge, re-encode as
//! JPEG — at a fixed quality, or searching for an output near a target file
//! size. Everything is pure Rust; no ImageMagick, no libjpeg, no system
//! dependencies. One binary that works the same on any machine.
//!
//! # Architecture
//!
//! ```text
//! inputs  →  batch runner  →  pipeline  →  <stem>-compressed.jpg
//!            (parallel,        (decode,
//!             skip cache)       resize,
//!                               encode)
//! ```
//!
//! The pipeline is a pure function over bytes — no filesystem, no global
//! state — so its behavior is fully unit-testable. The batch runner owns
//! everything stateful: file discovery, the parallel pool, the skip cache,
//! and progress events.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Core compression: decode, bounded resize, JPEG encode, target-size search, EXIF handling |
//! | [`batch`] | Parallel runner over files and directories with per-item isolation and cancellation |
//! | [`cache`] | Content-addressed skip cache so unchanged images are not re-encoded |
//! | [`config`] | `imgpress.toml` loading and validation |
//! | [`output`] | CLI output formatting — pure `format_*` functions plus `print_*` wrappers |
//!
//! # Design Decisions
//!
//! ## JPEG-Only Output
//!
//! Every output is JPEG regardless of input format. The point of the tool is
//! shrinking photos for sharing and upload limits, and baseline JPEG remains
//! the one format every consumer accepts. Inputs can be JPEG, PNG, TIFF, or
//! WebP; alpha is flattened during the RGB conversion.
//!
//! ## Never Upscale
//!
//! A dimension bound only ever shrinks. A 640px source run with a 1920px
//! bound stays 640px — blowing pixels up adds bytes and removes nothing.
//!
//! ## Best-Effort Target Size
//!
//! Target-size mode always produces an output. If no combination of quality
//! and scaling reaches the target, the closest encoding found is returned
//! rather than an error; the caller can read `quality_used` and the final
//! size to see how close it got.
//!
//! ## Content-Addressed Caching
//!
//! The skip cache keys on a hash of the source bytes plus the encoding
//! parameters, not on paths or mtimes. Renaming an input, or checking the
//! tree out fresh from git, does not trigger a re-encode.

pub mod batch;
pub mod cache;
pub mod config;
pub mod output;
pub mod pipeline;
