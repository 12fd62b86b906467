//! # Hamming-Distance Search Index
//!
//! *All keys within radius r, without scanning all keys.*
//!
//! ## Intuition First
//!
//! Imagine a library of short barcodes where you want every barcode
//! that differs from yours in at most r stripes. Checking every barcode
//! works, but most of them differ wildly. Instead, tear each barcode
//! into a few pieces: if two barcodes are close overall, at least one
//! pair of pieces must be *nearly identical* (off by at most one
//! stripe). So you only need an exact-lookup structure for "nearly
//! identical pieces", and a fast re-check for the few survivors.
//!
//! ## The Problem
//!
//! Radius search under Hamming distance faces a trade-off:
//! - **Exhaustive scan**: No index, but every query costs $O(N L)$.
//! - **Neighbor enumeration**: Generate all $\sum_k \binom{L}{k}(\sigma-1)^k$
//!   variants of the query; explodes combinatorially beyond tiny r.
//!
//! Multi-index filtering splits the positions into $B$ buckets, probes
//! each bucket for near-exact slice matches, and verifies the candidate
//! union. The pigeonhole principle makes it sound; the bucket count and
//! a per-bucket match-strength analysis make it fast.
//!
//! ## Historical Context
//!
//! ```text
//! 1950  Hamming     Distance metric for error-detecting codes
//! 1982  Mor-Fraenkel Deletion variants for single-error dictionary lookup
//! 2007  Manku et al. Multi-index simhash dedup at web scale (exact buckets)
//! 2013  Zhang et al. HmSearch: 1-variants + enhanced filtering + verification
//! ```
//!
//! The key refinement of HmSearch over exact-bucket schemes is that each
//! bucket tolerates one mismatch (via one-deletion signatures), which
//! roughly halves the number of buckets needed for a given radius and
//! keeps the candidate sets small.
//!
//! ## Mathematical Formulation
//!
//! For keys of length $L \le 64$ over $\Sigma = \{0, \dots, \sigma-1\}$
//! and radius $r$, split positions into $B = \lfloor (r+3)/2 \rfloor$
//! contiguous buckets. If $d_H(k, q) \le r$, some bucket $b$ has
//! $d_H(k_b, q_b) \le 1$; one-deletion signatures detect exactly this.
//! Per bucket, the match count of a candidate is 0, 1, or $L_b$, which
//! separates "exact in bucket" from "one error in bucket" and powers a
//! parity-based filter on r before verification.
//!
//! ## Complexity Analysis
//!
//! - **Build**: $O(N L)$ signature insertions into $B$ hash tables.
//! - **Query**: $O(L)$ probes plus verification of the candidates that
//!   survive filtering; verification is $O(\lceil \log_2 \sigma \rceil)$
//!   word operations per candidate via bit-plane transposition.
//! - **Space**: signatures at $\lceil \log_2(\sigma+1) \rceil$ bits per
//!   symbol plus one u32 id per (key, position) pair.
//!
//! ## What Could Go Wrong
//!
//! 1. **Static only**: The tables are laid out contiguously at build
//!    time; inserting a key means rebuilding.
//! 2. **Radius is baked in**: The bucket count is chosen from r, and
//!    the filter constants are tied to that choice. Searching a
//!    different radius class requires a rebuild.
//!
//! ## Implementation Notes
//!
//! This crate provides:
//! - **`HmIndex`**: The multi-bucket index: build, search, serialize.
//! - **`OdvTable`**: One-deletion signature table, one per bucket.
//! - **`IntVector`**: Fixed-width bit-packed storage under everything.
//! - **`LinearScan`**: Exhaustive baseline and test oracle.
//!
//! ## References
//!
//! - Zhang, X., Qin, J., Wang, W., Sun, Y., & Lu, J. (2013). "HmSearch:
//!   an efficient Hamming distance query processing algorithm." SSDBM.
//! - Manku, G. S., Jain, A., & Das Sarma, A. (2007). "Detecting
//!   near-duplicates for web crawling." WWW.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bucket;
pub mod bvecs;
pub mod error;
pub mod index;
pub mod intvec;
pub mod odv;
pub mod scan;
pub mod vertical;

pub use bucket::proper_buckets;
pub use error::{Error, Result};
pub use index::{HmIndex, VerifyMode};
pub use intvec::IntVector;
pub use odv::OdvTable;
pub use scan::LinearScan;
