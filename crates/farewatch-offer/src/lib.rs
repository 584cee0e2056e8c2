//! Offer extraction and decision for Farewatch.
//!
//! Parses screen text into offers, filters out repeat notifications of the
//! same offer, and evaluates novel offers against the acceptance thresholds.

pub mod novelty;
pub mod parser;
pub mod policy;

pub use novelty::{NoveltyFilter, DEBOUNCE_WINDOW_MS};
pub use parser::{parse_locale_number, OfferParser};
pub use policy::{evaluate, evaluate_with, summarize, Thresholds};
