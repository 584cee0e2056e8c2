//! Text-to-offer extraction.
//!
//! Turns the ordered text fragments of one screen snapshot into at most one
//! [`Offer`]. Amounts follow the pt-BR convention (`1.234,56`). Matching is
//! a best-effort heuristic:
//!
//! - the first `R$ X/km` found is the rate and the only "offer present" signal,
//! - the largest bare `R$ X` outside any `/km` fragment is the fare,
//! - the first and second bare `X km` are the pickup and trip distances.

use regex::Regex;

use farewatch_core::types::Offer;

/// Separator used when joining fragments into [`Offer::raw_text`].
const RAW_TEXT_SEPARATOR: &str = " | ";

const CURRENCY_SYMBOL: &str = "R$";

/// Compiled patterns for offer extraction, built once and reused.
pub struct OfferParser {
    /// `R$ 7,50/km`
    rate: Regex,
    /// `R$ 15,00`
    currency: Regex,
    /// `2,5 km`
    distance: Regex,
    /// Any `/km` suffix, marks a fragment as carrying a rate.
    per_distance: Regex,
}

impl Default for OfferParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OfferParser {
    pub fn new() -> Self {
        Self {
            rate: Regex::new(r"(?i)R\$\s*(\d[\d.,]*)\s*/\s*km\b").expect("Invalid rate regex"),
            currency: Regex::new(r"(?i)R\$\s*(\d[\d.,]*)").expect("Invalid currency regex"),
            distance: Regex::new(r"(?i)(\d[\d.,]*)\s*km\b").expect("Invalid distance regex"),
            per_distance: Regex::new(r"(?i)/\s*km\b").expect("Invalid per-distance regex"),
        }
    }

    /// Extract an offer from `fragments`, or `None` when no rate is present.
    ///
    /// Blank fragments are skipped; order is preserved and duplicates are
    /// scanned like any other fragment.
    pub fn parse<S: AsRef<str>>(&self, fragments: &[S]) -> Option<Offer> {
        let fragments: Vec<&str> = fragments
            .iter()
            .map(|f| f.as_ref())
            .filter(|f| !f.trim().is_empty())
            .collect();

        let rate_per_distance = fragments.iter().find_map(|f| self.first_rate(f))?;

        let total_fare = fragments
            .iter()
            .filter(|f| !self.per_distance.is_match(f))
            .flat_map(|f| self.currency_amounts(f))
            .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))))
            .unwrap_or(0.0);

        let mut distances = fragments.iter().flat_map(|f| self.bare_distances(f));
        let pickup_distance = distances.next().unwrap_or(0.0);
        let trip_distance = distances.next().unwrap_or(0.0);

        let offer = Offer {
            total_fare,
            rate_per_distance,
            pickup_distance,
            trip_distance,
            raw_text: fragments.join(RAW_TEXT_SEPARATOR),
        };
        tracing::trace!(fragments = fragments.len(), %offer, "Offer parsed");
        Some(offer)
    }

    /// First parseable rate in a fragment. A malformed number does not hide
    /// a later well-formed one.
    fn first_rate(&self, fragment: &str) -> Option<f64> {
        self.rate
            .captures_iter(fragment)
            .find_map(|c| parse_locale_number(&c[1]))
    }

    fn currency_amounts<'a>(&'a self, fragment: &'a str) -> impl Iterator<Item = f64> + 'a {
        self.currency
            .captures_iter(fragment)
            .filter_map(|c| parse_locale_number(&c[1]))
    }

    fn bare_distances<'a>(&'a self, fragment: &'a str) -> impl Iterator<Item = f64> + 'a {
        self.distance.captures_iter(fragment).filter_map(move |c| {
            let number = c.get(1)?;
            if follows_currency(&fragment[..number.start()]) {
                return None;
            }
            parse_locale_number(number.as_str())
        })
    }
}

/// Whether the text right before a number ends in the currency symbol.
fn follows_currency(prefix: &str) -> bool {
    let prefix = prefix.trim_end();
    prefix.len() >= CURRENCY_SYMBOL.len()
        && prefix.is_char_boundary(prefix.len() - CURRENCY_SYMBOL.len())
        && prefix[prefix.len() - CURRENCY_SYMBOL.len()..].eq_ignore_ascii_case(CURRENCY_SYMBOL)
}

/// Parse a pt-BR formatted number: `.` groups thousands, `,` marks decimals.
///
/// Returns `None` for anything that does not yield a finite value.
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace('.', "").replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
