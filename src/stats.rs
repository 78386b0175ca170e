//! Run statistics and the two end-of-run reports

use crate::tokenize::Encoding;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Counters returned by one split's tokenization job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitStats {
    pub sequences: u64,
    pub rest_tokens: u64,
    pub too_short: u64,
    pub too_long: u64,
    pub too_many_instruments: u64,
    pub discarded_other: u64,
    pub truncations: u64,
}

impl SplitStats {
    /// Build from the positional 7-tuple form
    pub fn from_tuple(tuple: (u64, u64, u64, u64, u64, u64, u64)) -> Self {
        let (sequences, rest_tokens, too_short, too_long, too_many_instruments, discarded_other, truncations) =
            tuple;
        Self {
            sequences,
            rest_tokens,
            too_short,
            too_long,
            too_many_instruments,
            discarded_other,
            truncations,
        }
    }

    pub fn as_tuple(&self) -> (u64, u64, u64, u64, u64, u64, u64) {
        (
            self.sequences,
            self.rest_tokens,
            self.too_short,
            self.too_long,
            self.too_many_instruments,
            self.discarded_other,
            self.truncations,
        )
    }

    /// Tracks discarded by the length/instrument filters
    pub fn out_of_bounds(&self) -> u64 {
        self.too_short + self.too_long + self.too_many_instruments
    }
}

impl Add for SplitStats {
    type Output = SplitStats;

    fn add(self, other: SplitStats) -> SplitStats {
        SplitStats {
            sequences: self.sequences + other.sequences,
            rest_tokens: self.rest_tokens + other.rest_tokens,
            too_short: self.too_short + other.too_short,
            too_long: self.too_long + other.too_long,
            too_many_instruments: self.too_many_instruments + other.too_many_instruments,
            discarded_other: self.discarded_other + other.discarded_other,
            truncations: self.truncations + other.truncations,
        }
    }
}

impl AddAssign for SplitStats {
    fn add_assign(&mut self, other: SplitStats) {
        *self = *self + other;
    }
}

impl Sum for SplitStats {
    fn sum<I: Iterator<Item = SplitStats>>(iter: I) -> SplitStats {
        iter.fold(SplitStats::default(), Add::add)
    }
}

impl<'a> Sum<&'a SplitStats> for SplitStats {
    fn sum<I: Iterator<Item = &'a SplitStats>>(iter: I) -> SplitStats {
        iter.copied().sum()
    }
}

/// `100 * part / whole` rounded to 2 decimals; 0 when `whole` is 0
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (10_000.0 * part as f64 / whole as f64).round() / 100.0
}

/// Outcome of a preprocessing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessSummary {
    pub discovered: usize,
    pub failed: usize,
}

impl PreprocessSummary {
    /// Build from per-file statuses (0 = success, 1 = failure)
    pub fn from_statuses<I: IntoIterator<Item = u8>>(statuses: I) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            summary.discovered += 1;
            summary.failed += usize::from(status);
        }
        summary
    }

    pub fn succeeded(&self) -> usize {
        self.discovered - self.failed
    }

    pub fn discard_percentage(&self) -> f64 {
        percentage(self.failed as u64, self.discovered as u64)
    }
}

impl fmt::Display for PreprocessSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Successfully processed {} files (discarded {:.2}%)",
            self.succeeded(),
            self.discard_percentage()
        )
    }
}

/// Aggregated tokenization statistics across all splits
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizationReport {
    pub totals: SplitStats,
    pub encoding: Encoding,
    /// Events per sequence (M), the denominator base for both ratios
    pub events_per_sequence: u64,
}

impl TokenizationReport {
    /// Reduce per-split results; order of `splits` does not matter
    pub fn aggregate<I: IntoIterator<Item = SplitStats>>(
        splits: I,
        encoding: Encoding,
        events_per_sequence: u64,
    ) -> Self {
        Self {
            totals: splits.into_iter().sum(),
            encoding,
            events_per_sequence,
        }
    }

    pub fn total_events(&self) -> u64 {
        self.totals.sequences * self.events_per_sequence
    }

    pub fn rest_ratio(&self) -> f64 {
        percentage(self.totals.rest_tokens, self.total_events())
    }

    pub fn truncation_ratio(&self) -> f64 {
        percentage(self.totals.truncations, self.total_events())
    }
}

impl fmt::Display for TokenizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.totals;
        let kind = self.encoding.truncation_kind();
        writeln!(f, "Tokenization complete.")?;
        writeln!(f, "  => Processed {} sequences", t.sequences)?;
        writeln!(
            f,
            "  => Inserted {} REST tokens ({:.2}% of events)",
            t.rest_tokens,
            self.rest_ratio()
        )?;
        writeln!(
            f,
            "  => Discarded {} sequences for being out of bounds",
            t.out_of_bounds()
        )?;
        writeln!(f, "      - {} too short", t.too_short)?;
        writeln!(f, "      - {} too long", t.too_long)?;
        writeln!(f, "      - {} too many instruments", t.too_many_instruments)?;
        writeln!(f, "  => Discarded {} sequences for other reasons", t.discarded_other)?;
        write!(
            f,
            "  => Truncated {} {} times ({:.2}% of {}s)",
            t.truncations,
            kind,
            self.truncation_ratio(),
            kind
        )
    }
}
