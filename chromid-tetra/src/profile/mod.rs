
use crate::{decode_word, encode, NUM_WORDS, WORD_SIZE};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Tetranucleotide usage-bias profile of a single sequence.
///
/// Maps each observed word to `observed / expected`, where `observed` is the word's share of
/// all valid windows and `expected` is the product of the single-base frequencies of its four
/// letters. Words that were never observed are absent.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Profile {
    ratios: BTreeMap<String, f64>,
}

impl Profile {
    /// Returns a new empty [`Profile`].
    pub fn new() -> Self {
        Profile { ratios: BTreeMap::new() }
    }

    /// Compute the [`Profile`] of raw sequence bases.
    ///
    /// Windows containing any symbol outside of `A`, `C`, `G`, `T` are skipped. A sequence
    /// with no valid window yields an empty profile.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use chromid_tetra::Profile;
    ///
    /// let profile = Profile::from_sequence(b"AAAAAAAA");
    /// assert_eq!(profile.len(), 1);
    /// assert_eq!(profile.get("AAAA"), Some(1.0));
    ///
    /// // fewer than 4 consecutive canonical bases
    /// assert!(Profile::from_sequence(b"ACGNACG").is_empty());
    /// ```
    pub fn from_sequence(sequence: &[u8]) -> Self {
        let mut base_counts = [0_u64; 4];
        let mut word_counts = [0_u64; NUM_WORDS];
        let mut total_words = 0_u64;

        // rolling 2-bit encoded window, `run` counts consecutive canonical bases
        let mut word = 0_usize;
        let mut run = 0_usize;
        for base in sequence {
            match encode(*base) {
                Some(code) => {
                    base_counts[code] += 1;
                    word = ((word << 2) | code) & (NUM_WORDS - 1);
                    run += 1;
                    if run >= WORD_SIZE {
                        word_counts[word] += 1;
                        total_words += 1;
                    }
                }
                None => run = 0,
            }
        }

        if total_words == 0 {
            return Profile::new();
        }

        let total_bases: u64 = base_counts.iter().sum();
        let frequencies = base_counts.map(|count| count as f64 / total_bases as f64);

        let ratios = word_counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(index, count)| {
                // letters in reading order, first base is the highest 2 bits
                let expected: f64 = (0..WORD_SIZE)
                    .rev()
                    .map(|shift| frequencies[(index >> (2 * shift)) & 0b11])
                    .product();
                let observed = *count as f64 / total_words as f64;
                (decode_word(index), observed / expected)
            })
            .collect();

        Profile { ratios }
    }

    /// Compositional distance from this (reference) profile to another.
    ///
    /// Sums the squared ratio differences over the words of `self` only. Words found only in
    /// `other` never contribute, so the distance is not symmetric.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use chromid_tetra::Profile;
    ///
    /// let a: Profile = "{'AAAA': 2.0}".parse()?;
    /// let b: Profile = "{'AAAA': 2.0, 'TTTT': 5.0}".parse()?;
    /// assert_eq!(a.distance(&b), 0.0);
    /// assert_eq!(b.distance(&a), 25.0);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn distance(&self, other: &Profile) -> f64 {
        self.ratios
            .iter()
            .map(|(word, ratio)| {
                let other_ratio = other.ratios.get(word).copied().unwrap_or(0.0);
                (ratio - other_ratio).powi(2)
            })
            .sum()
    }

    /// Ratio of a word, if it was observed.
    pub fn get(&self, word: &str) -> Option<f64> {
        self.ratios.get(word).copied()
    }

    /// Number of observed words.
    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    /// Iterate over words and ratios in lexicographic word order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.ratios.iter().map(|(word, ratio)| (word.as_str(), *ratio))
    }
}

impl FromIterator<(String, f64)> for Profile {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Profile { ratios: iter.into_iter().collect() }
    }
}

/// Writes the profile as a mapping literal, ex. `{'AAAA': 1.0, 'AAAC': 0.5}`.
impl Display for Profile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let entries = self.ratios.iter().map(|(word, ratio)| format!("'{word}': {ratio:?}")).join(", ");
        write!(f, "{{{entries}}}")
    }
}

impl FromStr for Profile {
    type Err = Report;

    /// Parse a mapping literal, keys may be single or double quoted.
    fn from_str(literal: &str) -> Result<Self, Report> {
        let inner = literal
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| eyre!("Profile literal is not enclosed in braces: {literal:?}"))?
            .trim();

        if inner.is_empty() {
            return Ok(Profile::new());
        }

        inner
            .split(',')
            .map(|entry| -> Result<(String, f64), Report> {
                let (word, ratio) = entry
                    .split_once(':')
                    .ok_or_else(|| eyre!("Profile entry is missing a ':' separator: {entry:?}"))?;
                let word = word.trim().trim_matches(|c| c == '\'' || c == '"').to_string();
                if word.len() != WORD_SIZE {
                    return Err(eyre!("Profile word must have {WORD_SIZE} bases: {word:?}"));
                }
                let ratio = ratio
                    .trim()
                    .parse::<f64>()
                    .wrap_err_with(|| format!("Failed to parse ratio of word {word}: {ratio:?}"))?;
                Ok((word, ratio))
            })
            .collect()
    }
}
