#![doc = include_str!("../README.md")]

mod profile;

#[doc(inline)]
pub use profile::Profile;

/// Length of the words counted in a [`Profile`].
pub const WORD_SIZE: usize = 4;

/// Canonical bases, in encoding order.
pub const ALPHABET: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Number of distinct words over the canonical alphabet.
pub const NUM_WORDS: usize = 256;

/// Returns the 2-bit code of a canonical base, or [`None`] for any other symbol.
///
/// Only uppercase bases are canonical, soft-masked (lowercase) bases and IUPAC ambiguity
/// codes are not.
///
/// ```rust
/// use chromid_tetra::encode;
/// assert_eq!(encode(b'A'), Some(0));
/// assert_eq!(encode(b'T'), Some(3));
/// assert_eq!(encode(b'N'), None);
/// assert_eq!(encode(b'a'), None);
/// ```
pub fn encode(base: u8) -> Option<usize> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Converts a word index (`0..256`) back into its 4-base [`String`].
///
/// ```rust
/// use chromid_tetra::decode_word;
/// assert_eq!(decode_word(0), "AAAA");
/// assert_eq!(decode_word(255), "TTTT");
/// assert_eq!(decode_word(0b00_01_10_11), "ACGT");
/// ```
pub fn decode_word(index: usize) -> String {
    (0..WORD_SIZE)
        .rev()
        .map(|shift| ALPHABET[(index >> (2 * shift)) & 0b11] as char)
        .collect()
}
