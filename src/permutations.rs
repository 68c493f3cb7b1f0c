//src/permutations.rs

//! Enumeration of every fixed-length word over an alphabet.
//!
//! The words are the shard keys: a table sharded with prefix length `p`
//! can only produce files named by one of the `|alphabet|^p` words returned here.

/// Generate all `len`-length strings over `alphabet`, in the order obtained by
/// extending each prefix with every alphabet symbol depth-first. With a sorted
/// alphabet this is lexicographic order.
///
/// `len == 0` yields the single empty word.
pub fn generate(alphabet: &[char], len: usize) -> Vec<String> {
    let capacity = space_size(alphabet.len(), len).unwrap_or(0);
    let mut words = Vec::with_capacity(capacity);
    extend_word(alphabet, &mut String::with_capacity(len), len, &mut words);
    words
}

fn extend_word(alphabet: &[char], prefix: &mut String, remaining: usize, words: &mut Vec<String>) {
    if remaining == 0 {
        words.push(prefix.clone());
        return;
    }
    for &symbol in alphabet {
        prefix.push(symbol);
        extend_word(alphabet, prefix, remaining - 1, words);
        prefix.pop();
    }
}

/// Number of words `generate` returns, or `None` on overflow.
pub fn space_size(alphabet_len: usize, len: usize) -> Option<usize> {
    alphabet_len.checked_pow(u32::try_from(len).ok()?)
}
