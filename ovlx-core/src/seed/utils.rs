//! Shared utilities for k-mer encoding

/// Incremental 2-bit encoder of the last `k` valid nucleotides
pub struct RollingKmer {
    k: usize,
    code: u64,
    mask: u64,
    valid: usize,
}

impl RollingKmer {
    pub fn new(k: usize) -> Self {
        let mask = if k >= 32 { u64::MAX } else { (1u64 << (2 * k)) - 1 };
        Self {
            k,
            code: 0,
            mask,
            valid: 0,
        }
    }

    /// Add a nucleotide. Returns the code of the k-mer ending at it once `k`
    /// consecutive valid nucleotides were seen; an invalid nucleotide resets
    /// the run.
    pub fn push(&mut self, nucleotide: u8) -> Option<u64> {
        match encode_nucleotide(nucleotide) {
            Some(encoded) => {
                self.code = ((self.code << 2) | encoded) & self.mask;
                self.valid += 1;
                if self.valid >= self.k {
                    Some(self.code)
                } else {
                    None
                }
            }
            None => {
                self.reset();
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.code = 0;
        self.valid = 0;
    }

    pub fn code(&self) -> u64 {
        self.code
    }
}

/// Encode a nucleotide to 2-bit representation
pub fn encode_nucleotide(nucleotide: u8) -> Option<u64> {
    match nucleotide.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Encode a whole k-mer; `None` if it contains a non-ACGT character
pub fn encode_kmer(kmer: &[u8]) -> Option<u64> {
    kmer.iter()
        .try_fold(0u64, |code, &n| encode_nucleotide(n).map(|e| (code << 2) | e))
}

/// Decode a 2-bit k-mer code back to nucleotides
pub fn decode_kmer(code: u64, k: usize) -> Vec<u8> {
    (0..k)
        .rev()
        .map(|i| match (code >> (2 * i)) & 3 {
            0 => b'A',
            1 => b'C',
            2 => b'G',
            _ => b'T',
        })
        .collect()
}

/// Generate reverse complement of a sequence
pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence
        .iter()
        .rev()
        .map(|&nucleotide| complement_nucleotide(nucleotide))
        .collect()
}

/// Get complement of a single nucleotide
pub fn complement_nucleotide(nucleotide: u8) -> u8 {
    match nucleotide.to_ascii_uppercase() {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        _ => nucleotide,
    }
}

/// Reverse complement of a 2-bit k-mer code
pub fn reverse_complement_code(code: u64, k: usize) -> u64 {
    let mut result = 0u64;
    let mut rest = code;
    for _ in 0..k {
        let nucleotide = rest & 3;
        result = (result << 2) | (3 - nucleotide);
        rest >>= 2;
    }
    result
}

/// Invertible integer hash used to order k-mers inside a minimizer window.
/// Avoids the bias of lexicographic order towards poly-A k-mers.
pub fn hash64(key: u64, mask: u64) -> u64 {
    let mut key = (!key).wrapping_add(key << 21) & mask;
    key ^= key >> 24;
    key = key.wrapping_add(key << 3).wrapping_add(key << 8) & mask;
    key ^= key >> 14;
    key = key.wrapping_add(key << 2).wrapping_add(key << 4) & mask;
    key ^= key >> 28;
    key = key.wrapping_add(key << 31) & mask;
    key
}
