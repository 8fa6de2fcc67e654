//! Window minimizers
//!
//! A minimizer is the k-mer with the smallest hash among `w` consecutive
//! k-mers. Sampling one k-mer per window keeps roughly `2/(w+1)` of the
//! positions while guaranteeing that two sequences sharing `w + k - 1`
//! consecutive bases share at least one minimizer.

use std::collections::VecDeque;

use super::utils::{hash64, RollingKmer};

/// A selected k-mer: its start position and 2-bit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KmerCode {
    pub position: u32,
    pub code: u64,
}

/// Produces the codes used both to index sequences and to search queries.
/// Calling [`KmerCodec::codes`] again restarts the iteration.
pub trait KmerCodec: Send + Sync {
    fn kmer_length(&self) -> usize;

    fn window_length(&self) -> usize;

    fn codes<'a>(&'a self, sequence: &'a [u8]) -> Box<dyn Iterator<Item = KmerCode> + 'a>;
}

/// Forward-strand window minimizer codec
#[derive(Debug, Clone, Copy)]
pub struct MinimizerCodec {
    kmer_length: usize,
    window_length: usize,
}

impl MinimizerCodec {
    pub fn new(kmer_length: usize, window_length: usize) -> Self {
        Self {
            kmer_length: kmer_length.clamp(1, 31),
            window_length: window_length.max(1),
        }
    }

    pub fn iter<'a>(&self, sequence: &'a [u8]) -> MinimizerIter<'a> {
        MinimizerIter::new(sequence, self.kmer_length, self.window_length)
    }
}

impl Default for MinimizerCodec {
    fn default() -> Self {
        Self::new(15, 10)
    }
}

impl KmerCodec for MinimizerCodec {
    fn kmer_length(&self) -> usize {
        self.kmer_length
    }

    fn window_length(&self) -> usize {
        self.window_length
    }

    fn codes<'a>(&'a self, sequence: &'a [u8]) -> Box<dyn Iterator<Item = KmerCode> + 'a> {
        Box::new(self.iter(sequence))
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    hash: u64,
    /// Index of the k-mer within the current run of valid bases
    rank: usize,
    position: u32,
    code: u64,
}

/// Lazy minimizer extraction with a monotone deque. Runs of valid bases are
/// processed independently; a run shorter than a full window still yields
/// its smallest k-mer.
pub struct MinimizerIter<'a> {
    sequence: &'a [u8],
    next_base: usize,
    k: usize,
    w: usize,
    mask: u64,
    roller: RollingKmer,
    window: VecDeque<Candidate>,
    kmers_in_run: usize,
    last_emitted: Option<u32>,
}

impl<'a> MinimizerIter<'a> {
    fn new(sequence: &'a [u8], k: usize, w: usize) -> Self {
        Self {
            sequence,
            next_base: 0,
            k,
            w,
            mask: (1u64 << (2 * k)) - 1,
            roller: RollingKmer::new(k),
            window: VecDeque::with_capacity(w + 1),
            kmers_in_run: 0,
            last_emitted: None,
        }
    }

    fn emit_front(&mut self) -> Option<KmerCode> {
        let front = *self.window.front()?;
        if self.last_emitted == Some(front.position) {
            return None;
        }
        self.last_emitted = Some(front.position);
        Some(KmerCode {
            position: front.position,
            code: front.code,
        })
    }

    /// Close the current run. Short runs never filled a window, so their
    /// minimum has not been reported yet.
    fn finish_run(&mut self) -> Option<KmerCode> {
        let result = if self.kmers_in_run > 0 && self.kmers_in_run < self.w {
            self.emit_front()
        } else {
            None
        };
        self.window.clear();
        self.kmers_in_run = 0;
        result
    }
}

impl<'a> Iterator for MinimizerIter<'a> {
    type Item = KmerCode;

    fn next(&mut self) -> Option<KmerCode> {
        while self.next_base < self.sequence.len() {
            let i = self.next_base;
            self.next_base += 1;
            let Some(code) = self.roller.push(self.sequence[i]) else {
                if super::utils::encode_nucleotide(self.sequence[i]).is_none() {
                    if let Some(out) = self.finish_run() {
                        return Some(out);
                    }
                }
                continue;
            };
            let candidate = Candidate {
                hash: hash64(code, self.mask),
                rank: self.kmers_in_run,
                position: (i + 1 - self.k) as u32,
                code,
            };
            self.kmers_in_run += 1;
            while self.window.back().map_or(false, |back| back.hash > candidate.hash) {
                self.window.pop_back();
            }
            self.window.push_back(candidate);
            while self
                .window
                .front()
                .map_or(false, |front| front.rank + self.w <= candidate.rank)
            {
                self.window.pop_front();
            }
            if self.kmers_in_run >= self.w {
                if let Some(out) = self.emit_front() {
                    return Some(out);
                }
            }
        }
        if self.window.is_empty() {
            return None;
        }
        self.finish_run()
    }
}
