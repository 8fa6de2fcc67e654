use serde::{Deserialize, Serialize};

pub type SequenceId = u32;

/// A read (or consensus) taking part in the assembly. Ids are 0-based and
/// contiguous in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub id: SequenceId,
    pub name: String,
    pub characters: Vec<u8>,
}

impl Sequence {
    pub fn new<S: Into<String>>(id: SequenceId, name: S, characters: Vec<u8>) -> Self {
        Self {
            id,
            name: name.into(),
            characters,
        }
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

/// Background k-mer abundance model produced by the k-mer counting stage.
pub trait KmerFrequencyModel {
    /// Most frequent k-mer depth, i.e. the expected sequencing coverage
    fn mode_depth(&self) -> u32;

    /// Expected length of the assembled genome in bp (0 when unknown)
    fn expected_assembly_length(&self) -> u64;
}

/// Plain frequency model for callers that already know both values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeEstimate {
    pub mode_depth: u32,
    pub expected_assembly_length: u64,
}

impl GenomeEstimate {
    pub fn new(mode_depth: u32, expected_assembly_length: u64) -> Self {
        Self {
            mode_depth,
            expected_assembly_length,
        }
    }

    /// Estimate from the reads alone, assuming the given sequencing depth
    pub fn from_sequences(sequences: &[Sequence], mode_depth: u32) -> Self {
        let total: u64 = sequences.iter().map(|s| s.len() as u64).sum();
        Self {
            mode_depth,
            expected_assembly_length: total / u64::from(mode_depth.max(1)),
        }
    }
}

impl KmerFrequencyModel for GenomeEstimate {
    fn mode_depth(&self) -> u32 {
        self.mode_depth
    }

    fn expected_assembly_length(&self) -> u64 {
        self.expected_assembly_length
    }
}
