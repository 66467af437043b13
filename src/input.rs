//! Interfaces of the collaborators that feed the quantification.

/// Raw k-mer counts produced by the counting step
pub trait KmerCounts: Sync {
    /// Number of occurrences of k-mer `kmer` in the reads
    fn count(&self, kmer: usize) -> u32;

    /// Number of k-mers in the table
    fn len(&self) -> usize;

    /// Return true if the table is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of k-mers
    fn kmer_length(&self) -> u32;

    /// Average length of the reads that were counted
    fn average_read_length(&self) -> f64;
}

/// Transcript set of the reference
pub trait TranscriptGeneMap: Sync {
    /// Number of transcripts
    fn num_transcripts(&self) -> usize;

    /// Name of transcript `id`
    fn transcript_name(&self, id: usize) -> &str;
}

/// In memory [KmerCounts]
#[derive(Debug, Clone)]
pub struct CountTable {
    counts: Vec<u32>,
    kmer_length: u32,
    average_read_length: f64,
}

impl CountTable {
    pub fn new(counts: Vec<u32>, kmer_length: u32, average_read_length: f64) -> Self {
        Self {
            counts,
            kmer_length,
            average_read_length,
        }
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| *c as u64).sum()
    }
}

impl KmerCounts for CountTable {
    fn count(&self, kmer: usize) -> u32 {
        self.counts[kmer]
    }

    fn len(&self) -> usize {
        self.counts.len()
    }

    fn kmer_length(&self) -> u32 {
        self.kmer_length
    }

    fn average_read_length(&self) -> f64 {
        self.average_read_length
    }
}

/// In memory [TranscriptGeneMap], transcript id is the index in names
#[derive(Debug, Clone, Default)]
pub struct TranscriptNames {
    names: Vec<String>,
}

impl TranscriptNames {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl TranscriptGeneMap for TranscriptNames {
    fn num_transcripts(&self) -> usize {
        self.names.len()
    }

    fn transcript_name(&self, id: usize) -> &str {
        &self.names[id]
    }
}
