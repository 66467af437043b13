//! Transcripts, k-mer groups and the statistics derived from them.

/* std use */
use std::sync::atomic::Ordering;

/* crate use */
use bitvec::vec::BitVec;
use rayon::prelude::*;

/* project use */
use crate::numeric;
use crate::sync::{AtomicF64, FanIn};

pub type TranscriptId = u32;
pub type GroupId = u32;

/// Entry of a transcript for one k-mer group
#[derive(Debug)]
pub struct Bin {
    group: GroupId,
    occurrences: u32,
    value: AtomicF64,
}

impl Bin {
    /// Bin of `occurrences` positions of `group`, seeded with the occurrence count
    pub fn new(group: GroupId, occurrences: u32) -> Self {
        Self {
            group,
            occurrences,
            value: AtomicF64::new(occurrences as f64),
        }
    }

    /// Id of the k-mer group
    pub fn group(&self) -> usize {
        self.group as usize
    }

    /// Number of times the group appear in transcript k-mer lists
    pub fn occurrences(&self) -> u32 {
        self.occurrences
    }

    /// Quantity of the group attributed to the transcript
    pub fn value(&self) -> f64 {
        self.value.load(Ordering::Relaxed)
    }

    pub(crate) fn store(&self, value: f64) {
        self.value.store(value, Ordering::Relaxed)
    }
}

/// A reference sequence and its current estimate
#[derive(Debug)]
pub struct Transcript {
    length: u32,
    effective_length: f64,
    mean: AtomicF64,
    bins: Vec<Bin>,
    fan_in: FanIn,
}

impl Transcript {
    /// Transcript with a null mean, its fan-in wait for one arrival per bin
    pub fn new(length: u32, effective_length: f64, bins: Vec<Bin>) -> Self {
        Self {
            length,
            effective_length,
            mean: AtomicF64::new(0.0),
            fan_in: FanIn::new(bins.len()),
            bins,
        }
    }

    /// Nucleotide length
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Number of k-mer positions, minus the positions that can't be attributed to this transcript
    pub fn effective_length(&self) -> f64 {
        self.effective_length
    }

    /// Last mean computed for this transcript
    pub fn mean(&self) -> f64 {
        self.mean.load(Ordering::Relaxed)
    }

    pub(crate) fn set_mean(&self, mean: f64) {
        self.mean.store(mean, Ordering::Relaxed)
    }

    /// One bin per group contained in the transcript
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub(crate) fn fan_in(&self) -> &FanIn {
        &self.fan_in
    }
}

/// A transcript containing a k-mer group and the position of the group in transcript bins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub transcript: TranscriptId,
    pub slot: u32,
}

/// All k-mer groups, stored field by field
#[derive(Debug, Default)]
pub struct KmerGroups {
    pub(crate) sizes: Vec<u32>,
    pub(crate) promiscuities: Vec<f64>,
    pub(crate) counts: Vec<f64>,
    pub(crate) biases: Vec<f64>,
    pub(crate) gene_promiscuous: BitVec,
    pub(crate) offsets: Vec<usize>,
    pub(crate) members: Vec<Member>,
}

impl KmerGroups {
    /// Number of groups
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// True if no k-mer is active
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Number of raw k-mers in the group
    pub fn size(&self, group: usize) -> u32 {
        self.sizes[group]
    }

    /// Number of distinct transcripts containing the group
    pub fn promiscuity(&self, group: usize) -> f64 {
        self.promiscuities[group]
    }

    /// Sum of the counts of the group k-mers
    pub fn count(&self, group: usize) -> f64 {
        self.counts[group]
    }

    /// Multiplier applied to the count of the group
    pub fn bias(&self, group: usize) -> f64 {
        self.biases[group]
    }

    /// Bias of every group
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    /// True if the group crosses gene boundaries
    pub fn is_gene_promiscuous(&self, group: usize) -> bool {
        self.gene_promiscuous[group]
    }

    /// Transcripts containing the group, sorted by id
    pub fn transcripts(&self, group: usize) -> &[Member] {
        &self.members[self.offsets[group]..self.offsets[group + 1]]
    }

    /// Fraction of one group occurrence attributed to each transcript containing it
    pub fn weight(&self, group: usize) -> f64 {
        1.0 / self.promiscuities[group]
    }

    /// Sum of counts over all groups
    pub fn total_count(&self) -> f64 {
        numeric::sum(&self.counts)
    }
}

/// Transcripts and k-mer groups of one quantification
#[derive(Debug)]
pub struct Model {
    pub(crate) transcripts: Vec<Transcript>,
    pub(crate) groups: KmerGroups,
    pub(crate) kmer_length: u32,
}

impl Model {
    /// Transcripts indexed by id
    pub fn transcripts(&self) -> &[Transcript] {
        &self.transcripts
    }

    /// Groups indexed by id
    pub fn groups(&self) -> &KmerGroups {
        &self.groups
    }

    /// Number of transcripts, including those without group
    pub fn num_transcripts(&self) -> usize {
        self.transcripts.len()
    }

    /// Length of k-mers
    pub fn kmer_length(&self) -> u32 {
        self.kmer_length
    }

    /// Sum of weights of the groups a transcript can be attributed
    pub fn weighted_length(&self, transcript: &Transcript) -> f64 {
        transcript
            .bins
            .iter()
            .filter(|bin| !self.groups.is_gene_promiscuous(bin.group()))
            .map(|bin| self.groups.weight(bin.group()))
            .sum()
    }

    /// Bias corrected quantity attributed to a transcript
    pub fn attributed(&self, transcript: &Transcript) -> f64 {
        transcript
            .bins
            .iter()
            .filter(|bin| !self.groups.is_gene_promiscuous(bin.group()))
            .map(|bin| self.groups.bias(bin.group()) * bin.value())
            .sum()
    }

    /// Mean coverage of transcript, 0 if no group can be attributed
    pub fn compute_mean(&self, transcript: &Transcript) -> f64 {
        let length = self.weighted_length(transcript);

        if length > 0.0 {
            self.attributed(transcript) / length
        } else {
            0.0
        }
    }

    /// Set bins to their share of group counts and return the normalized means
    pub fn initial_means(&mut self) -> Vec<f64> {
        let groups = &self.groups;

        self.transcripts.par_iter_mut().for_each(|transcript| {
            for bin in transcript.bins.iter_mut() {
                let group = bin.group();
                if !groups.is_gene_promiscuous(group) {
                    bin.value
                        .set(bin.occurrences as f64 * groups.count(group) * groups.weight(group));
                }
            }
        });

        let mut means = self
            .transcripts
            .par_iter()
            .map(|transcript| {
                let mean = self.compute_mean(transcript);
                transcript.set_mean(mean);
                mean
            })
            .collect::<Vec<f64>>();

        numeric::normalize(&mut means);
        self.set_means(&means);

        means
    }

    /// Replace the mean of each transcript
    pub fn set_means(&mut self, means: &[f64]) {
        assert_eq!(means.len(), self.transcripts.len());

        self.transcripts
            .par_iter_mut()
            .zip(means.par_iter())
            .for_each(|(transcript, mean)| transcript.mean.set(*mean));
    }
}
