//! Collapse k-mers that occur in the exact same set of transcripts into k-mer groups.

/* crate use */
use bitvec::vec::BitVec;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

/* project use */
use crate::error;
use crate::input::KmerCounts;
use crate::model::{Bin, GroupId, KmerGroups, Member, Model, Transcript};
use crate::options::Options;

/// Map a transcript list to the k-mers that have it
type Buckets<'a> = FxHashMap<&'a [u32], Vec<u64>>;

/// Build the quantification model.
///
/// `transcripts_for_kmer[k]` is the sorted list of transcripts that contain k-mer `k`,
/// a transcript containing the k-mer many times appears many times.
/// `lengths[t]` is the nucleotide length of transcript `t`.
/// A group is gene promiscuous if one of its k-mers is in `gene_promiscuous`.
pub fn build<C>(
    counts: &C,
    transcripts_for_kmer: &[Vec<u32>],
    lengths: &[u32],
    gene_promiscuous: &FxHashSet<u64>,
    options: &Options,
) -> error::Result<Model>
where
    C: KmerCounts,
{
    if transcripts_for_kmer.len() != counts.len() {
        return Err(error::Error::SizeMismatch {
            table: "k-mer containment",
            expected: counts.len(),
            found: transcripts_for_kmer.len(),
        });
    }

    let num_transcripts = lengths.len();
    if let Some(id) = transcripts_for_kmer
        .par_iter()
        .flatten()
        .find_any(|id| **id as usize >= num_transcripts)
    {
        return Err(error::Error::TranscriptOutOfRange {
            id: *id,
            num_transcripts,
        });
    }

    let active = active_kmers(counts, transcripts_for_kmer, options.discard_zero_count_kmers);
    let buckets = hash_kmers(transcripts_for_kmer, &active);

    log::info!(
        "Out of {} potential kmers, there were {} distinct groups",
        transcripts_for_kmer.len(),
        buckets.len()
    );

    let (groups, bins) = build_groups(counts, &buckets, num_transcripts, gene_promiscuous);

    log::info!(
        "{} groups encode {} kmers",
        groups.len(),
        groups.sizes.iter().map(|s| *s as u64).sum::<u64>()
    );

    let kmer_length = counts.kmer_length();
    let transcripts = bins
        .into_par_iter()
        .zip(lengths.par_iter())
        .map(|(bins, length)| {
            let mut effective_length = (*length as f64 - kmer_length as f64 + 1.0).max(0.0);

            for (group, occurrences) in bins.iter() {
                if options
                    .promiscuous_cutoff
                    .map_or(false, |cutoff| *occurrences > cutoff)
                {
                    effective_length -= 1.0;
                }
                if groups.is_gene_promiscuous(*group as usize) {
                    effective_length -= 1.0;
                }
            }

            Transcript::new(
                *length,
                effective_length,
                bins.into_iter()
                    .map(|(group, occurrences)| Bin::new(group, occurrences))
                    .collect(),
            )
        })
        .collect::<Vec<Transcript>>();

    check_fan_in_degrees(&groups, &transcripts);

    Ok(Model {
        transcripts,
        groups,
        kmer_length,
    })
}

/// A k-mer is active if it's in at least one transcript and, when zero counts are discarded, if it was seen
fn active_kmers<C>(counts: &C, transcripts_for_kmer: &[Vec<u32>], discard_zero: bool) -> BitVec
where
    C: KmerCounts,
{
    let mut orphans = 0;

    let active = transcripts_for_kmer
        .iter()
        .enumerate()
        .map(|(kmer, transcripts)| {
            if transcripts.is_empty() {
                orphans += 1;
                false
            } else {
                !discard_zero || counts.count(kmer) != 0
            }
        })
        .collect::<BitVec>();

    if orphans != 0 {
        log::warn!("{} kmers aren't present in any transcript", orphans);
    }

    active
}

/// Group active k-mers by transcript list, groups are ordered by their smallest k-mer
fn hash_kmers<'a>(transcripts_for_kmer: &'a [Vec<u32>], active: &BitVec) -> Vec<(&'a [u32], Vec<u64>)> {
    let buckets = transcripts_for_kmer
        .par_iter()
        .enumerate()
        .filter(|(kmer, _)| active[*kmer])
        .fold(Buckets::default, |mut buckets, (kmer, transcripts)| {
            debug_assert!(transcripts.windows(2).all(|w| w[0] <= w[1]));
            buckets
                .entry(transcripts.as_slice())
                .or_default()
                .push(kmer as u64);
            buckets
        })
        .reduce(Buckets::default, |mut left, right| {
            for (key, mut kmers) in right {
                left.entry(key).or_default().append(&mut kmers);
            }
            left
        });

    let mut buckets = buckets.into_iter().collect::<Vec<(&[u32], Vec<u64>)>>();
    buckets
        .par_iter_mut()
        .for_each(|(_, kmers)| kmers.sort_unstable());
    buckets.par_sort_unstable_by_key(|(_, kmers)| kmers[0]);

    buckets
}

/// Fill group arrays and the (group, occurrences) list of each transcript
fn build_groups<C>(
    counts: &C,
    buckets: &[(&[u32], Vec<u64>)],
    num_transcripts: usize,
    gene_promiscuous: &FxHashSet<u64>,
) -> (KmerGroups, Vec<Vec<(GroupId, u32)>>)
where
    C: KmerCounts,
{
    let mut bins: Vec<Vec<(GroupId, u32)>> = vec![Vec::new(); num_transcripts];
    let mut groups = KmerGroups {
        sizes: Vec::with_capacity(buckets.len()),
        promiscuities: Vec::with_capacity(buckets.len()),
        counts: Vec::with_capacity(buckets.len()),
        biases: vec![1.0; buckets.len()],
        gene_promiscuous: BitVec::with_capacity(buckets.len()),
        offsets: Vec::with_capacity(buckets.len() + 1),
        members: Vec::new(),
    };
    groups.offsets.push(0);

    for (index, (transcripts, kmers)) in buckets.iter().enumerate() {
        let group = index as GroupId;

        // transcript ids are sorted, a repeated id is adjacent to the previous one
        let mut previous = None;
        for &transcript in transcripts.iter() {
            let transcript_bins = &mut bins[transcript as usize];
            if previous == Some(transcript) {
                if let Some(bin) = transcript_bins.last_mut() {
                    bin.1 += 1;
                }
            } else {
                groups.members.push(Member {
                    transcript,
                    slot: transcript_bins.len() as u32,
                });
                transcript_bins.push((group, 1));
            }
            previous = Some(transcript);
        }

        let distinct = groups.members.len() - groups.offsets[index];
        groups.promiscuities.push(distinct as f64);
        groups.offsets.push(groups.members.len());

        groups
            .counts
            .push(kmers.iter().map(|k| counts.count(*k as usize) as f64).sum());
        groups.sizes.push(kmers.len() as u32);
        groups
            .gene_promiscuous
            .push(kmers.iter().any(|k| gene_promiscuous.contains(k)));
    }

    (groups, bins)
}

/// Each transcript must receive exactly one write per bin in an EM pass
fn check_fan_in_degrees(groups: &KmerGroups, transcripts: &[Transcript]) {
    let mut writes = vec![0usize; transcripts.len()];
    for member in groups.members.iter() {
        writes[member.transcript as usize] += 1;
    }

    for (transcript, expected) in transcripts.iter().zip(writes) {
        assert_eq!(
            transcript.fan_in().degree(),
            expected,
            "fan-in degree doesn't match the number of groups writing in transcript"
        );
    }
}
