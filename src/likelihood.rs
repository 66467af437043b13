//! Likelihood of an abundance estimate given the current group splits.

/* crate use */
use rayon::prelude::*;

/* project use */
use crate::model::Model;
use crate::numeric;

/// Group probability under which a group doesn't contribute to the likelihood
pub const MIN_GROUP_PROBABILITY: f64 = 1e-20;

/// Abundance or transcript probability under which a transcript doesn't contribute to the likelihood
pub const MIN_TRANSCRIPT_PROBABILITY: f64 = 1e-40;

/// Expected log-likelihood of `means`, per transcript.
///
/// Transcripts are sampled proportionally to their length times their
/// abundance. Only meaningful to compare estimates of the same model.
pub fn expected_log_likelihood(model: &Model, means: &[f64]) -> f64 {
    assert_eq!(means.len(), model.num_transcripts());

    if means.is_empty() {
        return 0.0;
    }

    let transcripts = model.transcripts();

    let mut sampling = means
        .par_iter()
        .zip(transcripts.par_iter())
        .map(|(mean, transcript)| transcript.length() as f64 * mean)
        .collect::<Vec<f64>>();
    numeric::normalize(&mut sampling);

    let groups = model.groups();
    let likelihoods = (0..groups.len())
        .into_par_iter()
        .map(|group| {
            let probability: f64 = groups
                .transcripts(group)
                .iter()
                .map(|member| {
                    let transcript = &transcripts[member.transcript as usize];
                    if transcript.length() == 0 {
                        0.0
                    } else {
                        transcript.bins()[member.slot as usize].value()
                            * (sampling[member.transcript as usize] / transcript.length() as f64)
                    }
                })
                .sum();

            if probability < MIN_GROUP_PROBABILITY {
                0.0
            } else {
                probability.ln()
            }
        })
        .collect::<Vec<f64>>();

    numeric::sum(&likelihoods) / means.len() as f64
}

/// Log-likelihood of `means` as the product over transcripts of the share of their groups they receive
pub fn log_likelihood(model: &Model, means: &[f64]) -> f64 {
    assert_eq!(means.len(), model.num_transcripts());

    let groups = model.groups();
    let likelihoods = model
        .transcripts()
        .par_iter()
        .zip(means.par_iter())
        .map(|(transcript, abundance)| {
            if transcript.bins().is_empty() {
                return 0.0;
            }

            let likelihood = transcript
                .bins()
                .iter()
                .map(|bin| bin.value() / (groups.bias(bin.group()) * groups.count(bin.group())))
                .product::<f64>();

            if *abundance > MIN_TRANSCRIPT_PROBABILITY && likelihood > MIN_TRANSCRIPT_PROBABILITY {
                (abundance * likelihood).ln()
            } else {
                0.0
            }
        })
        .collect::<Vec<f64>>();

    numeric::sum(&likelihoods)
}
