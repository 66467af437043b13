//! One Expectation-Maximization pass over all k-mer groups.

/* crate use */
use rayon::prelude::*;

/* project use */
use crate::model::Model;
use crate::numeric;

/// Compute new relative abundances `means_out` from `means_in`.
///
/// E-step: each k-mer group splits its expected count between the transcripts
/// that contain it, in proportion of their abundance in `means_in`. A group
/// whose transcripts all have a null abundance keeps its previous split.
///
/// M-step: a transcript mean is recomputed as soon as all its groups have been
/// split, by the task that split the last one.
///
/// `means_out` is normalized to sum to one.
pub fn update(model: &Model, means_in: &[f64], means_out: &mut [f64]) {
    assert_eq!(means_in.len(), model.num_transcripts());
    assert_eq!(means_out.len(), model.num_transcripts());

    let groups = model.groups();
    let transcripts = model.transcripts();

    (0..groups.len()).into_par_iter().for_each(|group| {
        let members = groups.transcripts(group);

        let total_mass: f64 = members
            .iter()
            .map(|member| means_in[member.transcript as usize])
            .sum();
        let norm = if total_mass > 0.0 {
            Some(1.0 / total_mass)
        } else {
            None
        };

        for member in members {
            let transcript = &transcripts[member.transcript as usize];

            if let Some(norm) = norm {
                transcript.bins()[member.slot as usize].store(
                    means_in[member.transcript as usize]
                        * norm
                        * groups.bias(group)
                        * groups.count(group),
                );
            }

            transcript
                .fan_in()
                .arrive(|| transcript.set_mean(model.compute_mean(transcript)));
        }
    });

    debug_assert!(transcripts.iter().all(|t| t.fan_in().is_idle()));

    means_out
        .par_iter_mut()
        .zip(transcripts.par_iter())
        .for_each(|(mean, transcript)| {
            *mean = if transcript.bins().is_empty() {
                0.0
            } else {
                transcript.mean()
            }
        });

    numeric::normalize(means_out);
}
