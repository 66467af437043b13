//! Re-estimation of k-mer group biases from coverage uniformity.
//!
//! Each transcript votes on the bias of the groups it contains, an
//! under-represented group get a bias above 1 and an over-represented one a
//! bias below 1. Votes are weighted by the transcript fidelity, a transcript
//! with a uniform coverage has a fidelity close to 1.

/* crate use */
use rayon::prelude::*;

/* project use */
use crate::model::Model;

/// Weight of the new estimate in the bias update
pub const BIAS_LEARNING_RATE: f64 = 0.25;

/// Fidelity of each transcript, computed from the current means and bins
pub fn fidelities(model: &Model) -> Vec<f64> {
    let groups = model.groups();

    model
        .transcripts()
        .par_iter()
        .map(|transcript| {
            let mean = transcript.mean();
            let length = transcript.length() as f64;

            let mut deviation: f64 = transcript
                .bins()
                .iter()
                .map(|bin| (bin.value() - groups.size(bin.group()) as f64 * mean).abs())
                .sum();

            // positions without k-mer have a null coverage
            deviation += mean * (length - transcript.bins().len() as f64).max(0.0);

            let relative = if length > 0.0 { deviation / length } else { 0.0 };

            1.0 / (1.0 + relative)
        })
        .collect()
}

/// Move each group bias toward the fidelity weighted vote of its transcripts
pub fn update(model: &mut Model) {
    let fidelities = fidelities(model);
    let groups = model.groups();
    let transcripts = model.transcripts();

    let biases = (0..groups.len())
        .into_par_iter()
        .map(|group| {
            let size = groups.size(group) as f64;

            let (vote, total_fidelity) = groups.transcripts(group).iter().fold(
                (0.0, 0.0),
                |(vote, total_fidelity), member| {
                    let transcript = &transcripts[member.transcript as usize];
                    let fidelity = fidelities[member.transcript as usize];
                    let allocation = transcript.bins()[member.slot as usize].value();

                    let vote = if allocation > 0.0 {
                        vote + fidelity * (transcript.mean() * size / allocation)
                    } else {
                        vote
                    };

                    (vote, total_fidelity + fidelity)
                },
            );

            let previous = groups.bias(group);
            if total_fidelity > 0.0 {
                BIAS_LEARNING_RATE * (vote / total_fidelity) + (1.0 - BIAS_LEARNING_RATE) * previous
            } else {
                previous
            }
        })
        .collect::<Vec<f64>>();

    log::debug!(
        "bias range after update [{}, {}]",
        biases.iter().cloned().fold(f64::INFINITY, f64::min),
        biases.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    );

    model.groups.biases = biases;
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::em;

    fn assert_close(value: f64, expected: f64) {
        assert!((value - expected).abs() < 1e-12, "{} != {}", value, expected);
    }

    /// Bins after an EM pass from `means_in`, then transcript means set to 1/2, 1/4, 1/4
    fn model(means_in: &[f64]) -> Model {
        let mut model = crate::tests::three_transcripts_model(false);
        let mut means_out = vec![0.0; 3];
        em::update(&model, means_in, &mut means_out);
        model.set_means(&[0.5, 0.25, 0.25]);

        model
    }

    #[test]
    fn fidelity() {
        let model = model(&[1.0 / 3.0; 3]);
        let fidelities = fidelities(&model);

        // t0: |10 - 0.5| + |10 - 2 * 0.5| + 0.5 * (100 - 2)
        assert_close(fidelities[0], 1.0 / (1.0 + 67.5 / 100.0));
        // t1: |10 - 2 * 0.25| + |7.5 - 0.25| + 0.25 * (200 - 2)
        assert_close(fidelities[1], 1.0 / (1.0 + 66.25 / 200.0));
        // t2: |7.5 - 0.25| + |5 - 0.25| + 0.25 * (150 - 2)
        assert_close(fidelities[2], 1.0 / (1.0 + 49.0 / 150.0));

        assert!(fidelities.iter().all(|f| *f > 0.0 && *f <= 1.0));
    }

    #[test]
    fn null_length() {
        let counts = crate::input::CountTable::new(vec![5], 3, 50.0);
        let mut model = crate::collapse::build(
            &counts,
            &[vec![0]],
            &[0],
            &rustc_hash::FxHashSet::default(),
            &crate::options::Options::default(),
        )
        .unwrap();
        model.set_means(&[1.0]);

        assert_eq!(fidelities(&model), vec![1.0]);
    }

    #[test]
    fn biases() {
        let mut model = model(&[1.0 / 3.0; 3]);
        let fid = fidelities(&model);

        update(&mut model);
        let biases = model.groups().biases();

        // unique groups: vote is mean * size / allocation
        assert_close(biases[0], 0.25 * (0.5 / 10.0) + 0.75);
        assert_close(biases[3], 0.25 * (0.25 / 5.0) + 0.75);

        let shared = (fid[0] * (0.5 * 2.0 / 10.0) + fid[1] * (0.25 * 2.0 / 10.0)) / (fid[0] + fid[1]);
        assert_close(biases[1], 0.25 * shared + 0.75);
    }

    #[test]
    fn null_allocation_doesnt_vote() {
        let mut model = model(&[1.0, 0.0, 0.0]);
        let fid = fidelities(&model);
        assert_eq!(model.transcripts()[1].bins()[0].value(), 0.0);

        update(&mut model);

        // t1 receive nothing from group 1 but its fidelity still count
        let shared = fid[0] * (0.5 * 2.0 / 20.0) / (fid[0] + fid[1]);
        assert_close(model.groups().bias(1), 0.25 * shared + 0.75);
    }
}
