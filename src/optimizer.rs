//! Drive the estimation of transcript abundances on a dedicated thread pool.

/* crate use */
use rustc_hash::FxHashSet;

/* project use */
use crate::bias;
use crate::collapse;
use crate::em;
use crate::error;
use crate::input::{KmerCounts, TranscriptGeneMap};
use crate::likelihood;
use crate::model::Model;
use crate::options::Options;
use crate::report;
use crate::squarem::Squarem;

/// Quantification of one sample against one transcript set
pub struct Optimizer<G>
where
    G: TranscriptGeneMap,
{
    model: Model,
    names: G,
    pool: rayon::ThreadPool,
    options: Options,
    average_read_length: f64,
}

impl<G> Optimizer<G>
where
    G: TranscriptGeneMap,
{
    /// Collapse k-mers in groups and build the model.
    ///
    /// See [collapse::build] for the description of inputs.
    pub fn new<C>(
        counts: &C,
        names: G,
        transcripts_for_kmer: &[Vec<u32>],
        lengths: &[u32],
        gene_promiscuous: &FxHashSet<u64>,
        options: Options,
    ) -> error::Result<Self>
    where
        C: KmerCounts,
    {
        if names.num_transcripts() != lengths.len() {
            return Err(error::Error::SizeMismatch {
                table: "transcript length",
                expected: names.num_transcripts(),
                found: lengths.len(),
            });
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .build()
            .map_err(|source| error::Error::ThreadPool { source })?;

        log::info!("quantification run with {} threads", pool.current_num_threads());

        let model = pool.install(|| {
            collapse::build(
                counts,
                transcripts_for_kmer,
                lengths,
                gene_promiscuous,
                &options,
            )
        })?;

        Ok(Self {
            model,
            names,
            pool,
            options,
            average_read_length: counts.average_read_length(),
        })
    }

    /// Groups and transcripts of the run
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Transcript names used in reports
    pub fn names(&self) -> &G {
        &self.names
    }

    /// Options the optimizer was built with
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Seed bins with the group counts and return the first estimate
    pub fn initial_means(&mut self) -> Vec<f64> {
        let model = &mut self.model;

        self.pool.install(|| model.initial_means())
    }

    /// One EM pass, see [em::update]
    pub fn em_update(&self, means_in: &[f64], means_out: &mut [f64]) {
        self.pool
            .install(|| em::update(&self.model, means_in, means_out))
    }

    /// See [likelihood::expected_log_likelihood]
    pub fn expected_log_likelihood(&self, means: &[f64]) -> f64 {
        self.pool
            .install(|| likelihood::expected_log_likelihood(&self.model, means))
    }

    /// See [likelihood::log_likelihood]
    pub fn log_likelihood(&self, means: &[f64]) -> f64 {
        self.pool
            .install(|| likelihood::log_likelihood(&self.model, means))
    }

    /// Set transcript means to `means` and re-estimate group biases
    pub fn update_biases(&mut self, means: &[f64]) {
        let model = &mut self.model;

        self.pool.install(|| {
            model.set_means(means);
            bias::update(model);
        })
    }

    /// Run `num_iterations` accelerated EM iterations from the initial estimate
    pub fn optimize(&mut self, num_iterations: usize) -> Vec<f64> {
        let means = self.initial_means();
        let mut squarem = Squarem::new(self.options.squarem, means);

        log::info!(
            "optimize {} transcripts over {} groups for {} iterations",
            self.model.num_transcripts(),
            self.model.groups().len(),
            num_iterations
        );

        for iteration in 0..num_iterations {
            let model = &self.model;
            let step = self.pool.install(|| squarem.step(model));

            log::debug!(
                "iteration {}: delta = {}, alpha = {}, negative expected log-likelihood = {}",
                iteration,
                step.delta,
                step.alpha,
                step.neg_log_likelihood
            );

            if let Some(interval) = self.options.bias_interval {
                if iteration > 0 && iteration % interval == 0 && iteration + 1 < num_iterations {
                    log::debug!("iteration {}: update biases", iteration);
                    self.update_biases(squarem.theta());
                }
            }
        }

        let means = squarem.into_theta();

        log::info!("final log-likelihood {}", self.log_likelihood(&means));

        means
    }

    /// Write TPM and RPKM of each transcript, see [report::write_abundances]
    pub fn write_abundances<P>(&self, path: P, header: &str, means: &[f64]) -> error::Result<()>
    where
        P: AsRef<std::path::Path>,
    {
        let path = path.as_ref();

        self.pool.install(|| {
            report::write_abundances(
                path,
                &self.model,
                &self.names,
                self.average_read_length,
                header,
                means,
            )
        })
    }

    /// Write bins of each transcript, see [report::write_coverage]
    pub fn write_coverage<P>(&self, path: P) -> error::Result<()>
    where
        P: AsRef<std::path::Path>,
    {
        let path = path.as_ref();

        self.pool
            .install(|| report::write_coverage(path, &self.model, &self.names))
    }
}
