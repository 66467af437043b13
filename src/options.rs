//! Run parameters of the quantification.

/// Step length control of the SQUAREM accelerator.
///
/// Defaults are those of the R SQUAREM package.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquaremParams {
    /// Initial and lower bound of the minimal step length
    pub min_step0: f64,
    /// Initial and lower bound of the maximal step length
    pub max_step0: f64,
    /// Factor applied to step bounds when they are hit
    pub m_step: f64,
    /// Increase of negative log-likelihood tolerated before an extrapolation is rejected, infinite value disable the check
    pub nonmonotonicity: f64,
    /// Distance of step length to 1 above which an extra EM step stabilizes the extrapolation
    pub stabilization: f64,
}

impl Default for SquaremParams {
    fn default() -> Self {
        Self {
            min_step0: crate::DEFAULT_MIN_STEP,
            max_step0: crate::DEFAULT_MAX_STEP,
            m_step: crate::DEFAULT_M_STEP,
            nonmonotonicity: crate::DEFAULT_NONMONOTONICITY,
            stabilization: crate::DEFAULT_STABILIZATION,
        }
    }
}

/// Options of an [Optimizer](crate::Optimizer)
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub threads: usize,
    pub discard_zero_count_kmers: bool,
    pub promiscuous_cutoff: Option<u32>,
    pub bias_interval: Option<usize>,
    pub squarem: SquaremParams,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            discard_zero_count_kmers: true,
            promiscuous_cutoff: None,
            bias_interval: None,
            squarem: SquaremParams::default(),
        }
    }
}

impl Options {
    /// Number of worker threads, 0 let rayon choose
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// If true k-mers never seen in reads don't take part in groups
    pub fn with_discard_zero_count_kmers(mut self, discard: bool) -> Self {
        self.discard_zero_count_kmers = discard;
        self
    }

    /// Occurrences of a group in a transcript above which its position isn't counted in effective length
    pub fn with_promiscuous_cutoff(mut self, cutoff: Option<u32>) -> Self {
        self.promiscuous_cutoff = cutoff;
        self
    }

    /// Re-estimate k-mer group biases every `interval` accelerator iterations
    pub fn with_bias_interval(mut self, interval: Option<usize>) -> Self {
        self.bias_interval = interval.filter(|i| *i > 0);
        self
    }

    pub fn with_squarem(mut self, params: SquaremParams) -> Self {
        self.squarem = params;
        self
    }
}
