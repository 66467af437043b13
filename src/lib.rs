//! Estimate transcript abundances from k-mer counts.
//!
//! K-mers present in the same transcripts are collapsed in groups, an
//! Expectation-Maximization accelerated by SQUAREM distributes group counts
//! between transcripts. Each EM pass run in parallel over groups, a transcript
//! is updated by the last task that write in it.

pub mod bias;
pub mod collapse;
pub mod em;
pub mod error;
pub mod input;
pub mod likelihood;
pub mod model;
pub mod numeric;
pub mod optimizer;
pub mod options;
pub mod report;
pub mod squarem;
pub mod sync;
pub mod table;

pub use error::Error;
pub use input::{CountTable, KmerCounts, TranscriptGeneMap, TranscriptNames};
pub use optimizer::Optimizer;
pub use options::{Options, SquaremParams};

/// Default initial minimal step length of SQUAREM
pub const DEFAULT_MIN_STEP: f64 = 1.0;

/// Default initial maximal step length of SQUAREM
pub const DEFAULT_MAX_STEP: f64 = 1.0;

/// Default step bound multiplier of SQUAREM
pub const DEFAULT_M_STEP: f64 = 4.0;

/// Default tolerated increase of negative log-likelihood
pub const DEFAULT_NONMONOTONICITY: f64 = 1.0;

/// Default distance of the step length to 1 above which a stabilization EM pass is done
pub const DEFAULT_STABILIZATION: f64 = 0.01;
