#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("kmer_quant failled to read file metadata {source}")]
    MetaDataFile { source: std::io::Error },

    #[error("kmer_quant can't open file {source}")]
    OpenFile { source: std::io::Error },

    #[error("kmer_quant can't map file on memory {source}")]
    MapFile { source: std::io::Error },

    #[error("kmer_quant can't create output file {source}")]
    CreateFile { source: std::io::Error },

    #[error("kmer_quant can't write in output file {source}")]
    WriteFile { source: std::io::Error },

    #[error("line {line} of table isn't valid: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("{table} table contains {found} entries but {expected} was expected")]
    SizeMismatch {
        table: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("transcript id {id} is out of range, there are only {num_transcripts} transcripts")]
    TranscriptOutOfRange { id: u32, num_transcripts: usize },

    #[error("kmer_quant can't build thread pool {source}")]
    ThreadPool { source: rayon::ThreadPoolBuildError },
}

pub type Result<T> = std::result::Result<T, Error>;
