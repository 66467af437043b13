//! Write abundance estimates and coverage of transcripts.

/* std use */
use std::io::Write;

/* crate use */
use rayon::prelude::*;

/* project use */
use crate::error;
use crate::input::TranscriptGeneMap;
use crate::model::Model;
use crate::numeric;

/// TPM under this value are reported as 0
pub const MIN_TPM: f64 = 0.05;

/// RPKM under this value are reported as 0
pub const MIN_RPKM: f64 = 0.01;

/// Normalized expression of one transcript
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Abundance {
    pub tpm: f64,
    pub rpkm: f64,
}

/// Convert relative abundances `means` in TPM and RPKM
pub fn abundances(model: &Model, average_read_length: f64, means: &[f64]) -> Vec<Abundance> {
    assert_eq!(means.len(), model.num_transcripts());

    let transcripts = model.transcripts();

    let mut fractions = means.to_vec();
    numeric::normalize(&mut fractions);

    let mut nucleotides = fractions
        .par_iter()
        .zip(transcripts.par_iter())
        .map(|(fraction, transcript)| fraction * transcript.effective_length())
        .collect::<Vec<f64>>();
    numeric::normalize(&mut nucleotides);

    let total = model.groups().total_count();
    let kmers_per_read = average_read_length - model.kmer_length() as f64 + 1.0;

    fractions
        .par_iter()
        .zip(nucleotides.par_iter())
        .zip(transcripts.par_iter())
        .map(|((fraction, nucleotide), transcript)| {
            // expected number of k-mers and reads from this transcript
            let kmers = total * nucleotide;
            let reads = kmers / kmers_per_read;

            let read_length = transcript.length() as f64 - average_read_length.floor() + 1.0;
            let effective_length = transcript.effective_length();

            let mut rpkm = if read_length > 0.0 && reads > 0.0 && effective_length > 0.0 {
                1e9 * (kmers / (total * effective_length))
            } else {
                0.0
            };
            if rpkm < MIN_RPKM {
                rpkm = 0.0;
            }

            let mut tpm = fraction * 1e6;
            if tpm < MIN_TPM {
                tpm = 0.0;
            }

            Abundance { tpm, rpkm }
        })
        .collect()
}

fn create<P>(path: P) -> error::Result<std::io::BufWriter<std::fs::File>>
where
    P: AsRef<std::path::Path>,
{
    Ok(std::io::BufWriter::new(
        std::fs::File::create(path).map_err(|source| error::Error::CreateFile { source })?,
    ))
}

/// Write `header` followed by one `name length tpm rpkm` line per transcript
pub fn write_abundances<P, G>(
    path: P,
    model: &Model,
    names: &G,
    average_read_length: f64,
    header: &str,
    means: &[f64],
) -> error::Result<()>
where
    P: AsRef<std::path::Path>,
    G: TranscriptGeneMap,
{
    let abundances = abundances(model, average_read_length, means);
    let mut output = create(path)?;

    writeln!(output, "{}# Transcript\tLength\tTPM\tRPKM", header)
        .map_err(|source| error::Error::WriteFile { source })?;

    for (id, (abundance, transcript)) in abundances.iter().zip(model.transcripts()).enumerate() {
        writeln!(
            output,
            "{}\t{}\t{}\t{}",
            names.transcript_name(id),
            transcript.length(),
            abundance.tpm,
            abundance.rpkm
        )
        .map_err(|source| error::Error::WriteFile { source })?;
    }

    output
        .flush()
        .map_err(|source| error::Error::WriteFile { source })?;

    log::info!("abundances of {} transcripts written", abundances.len());

    Ok(())
}

/// Write the bins of each transcript
pub fn write_coverage<P, G>(path: P, model: &Model, names: &G) -> error::Result<()>
where
    P: AsRef<std::path::Path>,
    G: TranscriptGeneMap,
{
    let mut output = create(path)?;

    write!(
        output,
        "# numtranscripts_\n\
         # transcript_name_{{1}} num_kmers_{{1}} count_1 count_2 ... count_{{num_kmers}}\n\
         # ... \n\
         # transcript_name_{{numtranscripts_}} num_kmers_{{numtranscripts_}} count_1 count_2 ... count_{{num_kmers_{{numtranscripts_}}}}\n\
         {}\n",
        model.num_transcripts()
    )
    .map_err(|source| error::Error::WriteFile { source })?;

    let lines = model
        .transcripts()
        .par_iter()
        .enumerate()
        .map(|(id, transcript)| {
            let mut line = format!("{} {}", names.transcript_name(id), transcript.bins().len());
            for bin in transcript.bins() {
                line.push(' ');
                line.push_str(&bin.value().to_string());
            }
            line.push('\n');

            line
        })
        .collect::<Vec<String>>();

    for line in lines {
        output
            .write_all(line.as_bytes())
            .map_err(|source| error::Error::WriteFile { source })?;
    }

    output
        .flush()
        .map_err(|source| error::Error::WriteFile { source })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::input::TranscriptNames;

    fn names() -> TranscriptNames {
        TranscriptNames::new(vec!["t0".to_string(), "t1".to_string(), "t2".to_string()])
    }

    #[test]
    fn tpm_rpkm() {
        let model = crate::tests::three_transcripts_model(false);
        let means = [16.0 / 47.0, 21.0 / 47.0, 10.0 / 47.0];
        let result = abundances(&model, 50.0, &means);

        let effective = [98.0, 198.0, 148.0];
        let nucleotide: f64 = means.iter().zip(effective.iter()).map(|(m, e)| m * e).sum();

        for i in 0..3 {
            assert!((result[i].tpm - means[i] * 1e6).abs() < 1e-6);

            let expected = 1e9 * means[i] / nucleotide;
            assert!((result[i].rpkm - expected).abs() / expected < 1e-9);
        }

        let tpm: f64 = result.iter().map(|a| a.tpm).sum();
        assert!((tpm - 1e6).abs() < 1e-6);
    }

    #[test]
    fn unnormalized_means() {
        let model = crate::tests::three_transcripts_model(false);

        let normalized = abundances(&model, 50.0, &[0.25, 0.5, 0.25]);
        let scaled = abundances(&model, 50.0, &[1.0, 2.0, 1.0]);

        for (a, b) in normalized.iter().zip(scaled.iter()) {
            assert!((a.tpm - b.tpm).abs() <= 1e-12 * a.tpm);
            assert!((a.rpkm - b.rpkm).abs() <= 1e-12 * a.rpkm);
        }
    }

    #[test]
    fn zeroed() {
        let model = crate::tests::three_transcripts_model(false);

        // reads longer than t0
        let result = abundances(&model, 150.0, &[0.25, 0.5, 0.25]);
        assert_eq!(result[0].rpkm, 0.0);
        assert!(result[0].tpm > 0.0);
        assert!(result[1].rpkm > 0.0);
        assert!(result[2].rpkm > 0.0);

        let result = abundances(&model, 50.0, &[1.0, 0.0, 0.0]);
        assert_eq!(result[0].tpm, 1e6);
        assert_eq!(result[1], Abundance { tpm: 0.0, rpkm: 0.0 });
        assert_eq!(result[2], Abundance { tpm: 0.0, rpkm: 0.0 });
    }

    #[test]
    fn abundance_file() {
        let model = crate::tests::three_transcripts_model(false);
        let file = tempfile::NamedTempFile::new().unwrap();

        write_abundances(
            file.path(),
            &model,
            &names(),
            50.0,
            "# kmer_quant\n# k = 3\n",
            &[0.25, 0.5, 0.25],
        )
        .unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines = content.lines().collect::<Vec<&str>>();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "# kmer_quant");
        assert_eq!(lines[1], "# k = 3");
        assert_eq!(lines[2], "# Transcript\tLength\tTPM\tRPKM");

        let fields = lines[4].split('\t').collect::<Vec<&str>>();
        assert_eq!(fields[0], "t1");
        assert_eq!(fields[1], "200");
        assert_eq!(fields[2].parse::<f64>().unwrap(), 500000.0);

        let tpm: f64 = lines[3..]
            .iter()
            .map(|l| l.split('\t').nth(2).unwrap().parse::<f64>().unwrap())
            .sum();
        assert!((tpm - 1e6).abs() < 1e-6);
    }

    #[test]
    fn coverage_file() {
        let mut model = crate::tests::three_transcripts_model(false);
        model.initial_means();
        let file = tempfile::NamedTempFile::new().unwrap();

        write_coverage(file.path(), &model, &names()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines = content.lines().collect::<Vec<&str>>();

        assert_eq!(lines.len(), 8);
        assert!(lines[..4].iter().all(|l| l.starts_with('#')));
        assert_eq!(lines[0], "# numtranscripts_");
        assert_eq!(lines[4], "3");
        assert_eq!(lines[5], "t0 2 10 10");
        assert_eq!(lines[6], "t1 2 10 7.5");
        assert_eq!(lines[7], "t2 2 7.5 5");
    }

    #[test]
    fn unwritable() {
        let model = crate::tests::three_transcripts_model(false);

        assert!(matches!(
            write_coverage("/this/path/doesnt/exist/coverage.txt", &model, &names()),
            Err(error::Error::CreateFile { .. })
        ));
    }
}
