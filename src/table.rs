//! Read collaborator tables from text files.
//!
//! Files are memory mapped and their lines parsed in parallel, the index of a
//! line is the id of the k-mer or transcript it describes.

/* std use */
use std::str::FromStr;

/* crate use */
use bstr::ByteSlice;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

/* project use */
use crate::error;
use crate::input::{CountTable, TranscriptNames};

/// Read-only memory map of a file, None if file is empty
fn map<P>(path: P) -> error::Result<Option<memmap2::Mmap>>
where
    P: AsRef<std::path::Path>,
{
    let length = path
        .as_ref()
        .metadata()
        .map_err(|source| error::Error::MetaDataFile { source })?
        .len();

    if length == 0 {
        return Ok(None);
    }

    let file =
        std::fs::File::open(path).map_err(|source| error::Error::OpenFile { source })?;

    let mem = unsafe {
        memmap2::MmapOptions::new()
            .map(&file)
            .map_err(|source| error::Error::MapFile { source })?
    };

    Ok(Some(mem))
}

/// Apply `parser` on each line with its 1-based number, skip lines `parser` reject with None
fn parse_lines<P, T, F>(path: P, parser: F) -> error::Result<Vec<T>>
where
    P: AsRef<std::path::Path>,
    T: Send,
    F: Fn(&[u8], usize) -> error::Result<Option<T>> + Sync,
{
    let mem = match map(path)? {
        Some(mem) => mem,
        None => return Ok(Vec::new()),
    };

    let lines = mem.lines().collect::<Vec<&[u8]>>();

    let values = lines
        .par_iter()
        .enumerate()
        .map(|(index, line)| parser(*line, index + 1))
        .collect::<error::Result<Vec<Option<T>>>>()?;

    Ok(values.into_iter().flatten().collect())
}

fn parse_field<T>(field: &[u8], line: usize) -> error::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    field
        .to_str()
        .map_err(|e| error::Error::MalformedLine {
            line,
            reason: e.to_string(),
        })?
        .trim()
        .parse::<T>()
        .map_err(|e| error::Error::MalformedLine {
            line,
            reason: format!("'{}' {}", field.as_bstr(), e),
        })
}

fn is_comment(line: &[u8]) -> bool {
    let line = line.trim();
    line.is_empty() || line[0] == b'#'
}

/// Read a count table, one count per line
pub fn read_counts<P>(path: P, kmer_length: u32, average_read_length: f64) -> error::Result<CountTable>
where
    P: AsRef<std::path::Path>,
{
    let counts = parse_lines(path, |line, number| parse_field::<u32>(line, number).map(Some))?;

    log::info!("{} kmer counts loaded", counts.len());

    Ok(CountTable::new(counts, kmer_length, average_read_length))
}

/// Read the transcripts that contain each k-mer, one whitespace separated list per line
pub fn read_containment<P>(path: P) -> error::Result<Vec<Vec<u32>>>
where
    P: AsRef<std::path::Path>,
{
    parse_lines(path, |line, number| {
        let mut ids = line
            .fields()
            .map(|field| parse_field::<u32>(field, number))
            .collect::<error::Result<Vec<u32>>>()?;
        ids.sort_unstable();

        Ok(Some(ids))
    })
}

/// Read transcript names and lengths, one `name<TAB>length` per line
pub fn read_transcripts<P>(path: P) -> error::Result<(TranscriptNames, Vec<u32>)>
where
    P: AsRef<std::path::Path>,
{
    let records = parse_lines(path, |line, number| {
        if is_comment(line) {
            return Ok(None);
        }

        let sep = memchr::memchr(b'\t', line).ok_or_else(|| error::Error::MalformedLine {
            line: number,
            reason: "no tabulation between name and length".to_string(),
        })?;

        let name = line[..sep]
            .to_str()
            .map_err(|e| error::Error::MalformedLine {
                line: number,
                reason: e.to_string(),
            })?
            .to_string();
        let length = parse_field::<u32>(&line[sep + 1..], number)?;

        Ok(Some((name, length)))
    })?;

    let (names, lengths): (Vec<String>, Vec<u32>) = records.into_iter().unzip();

    log::info!("{} transcripts loaded", names.len());

    Ok((TranscriptNames::new(names), lengths))
}

/// Read a set of k-mer ids, one per line
pub fn read_id_set<P>(path: P) -> error::Result<FxHashSet<u64>>
where
    P: AsRef<std::path::Path>,
{
    let ids = parse_lines(path, |line, number| {
        if is_comment(line) {
            Ok(None)
        } else {
            parse_field::<u64>(line, number).map(Some)
        }
    })?;

    Ok(ids.into_iter().collect())
}
