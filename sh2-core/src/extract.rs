//! Copying chunks out of merge files.
//!
//! Extraction runs in two steps: [`plan`] walks table 1 and resolves every chunk
//! to a job (or a reason it had to be skipped), then an [`Extractor`] performs the
//! copies, keeping one open handle per merge file.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::format::{DataChunkEntry, PathPairEntry};
use crate::resolver::IndexResolver;

/// Turn a path from the string pool into a relative path that stays inside the
/// output directory. Both separators are accepted; leading and doubled separators
/// and `.` components are dropped.
pub fn sanitize_logical_path(raw: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for component in raw.split(['/', '\\']) {
        match component {
            "" | "." => continue,
            ".." => return None,
            c if c.contains(':') => return None,
            c => path.push(c),
        }
    }
    (!path.as_os_str().is_empty()).then_some(path)
}

/// Where merge files are opened from.
pub trait MergeFileSource {
    type Reader: Read + Seek;

    /// Open the merge file stored under `logical_path` in the index.
    fn open(&mut self, logical_path: &str) -> Result<Self::Reader>;
}

/// Merge files sitting next to the game executable, stored with upper-case names.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, logical_path: &str) -> Option<PathBuf> {
        sanitize_logical_path(&logical_path.to_ascii_uppercase()).map(|p| self.root.join(p))
    }
}

impl MergeFileSource for DirectorySource {
    type Reader = File;

    fn open(&mut self, logical_path: &str) -> Result<File> {
        let Some(path) = self.path_for(logical_path) else {
            bail!("refusing to open merge file outside the archive directory: {:?}", logical_path);
        };
        File::open(&path).with_context(|| format!("can't open merge file {:?}", path))
    }
}

/// One file to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionJob {
    /// Path as stored in the index.
    pub logical_path: String,
    /// Sanitized path relative to the output directory.
    pub relative_path: PathBuf,
    pub merge_file_path: String,
    pub offset: u32,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The chunk's path address is not in the string pool.
    MissingPath { path_address: u32 },
    /// The backward probe found no merge file for the chunk.
    MissingMergeFile { parent_address: u32 },
    /// The merge file's own path address is not in the string pool.
    MissingMergeFilePath { path_address: u32 },
    /// The path would escape the output directory.
    UnsafePath { path: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingPath { path_address } => {
                write!(f, "no file path at 0x{:X}", path_address)
            }
            SkipReason::MissingMergeFile { parent_address } => {
                write!(f, "no merge file found from parent address 0x{:X}", parent_address)
            }
            SkipReason::MissingMergeFilePath { path_address } => {
                write!(f, "no merge file path at 0x{:X}", path_address)
            }
            SkipReason::UnsafePath { path } => write!(f, "unsafe path {:?}", path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub entry: PathPairEntry,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionPlan {
    pub jobs: Vec<ExtractionJob>,
    pub skipped: Vec<Skipped>,
    /// Table 1 entries that point at something other than a chunk.
    pub non_chunk_entries: usize,
}

/// Resolve every table 1 entry that refers to a chunk.
///
/// `lower_bound` is where the index starts in the executable; the parent probe
/// never goes below it.
pub fn plan(resolver: &IndexResolver, lower_bound: u32) -> ExtractionPlan {
    let mut plan = ExtractionPlan::default();

    for entry in resolver.path_pairs() {
        let Some(chunk) = resolver.resolve_data_chunk(entry.file_address) else {
            plan.non_chunk_entries += 1;
            continue;
        };

        match plan_one(resolver, entry, &chunk, lower_bound) {
            Ok(job) => plan.jobs.push(job),
            Err(reason) => {
                log::warn!("skipping {}: {}", entry, reason);
                plan.skipped.push(Skipped { entry: *entry, reason });
            }
        }
    }

    plan
}

fn plan_one(
    resolver: &IndexResolver,
    entry: &PathPairEntry,
    chunk: &DataChunkEntry,
    lower_bound: u32,
) -> std::result::Result<ExtractionJob, SkipReason> {
    let logical_path = resolver
        .resolve_path(entry.path_address)
        .ok_or(SkipReason::MissingPath { path_address: entry.path_address })?;

    let merge_file = resolver
        .resolve_merge_file_for_chunk(chunk, lower_bound)
        .ok_or(SkipReason::MissingMergeFile { parent_address: chunk.parent_address })?;

    let merge_file_path = resolver
        .resolve_path(merge_file.path_address)
        .ok_or(SkipReason::MissingMergeFilePath { path_address: merge_file.path_address })?;

    let relative_path = sanitize_logical_path(logical_path)
        .ok_or_else(|| SkipReason::UnsafePath { path: logical_path.to_string() })?;
    if sanitize_logical_path(merge_file_path).is_none() {
        return Err(SkipReason::UnsafePath { path: merge_file_path.to_string() });
    }

    Ok(ExtractionJob {
        logical_path: logical_path.to_string(),
        relative_path,
        merge_file_path: merge_file_path.to_string(),
        offset: chunk.chunk_offset,
        length: chunk.chunk_length,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub files: usize,
    pub bytes: u64,
    pub skipped: usize,
}

/// Copy `length` bytes at `offset` from `reader` into `writer`.
///
/// Fails if the reader ends before the whole range was copied.
pub fn copy_range<R, W>(reader: &mut R, writer: &mut W, offset: u32, length: u32) -> Result<u64>
where
    R: Read + Seek + ?Sized,
    W: Write + ?Sized,
{
    reader.seek(SeekFrom::Start(offset as u64))?;
    let copied = io::copy(&mut reader.take(length as u64), writer)?;
    if copied != length as u64 {
        bail!(
            "short copy: wanted 0x{:X} bytes at 0x{:X}, only 0x{:X} available",
            length,
            offset,
            copied
        );
    }
    Ok(copied)
}

/// Performs extraction jobs, caching one reader per merge file.
pub struct Extractor<S: MergeFileSource> {
    source: S,
    handles: HashMap<String, S::Reader>,
    out_dir: PathBuf,
    dry_run: bool,
}

impl<S: MergeFileSource> Extractor<S> {
    pub fn new(source: S, out_dir: impl AsRef<Path>) -> Self {
        Self {
            source,
            handles: HashMap::new(),
            out_dir: out_dir.as_ref().to_path_buf(),
            dry_run: false,
        }
    }

    /// Validate jobs against the merge files without writing anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn destination(&self, job: &ExtractionJob) -> PathBuf {
        self.out_dir.join(&job.relative_path)
    }

    fn merge_file(&mut self, logical_path: &str) -> Result<&mut S::Reader> {
        match self.handles.entry(logical_path.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let reader = self.source.open(logical_path)?;
                Ok(e.insert(reader))
            }
        }
    }

    /// Copy one job's bytes into `writer`.
    pub fn copy_job<W: Write + ?Sized>(&mut self, job: &ExtractionJob, writer: &mut W) -> Result<u64> {
        let reader = self.merge_file(&job.merge_file_path)?;
        copy_range(reader, writer, job.offset, job.length)
            .with_context(|| format!("can't copy {} from {}", job.logical_path, job.merge_file_path))
    }

    fn check_job(&mut self, job: &ExtractionJob) -> Result<()> {
        let reader = self.merge_file(&job.merge_file_path)?;
        let len = reader.seek(SeekFrom::End(0))?;
        let end = job.offset as u64 + job.length as u64;
        if end > len {
            bail!(
                "{} ends at 0x{:X}, past the end of {} (0x{:X} bytes)",
                job.logical_path,
                end,
                job.merge_file_path,
                len
            );
        }
        Ok(())
    }

    /// Extract one job to its destination file. Returns the number of bytes written.
    pub fn extract_job(&mut self, job: &ExtractionJob) -> Result<u64> {
        if self.dry_run {
            self.check_job(job)?;
            return Ok(job.length as u64);
        }

        let destination = self.destination(job);
        if let Some(dir) = destination.parent() {
            fs::create_dir_all(dir).with_context(|| format!("can't create destination dir {:?}", dir))?;
        }
        let file = File::create(&destination)
            .with_context(|| format!("can't create destination file {:?}", destination))?;
        let mut writer = BufWriter::new(file);
        let result = self.copy_job(job, &mut writer).and_then(|n| {
            writer.flush()?;
            Ok(n)
        });
        let copied = match result {
            Ok(n) => n,
            Err(err) => {
                drop(writer);
                // no truncated files left behind
                let _ = fs::remove_file(&destination);
                return Err(err);
            }
        };

        log::debug!(
            "extracted {} bytes from {} to {}",
            copied,
            job.merge_file_path,
            destination.display()
        );
        Ok(copied)
    }

    pub fn run(&mut self, plan: &ExtractionPlan) -> Result<ExtractionSummary> {
        let mut summary = ExtractionSummary { skipped: plan.skipped.len(), ..Default::default() };
        for job in &plan.jobs {
            summary.bytes += self.extract_job(job)?;
            summary.files += 1;
        }
        Ok(summary)
    }

    /// Number of merge files opened so far.
    pub fn open_merge_files(&self) -> usize {
        self.handles.len()
    }
}
