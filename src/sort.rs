//! External sorter.

use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display};
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::finalize::promote;
use crate::pool::WorkerPool;
use crate::record::Record;
use crate::reducer::MergeReducer;
use crate::registry::RunRegistry;
use crate::run::RunDir;
use crate::segment::{file_length, Segmenter};
use crate::worker::{ComparisonSorter, SegmentSortWorker, SegmentSorter};

/// Default segment size: 16 MiB.
pub const DEFAULT_SEGMENT_SIZE: u64 = 16 * 1024 * 1024;
/// Default maximum number of concurrent workers.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Invalid sorter configuration or invocation.
    Argument(String),
    /// Input file is empty.
    EmptyInput(PathBuf),
    /// Input length is not a multiple of the record width.
    MisalignedInput { length: u64, record_width: usize },
    /// Temporary directory creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
    /// Common I/O error.
    IO(io::Error),
    /// Sorted run could not be promoted to the output path.
    Rename { from: PathBuf, to: PathBuf, source: io::Error },
    /// Uncategorized failure.
    Unknown(String),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) => Some(err),
            SortError::ThreadPoolBuildError(err) => Some(err),
            SortError::IO(err) => Some(err),
            SortError::Rename { source, .. } => Some(source),
            SortError::Argument(_)
            | SortError::EmptyInput(_)
            | SortError::MisalignedInput { .. }
            | SortError::Unknown(_) => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::Argument(msg) => write!(f, "invalid argument: {}", msg),
            SortError::EmptyInput(path) => write!(f, "input file {} is empty", path.display()),
            SortError::MisalignedInput { length, record_width } => write!(
                f,
                "input length {} is not a multiple of the record width {}",
                length, record_width
            ),
            SortError::TempDir(err) => write!(f, "temporary directory not created: {}", err),
            SortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::Rename { from, to, source } => write!(
                f,
                "can't move {} to {}: {}",
                from.display(),
                to.display(),
                source
            ),
            SortError::Unknown(msg) => write!(f, "unknown error: {}", msg),
        }
    }
}

/// Sort job phase. Phases are passed strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    Segmenting,
    LocalSorting,
    Merging,
    Finalizing,
    Done,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Segmenting => "segmenting",
            Phase::LocalSorting => "local sorting",
            Phase::Merging => "merging",
            Phase::Finalizing => "finalizing",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Completed sort job summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortStats {
    /// Number of sorted records.
    pub records: u64,
    /// Number of input segments (initial runs).
    pub segments: usize,
    /// Number of merge rounds.
    pub merge_rounds: usize,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder<T = u32, S = ComparisonSorter>
where
    T: Record,
    S: SegmentSorter<T>,
{
    /// Maximum segment size in bytes.
    segment_size: u64,
    /// Maximum number of concurrently running tasks.
    max_workers: usize,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Segment sort strategy.
    sorter: S,

    /// Record type.
    item_type: PhantomData<T>,
}

impl<T, S> ExternalSorterBuilder<T, S>
where
    T: Record,
    S: SegmentSorter<T>,
{
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter<T, S>, SortError> {
        ExternalSorter::new(
            self.segment_size,
            self.max_workers,
            self.tmp_dir.as_deref(),
            self.sorter,
            self.rw_buf_size,
        )
    }

    /// Sets maximum segment size in bytes. Must be a positive multiple of the record width.
    pub fn with_segment_size(mut self, segment_size: u64) -> ExternalSorterBuilder<T, S> {
        self.segment_size = segment_size;
        return self;
    }

    /// Sets maximum number of concurrently running sort and merge tasks.
    pub fn with_max_workers(mut self, max_workers: usize) -> ExternalSorterBuilder<T, S> {
        self.max_workers = max_workers;
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder<T, S> {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets run read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder<T, S> {
        self.rw_buf_size = Some(buf_size);
        return self;
    }

    /// Sets segment sort strategy.
    pub fn with_sorter(mut self, sorter: S) -> ExternalSorterBuilder<T, S> {
        self.sorter = sorter;
        return self;
    }
}

impl<T, S> Default for ExternalSorterBuilder<T, S>
where
    T: Record,
    S: SegmentSorter<T>,
{
    fn default() -> Self {
        ExternalSorterBuilder {
            segment_size: DEFAULT_SEGMENT_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            tmp_dir: None,
            rw_buf_size: None,
            sorter: S::default(),
            item_type: PhantomData,
        }
    }
}

/// External sorter.
pub struct ExternalSorter<T = u32, S = ComparisonSorter>
where
    T: Record,
    S: SegmentSorter<T>,
{
    /// Sort and merge worker pool.
    pool: WorkerPool,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Maximum segment size in bytes.
    segment_size: u64,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Segment sort strategy.
    sorter: S,

    /// Record type.
    item_type: PhantomData<T>,
}

impl<T, S> ExternalSorter<T, S>
where
    T: Record,
    S: SegmentSorter<T>,
{
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `segment_size` - Maximum number of input bytes sorted in memory by a single task.
    /// * `max_workers` - Maximum number of concurrently running tasks in both sort and merge phases.
    /// * `tmp_path` - Directory to be used to store temporary data. If parameter is [`None`] the output file
    ///   directory will be used.
    /// * `sorter` - Segment sort strategy.
    /// * `rw_buf_size` - Run files read/write buffer size.
    pub fn new(
        segment_size: u64,
        max_workers: usize,
        tmp_path: Option<&Path>,
        sorter: S,
        rw_buf_size: Option<usize>,
    ) -> Result<Self, SortError> {
        if segment_size == 0 || segment_size % T::WIDTH as u64 != 0 {
            return Err(SortError::Argument(format!(
                "segment size {} is not a positive multiple of the record width {}",
                segment_size,
                T::WIDTH
            )));
        }
        if max_workers == 0 {
            return Err(SortError::Argument("workers number must be positive".to_string()));
        }

        return Ok(ExternalSorter {
            pool: WorkerPool::new(max_workers).map_err(SortError::ThreadPoolBuildError)?,
            tmp_dir: tmp_path.map(Into::into),
            segment_size,
            rw_buf_size,
            sorter,
            item_type: PhantomData,
        });
    }

    fn init_run_dir(&self, output: &Path) -> Result<RunDir, SortError> {
        let parent = match self.tmp_dir.as_deref() {
            Some(tmp_dir) => tmp_dir,
            None => match output.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            },
        };
        let run_dir = RunDir::new(parent).map_err(SortError::TempDir)?;

        log::info!("using {} as a temporary directory", run_dir.path().display());

        return Ok(run_dir);
    }

    fn enter(&self, phase: Phase) {
        log::info!("phase: {}", phase);
    }

    /// Sorts records of the `input` file and writes them to the `output` file.
    ///
    /// Any file existing at `output` is replaced only if the whole job succeeds. If the job fails after the
    /// temporary directory is created, the directory is kept with the remaining runs for manual recovery.
    ///
    /// # Arguments
    /// * `input` - File to be sorted
    /// * `output` - Result file
    pub fn sort(&self, input: &Path, output: &Path) -> Result<SortStats, SortError> {
        self.enter(Phase::Init);
        let length = file_length(input).map_err(SortError::IO)?;
        if length == 0 {
            return Err(SortError::EmptyInput(input.to_path_buf()));
        }
        if length % T::WIDTH as u64 != 0 {
            return Err(SortError::MisalignedInput {
                length,
                record_width: T::WIDTH,
            });
        }
        let run_dir = self.init_run_dir(output)?;

        match self.run_phases(input, output, length, &run_dir) {
            Ok(stats) => Ok(stats),
            Err(err) => {
                let kept = run_dir.keep();
                log::warn!("sort failed, remaining runs kept in {}", kept.display());
                Err(err)
            }
        }
    }

    fn run_phases(&self, input: &Path, output: &Path, length: u64, run_dir: &RunDir) -> Result<SortStats, SortError> {
        self.enter(Phase::Segmenting);
        let segments = Segmenter::segment_count(length, self.segment_size);
        log::debug!("{} bytes split into {} segments of up to {} bytes", length, segments, self.segment_size);

        self.enter(Phase::LocalSorting);
        let registry = RunRegistry::new();
        let worker = SegmentSortWorker::<T, S>::new(input, run_dir, &registry, &self.sorter, self.rw_buf_size);
        let worker = &worker;
        let tasks = Segmenter::new(length, self.segment_size)
            .enumerate()
            .map(move |(sequence_id, segment)| {
                move || worker.run(segment, sequence_id as u64).map_err(SortError::IO)
            });
        let runs = self.pool.run_batches(tasks)?;

        self.enter(Phase::Merging);
        let reduction = MergeReducer::<T>::new(&self.pool, run_dir, runs.len() as u64, self.rw_buf_size)
            .reduce(&registry)?;

        self.enter(Phase::Finalizing);
        let candidate = run_dir.run_path(reduction.run);
        promote(&candidate, output).map_err(|source| SortError::Rename {
            from: candidate.clone(),
            to: output.to_path_buf(),
            source,
        })?;

        self.enter(Phase::Done);

        return Ok(SortStats {
            records: length / T::WIDTH as u64,
            segments: runs.len(),
            merge_rounds: reduction.rounds,
        });
    }
}

impl<T, S> Debug for ExternalSorter<T, S>
where
    T: Record,
    S: SegmentSorter<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalSorter")
            .field("segment_size", &self.segment_size)
            .field("max_workers", &self.pool.max_workers())
            .field("tmp_dir", &self.tmp_dir)
            .field("rw_buf_size", &self.rw_buf_size)
            .finish()
    }
}
