//! `bin-ext-sort` is an external merge sort for flat binary files of fixed-width unsigned integers.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! Sorting is performed in strictly sequential phases:
//!
//! * **Segmenting:**
//!   the input file is split into contiguous segments of at most `segment_size` bytes.
//! * **Local sorting:**
//!   segments are sorted in memory concurrently, each one persisted as a sorted run file.
//! * **Merging:**
//!   runs are merged pairwise in rounds until a single run is left. A pairwise merge streams both inputs
//!   so the total amount of data is not limited by the available memory.
//! * **Finalizing:**
//!   the last run is renamed to the output path.
//!
//! Both sort and merge tasks are dispatched in batches of at most `max_workers` tasks. A batch is joined before
//! the next one is started which bounds the peak memory consumption to `max_workers * segment_size`
//! and the number of open run files to a small multiple of `max_workers`.
//!
//! Records are stored in native byte order. `u8`, `u16`, `u32` and `u64` records are supported.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use bin_ext_sort::{ExternalSorter, ExternalSorterBuilder};
//!
//! let sorter: ExternalSorter<u32> = ExternalSorterBuilder::new()
//!     .with_segment_size(16 * 1024 * 1024)
//!     .with_max_workers(8)
//!     .build()
//!     .unwrap();
//!
//! let stats = sorter.sort(Path::new("input.bin"), Path::new("output.bin")).unwrap();
//! println!("sorted {} records", stats.records);
//! ```

pub mod finalize;
pub mod merger;
pub mod pool;
pub mod record;
pub mod reducer;
pub mod registry;
pub mod run;
pub mod segment;
pub mod sort;
pub mod worker;

pub use merger::{merge_runs, PairMerger};
pub use pool::WorkerPool;
pub use record::Record;
pub use reducer::{MergeReducer, Reduction};
pub use registry::RunRegistry;
pub use run::{RunDir, RunId, RunReader, RunWriter};
pub use segment::{file_length, Segment, Segmenter};
pub use sort::{ExternalSorter, ExternalSorterBuilder, Phase, SortError, SortStats};
pub use worker::{ComparisonSorter, CountingSorter, SegmentSortWorker, SegmentSorter};
