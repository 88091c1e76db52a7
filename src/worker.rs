//! Segment sorting.
//!
//! A [`SegmentSortWorker`] turns one input segment into one sorted run using a [`SegmentSorter`] strategy:
//!
//! * [`ComparisonSorter`] loads the whole segment into memory and sorts it. Works for any value distribution.
//! * [`CountingSorter`] aggregates `value -> count` pairs and emits each value as many times as it was seen.
//!   Memory consumption depends on the number of distinct values rather than on the segment size, which makes it
//!   preferable when the value domain is small and known in advance.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::marker::PhantomData;
use std::path::Path;

use crate::record::{read_records, Record};
use crate::registry::RunRegistry;
use crate::run::{write_run, RunDir, RunId, RunWriter};
use crate::segment::Segment;

/// Segment sort strategy.
pub trait SegmentSorter<T: Record>: Default + Send + Sync {
    /// Reads the segment from `reader`, sorts its records in ascending order and writes them to `output`.
    /// Returns the number of records written.
    fn sort_segment(
        &self,
        reader: &mut dyn Read,
        records: usize,
        output: &Path,
        buf_size: Option<usize>,
    ) -> io::Result<u64>;
}

/// In-memory comparison sort.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonSorter;

impl<T: Record> SegmentSorter<T> for ComparisonSorter {
    fn sort_segment(
        &self,
        reader: &mut dyn Read,
        records: usize,
        output: &Path,
        buf_size: Option<usize>,
    ) -> io::Result<u64> {
        let mut items: Vec<T> = read_records(reader, records)?;
        items.sort_unstable();

        write_run(output, items, buf_size)
    }
}

/// Frequency-count aggregation sort for small value domains.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountingSorter;

impl<T: Record> SegmentSorter<T> for CountingSorter {
    fn sort_segment(
        &self,
        reader: &mut dyn Read,
        records: usize,
        output: &Path,
        buf_size: Option<usize>,
    ) -> io::Result<u64> {
        let mut counts: BTreeMap<T, u64> = BTreeMap::new();
        let mut buf = vec![0u8; T::WIDTH];

        for _ in 0..records {
            reader.read_exact(&mut buf)?;
            *counts.entry(T::decode(&buf)).or_insert(0) += 1;
        }
        log::trace!("segment of {} records has {} distinct values", records, counts.len());

        let mut writer = RunWriter::create(output, buf_size)?;
        for (value, count) in counts {
            for _ in 0..count {
                writer.push(value)?;
            }
        }

        return writer.finish();
    }
}

/// Sorts input segments into runs and registers them.
pub struct SegmentSortWorker<'a, T, S> {
    input: &'a Path,
    runs: &'a RunDir,
    registry: &'a RunRegistry,
    sorter: &'a S,
    rw_buf_size: Option<usize>,

    item_type: PhantomData<T>,
}

impl<'a, T, S> SegmentSortWorker<'a, T, S>
where
    T: Record,
    S: SegmentSorter<T>,
{
    pub fn new(
        input: &'a Path,
        runs: &'a RunDir,
        registry: &'a RunRegistry,
        sorter: &'a S,
        rw_buf_size: Option<usize>,
    ) -> Self {
        SegmentSortWorker {
            input,
            runs,
            registry,
            sorter,
            rw_buf_size,
            item_type: PhantomData,
        }
    }

    /// Sorts a single segment into a new run named after `sequence_id` and appends it to the registry.
    pub fn run(&self, segment: Segment, sequence_id: u64) -> io::Result<RunId> {
        if segment.length % T::WIDTH as u64 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "segment {}..{} is not a multiple of the record width {}",
                    segment.start,
                    segment.end(),
                    T::WIDTH
                ),
            ));
        }

        let run_id = RunId(sequence_id);
        log::debug!("sorting segment {}..{} into {}", segment.start, segment.end(), run_id);

        let mut file = fs::File::open(self.input)?;
        file.seek(io::SeekFrom::Start(segment.start))?;
        let mut reader = match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        }
        .take(segment.length);

        let records = segment.records(T::WIDTH) as usize;
        let written = self
            .sorter
            .sort_segment(&mut reader, records, &self.runs.run_path(run_id), self.rw_buf_size)?;
        debug_assert_eq!(written, records as u64);

        self.registry.push(run_id);

        return Ok(run_id);
    }
}
