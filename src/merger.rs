//! Two-way run merger.

use std::fs;
use std::io;
use std::marker::PhantomData;

use crate::record::Record;
use crate::run::{RunDir, RunId, RunReader, RunWriter};

/// Pairwise merger implementation.
/// Merges two sorted inputs into a single sorted output in one forward pass, holding only the current head
/// of each input in memory. On equal heads the item of the first input is emitted first.
pub struct PairMerger<T, E, A, B>
where
    T: Ord,
    A: Iterator<Item = Result<T, E>>,
    B: Iterator<Item = Result<T, E>>,
{
    first: A,
    second: B,
    first_head: Option<T>,
    second_head: Option<T>,
    initiated: bool,

    error_type: PhantomData<E>,
}

impl<T, E, A, B> PairMerger<T, E, A, B>
where
    T: Ord,
    A: Iterator<Item = Result<T, E>>,
    B: Iterator<Item = Result<T, E>>,
{
    /// Creates a merger of two inputs.
    /// Both inputs should be sorted in ascending order otherwise the result is undefined.
    pub fn new<IA, IB>(first: IA, second: IB) -> Self
    where
        IA: IntoIterator<IntoIter = A>,
        IB: IntoIterator<IntoIter = B>,
    {
        PairMerger {
            first: first.into_iter(),
            second: second.into_iter(),
            first_head: None,
            second_head: None,
            initiated: false,
            error_type: PhantomData,
        }
    }
}

fn advance<T, E>(source: &mut impl Iterator<Item = Result<T, E>>, head: &mut Option<T>) -> Result<(), E> {
    *head = source.next().transpose()?;
    return Ok(());
}

impl<T, E, A, B> Iterator for PairMerger<T, E, A, B>
where
    T: Ord,
    A: Iterator<Item = Result<T, E>>,
    B: Iterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    /// Returns the next item from the inputs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        if !self.initiated {
            self.initiated = true;
            if let Err(err) = advance(&mut self.first, &mut self.first_head) {
                return Some(Err(err));
            }
            if let Err(err) = advance(&mut self.second, &mut self.second_head) {
                return Some(Err(err));
            }
        }

        let take_first = match (&self.first_head, &self.second_head) {
            (Some(first), Some(second)) => first <= second,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        let (item, advanced) = if take_first {
            (self.first_head.take(), advance(&mut self.first, &mut self.first_head))
        } else {
            (self.second_head.take(), advance(&mut self.second, &mut self.second_head))
        };

        match advanced {
            Ok(()) => item.map(Ok),
            Err(err) => Some(Err(err)),
        }
    }
}

/// Merges runs `first` and `second` into a new run `output` and deletes both sources.
/// Returns the number of records in the merged run.
///
/// The sources are deleted only after the merged run has been completely written and flushed;
/// on any failure they are left in place.
pub fn merge_runs<T: Record>(
    runs: &RunDir,
    output: RunId,
    first: RunId,
    second: RunId,
    buf_size: Option<usize>,
) -> io::Result<u64> {
    let first_path = runs.run_path(first);
    let second_path = runs.run_path(second);

    let first_reader = RunReader::<T>::open(&first_path, buf_size)?;
    let second_reader = RunReader::<T>::open(&second_path, buf_size)?;
    let mut writer = RunWriter::<T>::create(&runs.run_path(output), buf_size)?;

    for item in PairMerger::new(first_reader, second_reader) {
        writer.push(item?)?;
    }
    let records = writer.finish()?;

    fs::remove_file(&first_path)?;
    fs::remove_file(&second_path)?;
    log::debug!("merged {} and {} into {} ({} records)", first, second, output, records);

    return Ok(records);
}
