//! Merge phase.

use std::marker::PhantomData;

use crate::merger::merge_runs;
use crate::pool::WorkerPool;
use crate::record::Record;
use crate::registry::RunRegistry;
use crate::run::{RunDir, RunId};
use crate::sort::SortError;

/// Merge phase outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reduction {
    /// The only run left after the reduction.
    pub run: RunId,
    /// Number of merge rounds performed.
    pub rounds: usize,
}

/// Reduces registered runs to a single one by rounds of concurrent pairwise merges.
///
/// Every round takes up to `min(pending / 2, max_workers)` pairs from the registry front, merges them in one
/// batch and appends the merged runs to the registry tail. With an odd number of pending runs the last one
/// is carried over to the next round untouched.
pub struct MergeReducer<'a, T> {
    pool: &'a WorkerPool,
    runs: &'a RunDir,
    rw_buf_size: Option<usize>,
    next_id: u64,

    item_type: PhantomData<T>,
}

impl<'a, T: Record> MergeReducer<'a, T> {
    /// Creates a reducer. Merged runs are numbered starting from `first_id`.
    pub fn new(pool: &'a WorkerPool, runs: &'a RunDir, first_id: u64, rw_buf_size: Option<usize>) -> Self {
        MergeReducer {
            pool,
            runs,
            rw_buf_size,
            next_id: first_id,
            item_type: PhantomData,
        }
    }

    fn allocate_id(&mut self) -> RunId {
        let id = RunId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Merges the registry down to a single run.
    ///
    /// A failed merge is reported once the whole round is joined. Runs merged successfully within that round
    /// are still registered, sources of the failed merge are left on disk.
    pub fn reduce(&mut self, registry: &RunRegistry) -> Result<Reduction, SortError> {
        let mut rounds = 0;

        loop {
            let pending = registry.len();
            if pending <= 1 {
                break;
            }

            let pairs = std::cmp::min(pending / 2, self.pool.max_workers());
            let mut tasks = Vec::with_capacity(pairs);
            for _ in 0..pairs {
                let (first, second) = registry
                    .pop_pair()
                    .ok_or_else(|| SortError::Unknown("run registry drained unexpectedly".to_string()))?;
                let output = self.allocate_id();
                let runs = self.runs;
                let rw_buf_size = self.rw_buf_size;

                tasks.push(move || {
                    merge_runs::<T>(runs, output, first, second, rw_buf_size)
                        .map(|_| output)
                        .map_err(SortError::IO)
                });
            }

            rounds += 1;
            log::debug!("merge round {}: {} pairs of {} pending runs", rounds, pairs, pending);

            let mut failure = None;
            for result in self.pool.run_batch(tasks) {
                match result {
                    Ok(run_id) => registry.push(run_id),
                    Err(err) if failure.is_none() => failure = Some(err),
                    Err(err) => log::warn!("additional merge failure in round {}: {}", rounds, err),
                }
            }
            if let Some(err) = failure {
                log::warn!("merge round {} failed", rounds);
                return Err(err);
            }
        }

        let run = registry
            .take_last()
            .ok_or_else(|| SortError::Unknown("no runs to reduce".to_string()))?;

        return Ok(Reduction { run, rounds });
    }
}

#[cfg(test)]
mod test {
    use rand::Rng;
    use rstest::*;

    use super::MergeReducer;
    use crate::pool::WorkerPool;
    use crate::registry::RunRegistry;
    use crate::run::{write_run, RunDir, RunId, RunReader};
    use crate::sort::SortError;

    #[fixture]
    fn run_dir() -> RunDir {
        RunDir::new(&std::env::temp_dir()).unwrap()
    }

    fn register_runs(dir: &RunDir, registry: &RunRegistry, runs: &[Vec<u32>]) {
        for (idx, run) in runs.iter().enumerate() {
            write_run(&dir.run_path(RunId(idx as u64)), run.clone(), None).unwrap();
            registry.push(RunId(idx as u64));
        }
    }

    fn read_run(dir: &RunDir, id: RunId) -> Vec<u32> {
        RunReader::open(&dir.run_path(id), None)
            .unwrap()
            .collect::<Result<Vec<u32>, _>>()
            .unwrap()
    }

    fn random_runs(number: usize) -> Vec<Vec<u32>> {
        let mut rng = rand::thread_rng();
        (0..number)
            .map(|_| {
                let mut run: Vec<u32> = (0..rng.gen_range(0..50)).map(|_| rng.gen_range(0..100)).collect();
                run.sort();
                run
            })
            .collect()
    }

    #[rstest]
    #[case(1, 0)]
    #[case(2, 1)]
    #[case(3, 2)]
    #[case(4, 2)]
    #[case(5, 3)]
    #[case(7, 3)]
    #[case(8, 3)]
    #[case(9, 4)]
    #[case(16, 4)]
    fn test_reduction_rounds(run_dir: RunDir, #[case] runs_number: usize, #[case] expected_rounds: usize) {
        let pool = WorkerPool::new(8).unwrap();
        let registry = RunRegistry::new();
        let runs = random_runs(runs_number);
        register_runs(&run_dir, &registry, &runs);

        let reduction = MergeReducer::<u32>::new(&pool, &run_dir, runs_number as u64, None)
            .reduce(&registry)
            .unwrap();

        assert_eq!(reduction.rounds, expected_rounds);
        assert!(registry.is_empty());

        let mut expected: Vec<u32> = runs.into_iter().flatten().collect();
        expected.sort();
        assert_eq!(read_run(&run_dir, reduction.run), expected);

        // merged sources are gone, only the final run remains
        let files = std::fs::read_dir(run_dir.path()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[rstest]
    fn test_odd_run_carried_over(run_dir: RunDir) {
        let pool = WorkerPool::new(4).unwrap();
        let registry = RunRegistry::new();
        register_runs(&run_dir, &registry, &[vec![2, 9], vec![1, 7], vec![0, 3, 8]]);

        let reduction = MergeReducer::<u32>::new(&pool, &run_dir, 3, None)
            .reduce(&registry)
            .unwrap();

        // round one merges runs 0 and 1 into 3, round two merges the carried run 2 with 3 into 4
        assert_eq!(reduction.rounds, 2);
        assert_eq!(reduction.run, RunId(4));
        assert_eq!(read_run(&run_dir, reduction.run), vec![0, 1, 2, 3, 7, 8, 9]);
    }

    #[rstest]
    fn test_bounded_workers(run_dir: RunDir) {
        let pool = WorkerPool::new(2).unwrap();
        let registry = RunRegistry::new();
        let runs = random_runs(11);
        register_runs(&run_dir, &registry, &runs);

        let reduction = MergeReducer::<u32>::new(&pool, &run_dir, 11, Some(16))
            .reduce(&registry)
            .unwrap();

        // ten merges in total, at most two per round: 11 -> 9 -> 7 -> 5 -> 3 -> 2 -> 1
        assert_eq!(reduction.rounds, 6);
        let mut expected: Vec<u32> = runs.into_iter().flatten().collect();
        expected.sort();
        assert_eq!(read_run(&run_dir, reduction.run), expected);
    }

    #[rstest]
    fn test_failed_merge(run_dir: RunDir) {
        let pool = WorkerPool::new(4).unwrap();
        let registry = RunRegistry::new();
        register_runs(&run_dir, &registry, &[vec![1], vec![2], vec![3], vec![4]]);
        std::fs::remove_file(run_dir.run_path(RunId(3))).unwrap();

        let result = MergeReducer::<u32>::new(&pool, &run_dir, 4, None).reduce(&registry);

        assert!(matches!(result, Err(SortError::IO(_))));
        // the sibling merge completed and was registered, the failed pair's surviving source is kept
        assert_eq!(registry.snapshot(), vec![RunId(4)]);
        assert_eq!(read_run(&run_dir, RunId(4)), vec![1, 2]);
        assert!(run_dir.run_path(RunId(2)).exists());
    }
}
