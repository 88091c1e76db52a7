//! Sorted run files.
//!
//! A run is a temporary file holding records in ascending order. Runs are identified by a [`RunId`] and live
//! in a per-sort [`RunDir`], named deterministically from the id.

use std::fmt;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::record::{write_record, Record};

/// Sorted run identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{:08}", self.0)
    }
}

/// Temporary directory holding the runs of a single sort job.
/// The directory and all the runs left in it are removed on drop unless [`RunDir::keep`] is called.
pub struct RunDir {
    dir: tempfile::TempDir,
}

impl RunDir {
    /// Creates a new run directory inside `parent`.
    pub fn new(parent: &Path) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(".bin-ext-sort-").tempdir_in(parent)?;

        return Ok(RunDir { dir });
    }

    /// Run directory location.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the run file with the given id.
    pub fn run_path(&self, id: RunId) -> PathBuf {
        self.dir.path().join(id.to_string())
    }

    /// Persists the directory with the runs left in it and returns its location.
    pub fn keep(self) -> PathBuf {
        self.dir.into_path()
    }
}

/// Sequential run reader. Yields records until the file is exhausted.
pub struct RunReader<T> {
    reader: io::Take<io::BufReader<fs::File>>,
    buf: Vec<u8>,

    item_type: PhantomData<T>,
}

impl<T: Record> RunReader<T> {
    /// Opens a run for sequential reading.
    pub fn open(path: &Path, buf_size: Option<usize>) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        let file_len = file.metadata()?.len();

        let reader = match buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        return Ok(RunReader {
            reader: reader.take(file_len),
            buf: vec![0u8; T::WIDTH],
            item_type: PhantomData,
        });
    }
}

impl<T: Record> Iterator for RunReader<T> {
    type Item = io::Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.limit() == 0 {
            None
        } else {
            match self.reader.read_exact(&mut self.buf) {
                Ok(_) => Some(Ok(T::decode(&self.buf))),
                Err(err) => Some(Err(err)),
            }
        }
    }
}

/// Sequential run writer.
pub struct RunWriter<T> {
    writer: io::BufWriter<fs::File>,
    buf: Vec<u8>,
    records: u64,

    item_type: PhantomData<T>,
}

impl<T: Record> RunWriter<T> {
    /// Creates a new run file. Fails if the file already exists.
    pub fn create(path: &Path, buf_size: Option<usize>) -> io::Result<Self> {
        let file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;

        let writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        return Ok(RunWriter {
            writer,
            buf: vec![0u8; T::WIDTH],
            records: 0,
            item_type: PhantomData,
        });
    }

    /// Appends a record to the run.
    #[inline]
    pub fn push(&mut self, item: T) -> io::Result<()> {
        write_record(&mut self.writer, item, &mut self.buf)?;
        self.records += 1;

        return Ok(());
    }

    /// Appends all the records to the run.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) -> io::Result<()> {
        for item in items {
            self.push(item)?;
        }

        return Ok(());
    }

    /// Flushes buffered data and returns the number of records written.
    pub fn finish(mut self) -> io::Result<u64> {
        self.writer.flush()?;

        return Ok(self.records);
    }
}

/// Dumps already sorted items to a new run file.
pub fn write_run<T: Record>(
    path: &Path,
    items: impl IntoIterator<Item = T>,
    buf_size: Option<usize>,
) -> io::Result<u64> {
    let mut writer = RunWriter::create(path, buf_size)?;
    writer.extend(items)?;

    return writer.finish();
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use rstest::*;

    use super::{write_run, RunDir, RunId, RunReader};

    #[fixture]
    fn run_dir() -> RunDir {
        RunDir::new(&std::env::temp_dir()).unwrap()
    }

    #[rstest]
    fn test_run_names(run_dir: RunDir) {
        assert_eq!(RunId(7).to_string(), "run-00000007");
        assert_eq!(run_dir.run_path(RunId(7)), run_dir.path().join("run-00000007"));
        assert_ne!(run_dir.run_path(RunId(1)), run_dir.run_path(RunId(2)));
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![1])]
    #[case(Vec::from_iter(0..1000))]
    fn test_run_write_read(run_dir: RunDir, #[case] saved: Vec<u32>) {
        let path = run_dir.run_path(RunId(0));

        let written = write_run(&path, saved.clone(), Some(64)).unwrap();
        assert_eq!(written, saved.len() as u64);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4 * saved.len() as u64);

        let restored: Result<Vec<u32>, _> = RunReader::open(&path, None).unwrap().collect();
        assert_eq!(restored.unwrap(), saved);
    }

    #[rstest]
    fn test_run_create_existing(run_dir: RunDir) {
        let path = run_dir.run_path(RunId(0));
        write_run::<u32>(&path, vec![1, 2], None).unwrap();

        assert!(write_run::<u32>(&path, vec![3], None).is_err());
    }

    #[rstest]
    fn test_run_truncated(run_dir: RunDir) {
        let path = run_dir.run_path(RunId(0));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[1, 0, 0, 0, 2, 0]).unwrap();
        drop(file);

        let mut reader = RunReader::<u32>::open(&path, None).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert_eq!(
            reader.next().unwrap().unwrap_err().kind(),
            std::io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_run_dir_removed_on_drop() {
        let run_dir = RunDir::new(&std::env::temp_dir()).unwrap();
        let dir_path = run_dir.path().to_path_buf();
        write_run::<u32>(&run_dir.run_path(RunId(0)), vec![1], None).unwrap();

        drop(run_dir);
        assert!(!dir_path.exists());
    }

    #[test]
    fn test_run_dir_keep() {
        let run_dir = RunDir::new(&std::env::temp_dir()).unwrap();
        let run_path = run_dir.run_path(RunId(3));
        write_run::<u32>(&run_path, vec![1, 2], None).unwrap();

        let kept = run_dir.keep();
        assert!(run_path.starts_with(&kept));
        assert_eq!(std::fs::metadata(&run_path).unwrap().len(), 8);

        std::fs::remove_dir_all(kept).unwrap();
    }
}
