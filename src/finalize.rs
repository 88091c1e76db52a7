//! Output finalization.

use std::fs;
use std::io;
use std::path::Path;

/// Promotes the last remaining run to the output path.
///
/// Any file already present at `output` is removed first. The candidate is then renamed; no copy fallback
/// is attempted, so the candidate and the output must reside on the same file system.
pub fn promote(candidate: &Path, output: &Path) -> io::Result<()> {
    match fs::remove_file(output) {
        Ok(()) => log::debug!("removed existing output {}", output.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    fs::rename(candidate, output)
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::promote;

    #[test]
    fn test_promote() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("candidate");
        let output = dir.path().join("output");
        fs::write(&candidate, [1, 2, 3, 4]).unwrap();

        promote(&candidate, &output).unwrap();

        assert!(!candidate.exists());
        assert_eq!(fs::read(&output).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_promote_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("candidate");
        let output = dir.path().join("output");
        fs::write(&candidate, [1, 2]).unwrap();
        fs::write(&output, [9, 9, 9, 9, 9, 9]).unwrap();

        promote(&candidate, &output).unwrap();

        assert_eq!(fs::read(&output).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_promote_missing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output");

        assert!(promote(&dir.path().join("missing"), &output).is_err());
        assert!(!output.exists());
    }
}
