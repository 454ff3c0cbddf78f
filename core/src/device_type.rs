//! Parsing of the `device_type` file: exactly one `device_type=<value>` line.
use std::{fs, io, path::Path};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed reading device type file at `{}`", .0.display())]
    Io(std::path::PathBuf, #[source] io::Error),
    #[error("device type file at `{}` is empty", .0.display())]
    ParseError(std::path::PathBuf),
    #[error("device type file at `{}` has trailing content after its single line", .0.display())]
    ValueError(std::path::PathBuf),
}

const PREFIX: &str = "device_type=";

/// Reads and parses the device type from `path`. The file must contain
/// exactly one line of the form `device_type=<value>`, with an optional
/// trailing newline, and nothing else.
pub fn read(path: &Path) -> Result<String, Error> {
    let contents =
        fs::read_to_string(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;

    if contents.is_empty() {
        return Err(Error::ParseError(path.to_path_buf()));
    }

    let mut lines = contents.split('\n');
    let first = lines.next().unwrap_or_default();

    let value = first
        .strip_prefix(PREFIX)
        .ok_or_else(|| Error::ParseError(path.to_path_buf()))?;

    // Anything left after the first line must be empty: either nothing (no
    // trailing newline) or a single trailing empty string produced by the
    // split on a lone final `\n`.
    let remainder: Vec<&str> = lines.collect();
    let has_trailing_content = match remainder.as_slice() {
        [] => false,
        [last] if last.is_empty() => false,
        _ => true,
    };
    if has_trailing_content {
        return Err(Error::ValueError(path.to_path_buf()));
    }

    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn valid_with_trailing_newline() {
        let f = write_tmp("device_type=diamond\n");
        assert_eq!(read(f.path()).unwrap(), "diamond");
    }

    #[test]
    fn valid_without_trailing_newline() {
        let f = write_tmp("device_type=diamond");
        assert_eq!(read(f.path()).unwrap(), "diamond");
    }

    #[test]
    fn empty_file_is_parse_error() {
        let f = write_tmp("");
        assert!(matches!(read(f.path()).unwrap_err(), Error::ParseError(_)));
    }

    #[test]
    fn missing_equals_is_parse_error() {
        let f = write_tmp("device_type diamond\n");
        assert!(matches!(read(f.path()).unwrap_err(), Error::ParseError(_)));
    }

    #[test]
    fn trailing_debris_is_value_error() {
        let f = write_tmp("device_type=diamond\nsome debris\n");
        assert!(matches!(read(f.path()).unwrap_err(), Error::ValueError(_)));
    }

    #[test]
    fn trailing_blank_line_then_debris_is_value_error() {
        let f = write_tmp("device_type=diamond\n\nsome debris\n");
        assert!(matches!(read(f.path()).unwrap_err(), Error::ValueError(_)));
    }

    #[test]
    fn missing_file_bubbles_io_error() {
        let err = read(Path::new("/nonexistent/device_type")).unwrap_err();
        match err {
            Error::Io(_, source) => assert_eq!(source.kind(), io::ErrorKind::NotFound),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
