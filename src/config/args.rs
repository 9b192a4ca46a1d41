//! Command-line encoding of class path and source path lists.
//!
//! Paths are relativized against the session's working directory, joined
//! with the platform path separator and whitespace-escaped so that the
//! debugger receives them as a single argument. A class path that would
//! exceed [`DEFAULT_ARGUMENT_FILE_THRESHOLD`] is spilled into an argument
//! file and passed as `@<file>`.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Inline class paths longer than this are written to an argument file.
///
/// Well under the 32K character command-line limit on Windows.
pub const DEFAULT_ARGUMENT_FILE_THRESHOLD: usize = 8 * 1024;

/// Name prefix of generated argument files.
pub const ARGUMENT_FILE_PREFIX: &str = "argfile-jdb";

/// Platform path-list separator.
#[cfg(windows)]
pub const PATH_SEPARATOR: char = ';';
/// Platform path-list separator.
#[cfg(not(windows))]
pub const PATH_SEPARATOR: char = ':';

/// Encoded form of a path list as passed to the debugger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum EncodedArguments {
    /// Separator-joined, whitespace-escaped paths.
    Inline(String),
    /// Paths stored one per line in a file, referenced as `@<file>`.
    ArgumentFile(PathBuf),
}

impl EncodedArguments {
    /// Render the command-line argument.
    pub fn to_arg(&self) -> String {
        match self {
            Self::Inline(value) => value.clone(),
            Self::ArgumentFile(path) => format!("@{}", path.display()),
        }
    }

    /// Whether the paths were spilled into an argument file.
    pub fn is_argument_file(&self) -> bool {
        matches!(self, Self::ArgumentFile(_))
    }
}

impl fmt::Display for EncodedArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_arg())
    }
}

/// Builds the command-line form of path lists for one working directory.
#[derive(Debug, Clone)]
pub struct ArgumentEncoder {
    working_directory: Option<PathBuf>,
    threshold: usize,
    argument_file_dir: PathBuf,
}

impl ArgumentEncoder {
    /// Create an encoder relativizing against `working_directory`.
    pub fn new(working_directory: Option<PathBuf>) -> Self {
        Self {
            working_directory,
            threshold: DEFAULT_ARGUMENT_FILE_THRESHOLD,
            argument_file_dir: std::env::temp_dir(),
        }
    }

    /// Set the inline length above which an argument file is used.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the directory argument files are created in.
    pub fn with_argument_file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.argument_file_dir = dir.into();
        self
    }

    /// Relativize every absolute path against the working directory.
    ///
    /// Relative paths, and absolute paths when no working directory is set,
    /// are returned unchanged.
    pub fn relativize_paths(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        paths
            .iter()
            .map(|path| match &self.working_directory {
                Some(base) if path.is_absolute() => relativize(base, path),
                _ => path.clone(),
            })
            .collect()
    }

    /// Encode paths inline: relativize, join, escape whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a path is not valid UTF-8.
    pub fn encode_inline(&self, paths: &[PathBuf]) -> Result<String> {
        let mut parts = Vec::with_capacity(paths.len());
        for path in self.relativize_paths(paths) {
            let part = path.to_str().ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "path cannot be represented as a string: {}",
                    path.display()
                ))
            })?;
            parts.push(part.to_string());
        }
        Ok(escape_whitespace(&parts.join(&PATH_SEPARATOR.to_string())))
    }

    /// Encode the class path, spilling into an argument file when the
    /// inline form is longer than the threshold.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a path is not valid UTF-8.
    /// Argument file failures are never returned; the inline form is used.
    pub fn encode_class_path(&self, paths: &[PathBuf]) -> Result<EncodedArguments> {
        let inline = self.encode_inline(paths)?;
        if inline.len() <= self.threshold {
            return Ok(EncodedArguments::Inline(inline));
        }

        match self.try_argument_file(paths) {
            Some(file) => Ok(EncodedArguments::ArgumentFile(file)),
            None => Ok(EncodedArguments::Inline(inline)),
        }
    }

    /// Encode the source path. Always inline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a path is not valid UTF-8.
    pub fn encode_source_path(&self, paths: &[PathBuf]) -> Result<String> {
        self.encode_inline(paths)
    }

    fn try_argument_file(&self, paths: &[PathBuf]) -> Option<PathBuf> {
        match write_argument_file(&self.argument_file_dir, ARGUMENT_FILE_PREFIX, paths) {
            Ok(file) => {
                tracing::debug!(file = %file.display(), count = paths.len(), "wrote argument file");
                Some(file)
            }
            Err(e) => {
                tracing::debug!(error = %e, "argument file unavailable, passing paths inline");
                None
            }
        }
    }
}

/// Create a uniquely named file in `dir` holding one path per line.
///
/// The file is kept on disk; the debugger reads it after this returns.
pub fn write_argument_file(dir: &Path, prefix: &str, paths: &[PathBuf]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".txt")
        .tempfile_in(dir)?;

    for path in paths {
        writeln!(file, "{}", path.display())?;
    }
    file.flush()?;

    let (_, path) = file.keep()?;
    Ok(path)
}

/// Replace every whitespace character with `%20`.
pub fn escape_whitespace(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_whitespace() {
            escaped.push_str("%20");
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Compute `path` relative to `base`. Both are expected to be absolute.
///
/// Returns `.` when the two are equal. Returns `path` unchanged when no
/// relative form exists (different drives on Windows) or when `base`
/// contains `..`, which cannot be resolved without touching the
/// filesystem.
pub fn relativize(base: &Path, path: &Path) -> PathBuf {
    if base.components().any(|c| c == Component::ParentDir) {
        return path.to_path_buf();
    }

    match pathdiff::diff_paths(path, base) {
        Some(relative) if relative.as_os_str().is_empty() => PathBuf::from("."),
        Some(relative) => relative,
        None => path.to_path_buf(),
    }
}
