//! Session configuration and builder.
//!
//! # Example
//!
//! ```ignore
//! use libjdb::SessionConfig;
//!
//! let mut session = SessionConfig::builder()
//!     .working_directory("/work/target/test-classes")
//!     .class_path(["/work/target/test-classes"])
//!     .source_path(["../../src/test/java"])
//!     .class_signature("pkg.Calc")
//!     .build()?;
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::args::{ArgumentEncoder, EncodedArguments, DEFAULT_ARGUMENT_FILE_THRESHOLD};
use crate::process::{CommandSpec, Spawner, TokioSpawner, DEFAULT_PROGRAM};
use crate::session::ProcessSession;
use crate::{Error, Result};

/// Configuration for a debugger session.
///
/// Use [`SessionConfig::builder()`] to create a new configuration. The
/// struct is serializable so host programs can keep it in their own
/// settings files; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    // Debugger invocation
    pub(crate) program: String,
    pub(crate) working_directory: Option<PathBuf>,

    // Paths
    pub(crate) class_path: Vec<PathBuf>,
    pub(crate) source_path: Vec<PathBuf>,
    pub(crate) argument_file: Option<PathBuf>,
    pub(crate) argument_file_threshold: usize,
    pub(crate) argument_file_dir: Option<PathBuf>,

    // Entry point
    pub(crate) class_signature: String,
    pub(crate) class_args: String,

    // Process environment
    pub(crate) env_vars: HashMap<String, String>,
    pub(crate) inherit_env: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            working_directory: None,
            class_path: Vec::new(),
            source_path: Vec::new(),
            argument_file: None,
            argument_file_threshold: DEFAULT_ARGUMENT_FILE_THRESHOLD,
            argument_file_dir: None,
            class_signature: String::new(),
            class_args: String::new(),
            env_vars: HashMap::new(),
            inherit_env: true,
        }
    }
}

impl SessionConfig {
    /// Create a new builder for SessionConfig.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Get the debugger program.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the working directory if set.
    pub fn working_directory(&self) -> Option<&PathBuf> {
        self.working_directory.as_ref()
    }

    /// Get the class path.
    pub fn class_path(&self) -> &[PathBuf] {
        &self.class_path
    }

    /// Get the source path.
    pub fn source_path(&self) -> &[PathBuf] {
        &self.source_path
    }

    /// Get the entry-point class signature.
    pub fn class_signature(&self) -> &str {
        &self.class_signature
    }

    /// Get the entry-point arguments.
    pub fn class_args(&self) -> &str {
        &self.class_args
    }

    fn encoder(&self) -> ArgumentEncoder {
        let encoder = ArgumentEncoder::new(self.working_directory.clone())
            .with_threshold(self.argument_file_threshold);
        match &self.argument_file_dir {
            Some(dir) => encoder.with_argument_file_dir(dir),
            None => encoder,
        }
    }

    /// Encode the class path, honouring a pre-supplied argument file.
    pub(crate) fn encode_class_path(&self) -> Result<EncodedArguments> {
        match &self.argument_file {
            Some(file) => Ok(EncodedArguments::ArgumentFile(file.clone())),
            None => self.encoder().encode_class_path(&self.class_path),
        }
    }

    /// Build the full debugger command line.
    ///
    /// The argument order is fixed: `-sourcepath <sp> -classpath <cp>
    /// <signature> <args>`. Empty entry-point fields are passed as empty
    /// arguments.
    pub(crate) fn command_spec(&self) -> Result<CommandSpec> {
        let source_path = self.encoder().encode_source_path(&self.source_path)?;
        let class_path = self.encode_class_path()?;

        let mut spec = CommandSpec::new(&self.program)
            .arg("-sourcepath")
            .arg(source_path)
            .arg("-classpath")
            .arg(class_path.to_arg())
            .arg(&self.class_signature)
            .arg(&self.class_args)
            .inherit_env(self.inherit_env);

        if let Some(ref dir) = self.working_directory {
            spec = spec.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            spec = spec.env(key, value);
        }

        Ok(spec)
    }
}

/// Builder for [`SessionConfig`] and [`ProcessSession`].
///
/// Class path and source path default to empty lists; entry-point fields
/// default to empty strings.
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    program: Option<String>,
    working_directory: Option<PathBuf>,
    class_path: Option<Vec<PathBuf>>,
    source_path: Option<Vec<PathBuf>>,
    argument_file: Option<PathBuf>,
    argument_file_threshold: Option<usize>,
    argument_file_dir: Option<PathBuf>,
    class_signature: Option<String>,
    class_args: Option<String>,
    env_vars: HashMap<String, String>,
    inherit_env: Option<bool>,
}

impl SessionBuilder {
    /// Start from an existing configuration.
    pub fn from_config(config: SessionConfig) -> Self {
        Self {
            program: Some(config.program),
            working_directory: config.working_directory,
            class_path: Some(config.class_path),
            source_path: Some(config.source_path),
            argument_file: config.argument_file,
            argument_file_threshold: Some(config.argument_file_threshold),
            argument_file_dir: config.argument_file_dir,
            class_signature: Some(config.class_signature),
            class_args: Some(config.class_args),
            env_vars: config.env_vars,
            inherit_env: Some(config.inherit_env),
        }
    }

    /// Debugger executable (default `jdb`).
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Directory the debugger runs in. Absolute class and source paths
    /// are made relative to it.
    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Class path entries, in order.
    pub fn class_path<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.class_path = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Source path entries, in order.
    pub fn source_path<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.source_path = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Use an existing argument file for the class path instead of
    /// writing one.
    pub fn argument_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.argument_file = Some(file.into());
        self
    }

    /// Inline class path length above which an argument file is written.
    pub fn argument_file_threshold(mut self, threshold: usize) -> Self {
        self.argument_file_threshold = Some(threshold);
        self
    }

    /// Directory generated argument files go to (default: system temp dir).
    pub fn argument_file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.argument_file_dir = Some(dir.into());
        self
    }

    /// Fully qualified class to start debugging.
    pub fn class_signature(mut self, signature: impl Into<String>) -> Self {
        self.class_signature = Some(signature.into());
        self
    }

    /// Arguments passed to the entry point's `main`.
    pub fn class_args(mut self, args: impl Into<String>) -> Self {
        self.class_args = Some(args.into());
        self
    }

    /// Set an environment variable for the debugger process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Whether the debugger inherits this process's environment
    /// (default `true`).
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = Some(inherit);
        self
    }

    /// Resolve defaults into a [`SessionConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the program name is empty.
    pub fn build_config(self) -> Result<SessionConfig> {
        let defaults = SessionConfig::default();
        let program = self.program.unwrap_or(defaults.program);
        if program.trim().is_empty() {
            return Err(Error::InvalidConfig("program cannot be empty".into()));
        }

        Ok(SessionConfig {
            program,
            working_directory: self.working_directory,
            class_path: self.class_path.unwrap_or_default(),
            source_path: self.source_path.unwrap_or_default(),
            argument_file: self.argument_file,
            argument_file_threshold: self
                .argument_file_threshold
                .unwrap_or(defaults.argument_file_threshold),
            argument_file_dir: self.argument_file_dir,
            class_signature: self.class_signature.unwrap_or_default(),
            class_args: self.class_args.unwrap_or_default(),
            env_vars: self.env_vars,
            inherit_env: self.inherit_env.unwrap_or(defaults.inherit_env),
        })
    }

    /// Build an unstarted session backed by real OS processes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the class path or source path
    /// cannot be represented as a string.
    pub fn build(self) -> Result<ProcessSession<TokioSpawner>> {
        self.build_with(TokioSpawner)
    }

    /// Build an unstarted session that spawns through `spawner`.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_with<S: Spawner>(self, spawner: S) -> Result<ProcessSession<S>> {
        let config = self.build_config()?;
        let spec = config.command_spec()?;
        tracing::debug!(program = %spec.program, args = ?spec.args, "built debugger session");
        Ok(ProcessSession::new(spec, spawner))
    }
}
