/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Locating and opening `libhiredis_vip` at runtime.
//!
//! The search is an ordered list of [`SearchStrategy`]s, each contributing
//! candidate directories. Candidates are tried in order and the first one
//! that opens and exports every required symbol wins. The default order is:
//!
//! 1. next to the running executable (`bundled`),
//! 2. `HIREDIS_VIP_LIB_PATH` (`env-override`),
//! 3. `PATH` (`executable-path`),
//! 4. `LD_LIBRARY_PATH` / `DYLD_LIBRARY_PATH` (`runtime-library-path`),
//! 5. `/usr/local/lib` and `/opt/local/lib` (`local`),
//! 6. `$(brew --prefix)/lib` (`package-manager`),
//! 7. `/usr/lib64` and `/usr/lib` (`system`),
//!
//! followed by the platform loader's own search for the bare file name.

use std::{
    env,
    ffi::{OsStr, OsString},
    fmt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use libloading::Library;
use tracing::{debug, trace, warn};

use crate::bindings::{HiredisVip, MissingSymbol};

/// Environment variable naming extra directories to search, ahead of the
/// system ones. Uses the platform's path-list syntax.
pub const LIB_PATH_ENV: &str = "HIREDIS_VIP_LIB_PATH";

/// Environment variable that confuses `brew` when set by some Ruby
/// version managers. Removed from the package manager's environment.
const PACKAGE_MANAGER_HOSTILE_ENV: &str = "RUBYOPT";

#[cfg(target_os = "macos")]
const RUNTIME_LIBRARY_PATH_ENV: Option<&str> = Some("DYLD_LIBRARY_PATH");
#[cfg(all(unix, not(target_os = "macos")))]
const RUNTIME_LIBRARY_PATH_ENV: Option<&str> = Some("LD_LIBRARY_PATH");
#[cfg(not(unix))]
const RUNTIME_LIBRARY_PATH_ENV: Option<&str> = None;

/// `libhiredis_vip.so`, `libhiredis_vip.dylib` or `libhiredis_vip.dll`.
pub fn library_file_name() -> OsString {
    format!("libhiredis_vip{}", env::consts::DLL_SUFFIX).into()
}

/// A source of directories that may contain the native library.
pub trait SearchStrategy: fmt::Debug {
    /// A short label used in diagnostics.
    fn name(&self) -> &str;

    /// Directories to look into, most preferred first.
    ///
    /// Strategies never fail: a source that can't be consulted simply
    /// contributes nothing.
    fn directories(&self) -> Vec<PathBuf>;
}

/// The directory of the running executable and its `../lib` sibling.
#[derive(Debug, Default)]
pub struct Bundled;

impl SearchStrategy for Bundled {
    fn name(&self) -> &str {
        "bundled"
    }

    fn directories(&self) -> Vec<PathBuf> {
        let Some(exe_dir) = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        else {
            return Vec::new();
        };
        let lib_dir = exe_dir.join("..").join("lib");
        vec![exe_dir, lib_dir]
    }
}

/// Every entry of a path-list environment variable.
#[derive(Debug)]
pub struct EnvPathList {
    name: &'static str,
    var: &'static str,
}

impl EnvPathList {
    pub const fn new(name: &'static str, var: &'static str) -> Self {
        Self { name, var }
    }
}

impl SearchStrategy for EnvPathList {
    fn name(&self) -> &str {
        self.name
    }

    fn directories(&self) -> Vec<PathBuf> {
        env::var_os(self.var)
            .map(|value| {
                env::split_paths(&value)
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A fixed list of directories.
#[derive(Debug)]
pub struct Directories {
    name: &'static str,
    dirs: Vec<PathBuf>,
}

impl Directories {
    pub fn new(name: &'static str, dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            name,
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// `/usr/local/lib` and `/opt/local/lib`.
    pub fn local() -> Self {
        Self::new("local", ["/usr/local/lib", "/opt/local/lib"])
    }

    /// `/usr/lib64` and `/usr/lib`, searched after the package manager's
    /// prefix so that a distribution copy doesn't shadow it.
    pub fn system() -> Self {
        Self::new("system", ["/usr/lib64", "/usr/lib"])
    }
}

impl SearchStrategy for Directories {
    fn name(&self) -> &str {
        self.name
    }

    fn directories(&self) -> Vec<PathBuf> {
        self.dirs.clone()
    }
}

/// `<prefix>/lib`, where `<prefix>` is printed by a package manager command
/// such as `brew --prefix`.
///
/// - The command runs; it succeeds: `<stdout>/lib`.
/// - The command runs; it fails: the `fallback` directory, if any.
/// - The command can't be spawned: nothing.
#[derive(Debug)]
pub struct PackageManagerPrefix {
    program: OsString,
    args: Vec<OsString>,
    fallback: Option<PathBuf>,
}

impl PackageManagerPrefix {
    pub fn new(
        program: impl Into<OsString>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            fallback: None,
        }
    }

    /// `brew --prefix`, falling back to `/usr/local/homebrew/lib`.
    pub fn homebrew() -> Self {
        Self::new("brew", ["--prefix"]).with_fallback("/usr/local/homebrew/lib")
    }

    pub fn with_fallback(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback = Some(dir.into());
        self
    }
}

impl SearchStrategy for PackageManagerPrefix {
    fn name(&self) -> &str {
        "package-manager"
    }

    fn directories(&self) -> Vec<PathBuf> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .env_remove(PACKAGE_MANAGER_HOSTILE_ENV)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let prefix = stdout.trim_end();
                if prefix.is_empty() {
                    Vec::new()
                } else {
                    vec![Path::new(prefix).join("lib")]
                }
            }
            Ok(output) => {
                debug!(
                    program = ?self.program,
                    status = %output.status,
                    "package manager prefix query failed"
                );
                self.fallback.iter().cloned().collect()
            }
            Err(error) => {
                debug!(program = ?self.program, %error, "package manager not available");
                Vec::new()
            }
        }
    }
}

/// Why a candidate that exists on disk couldn't be used.
#[derive(Debug, thiserror::Error)]
pub enum LoadFailure {
    #[error("failed to open: {0}")]
    Open(#[source] libloading::Error),
    #[error(transparent)]
    MissingSymbol(#[from] MissingSymbol),
}

/// A candidate that was found but rejected.
#[derive(Debug)]
pub struct LoadAttempt {
    pub path: PathBuf,
    pub cause: LoadFailure,
}

/// Fatal errors raised while locating the native library.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// No candidate exists on disk, and the platform loader couldn't find
    /// the library either.
    #[error(
        "the {} library could not be found; set {} if a custom load path is desired. Searched: {}",
        .file_name.display(),
        LIB_PATH_ENV,
        DisplayPaths(.searched)
    )]
    NotFound {
        file_name: OsString,
        searched: Vec<PathBuf>,
    },
    /// At least one candidate exists but couldn't be loaded.
    #[error(
        "the hiredis-vip library exists but cannot be loaded; check that it is built for this {pointer_width}-bit target and that its runtime dependencies are installed. {}",
        DisplayAttempts(.attempts)
    )]
    Unloadable {
        attempts: Vec<LoadAttempt>,
        pointer_width: u32,
    },
}

struct DisplayPaths<'a>(&'a [PathBuf]);

impl fmt::Display for DisplayPaths<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|path| path.display()))
            .finish()
    }
}

struct DisplayAttempts<'a>(&'a [LoadAttempt]);

impl fmt::Display for DisplayAttempts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attempt) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", attempt.path.display(), attempt.cause)?;
        }
        Ok(())
    }
}

/// Opens the native library following an ordered list of strategies.
#[derive(Debug)]
pub struct LibraryLoader {
    file_name: OsString,
    strategies: Vec<Box<dyn SearchStrategy>>,
    system_fallback: bool,
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::with_package_manager(PackageManagerPrefix::homebrew())
    }
}

impl LibraryLoader {
    /// The default search order, querying `package_manager` for its prefix
    /// instead of `brew`.
    pub fn with_package_manager(package_manager: PackageManagerPrefix) -> Self {
        let mut loader = Self::new()
            .with_strategy(Bundled)
            .with_strategy(EnvPathList::new("env-override", LIB_PATH_ENV))
            .with_strategy(EnvPathList::new("executable-path", "PATH"));
        if let Some(var) = RUNTIME_LIBRARY_PATH_ENV {
            loader = loader.with_strategy(EnvPathList::new("runtime-library-path", var));
        }
        loader
            .with_strategy(Directories::local())
            .with_strategy(package_manager)
            .with_strategy(Directories::system())
            .system_fallback(true)
    }

    /// A loader without any strategy that never falls back to the
    /// platform loader's own search.
    pub fn new() -> Self {
        Self {
            file_name: library_file_name(),
            strategies: Vec::new(),
            system_fallback: false,
        }
    }

    /// Append a strategy. Strategies are consulted in insertion order.
    pub fn with_strategy(mut self, strategy: impl SearchStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Look for `file_name` instead of [`library_file_name`].
    pub fn file_name(mut self, file_name: impl Into<OsString>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Whether to hand the bare file name to the platform loader once
    /// every candidate has been exhausted.
    pub fn system_fallback(mut self, enabled: bool) -> Self {
        self.system_fallback = enabled;
        self
    }

    /// Every candidate file path, in search order, without duplicates.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        for strategy in &self.strategies {
            for dir in strategy.directories() {
                let candidate = dir.join(&self.file_name);
                trace!(strategy = strategy.name(), candidate = %candidate.display());
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }
        candidates
    }

    /// Locate and open the native library and resolve its entry points.
    pub fn load(&self) -> Result<HiredisVip, LoadError> {
        let candidates = self.candidates();
        let mut attempts = Vec::new();

        for path in &candidates {
            if !path.is_file() {
                continue;
            }
            debug!(path = %path.display(), "opening hiredis-vip");
            match open(path.as_os_str()) {
                Ok(library) => match HiredisVip::from_library(library, path.clone()) {
                    Ok(api) => return Ok(api),
                    Err(missing) => attempts.push(LoadAttempt {
                        path: path.clone(),
                        cause: missing.into(),
                    }),
                },
                Err(error) => attempts.push(LoadAttempt {
                    path: path.clone(),
                    cause: LoadFailure::Open(error),
                }),
            }
        }

        if self.system_fallback {
            let path = PathBuf::from(&self.file_name);
            match open(&self.file_name) {
                Ok(library) => match HiredisVip::from_library(library, path.clone()) {
                    Ok(api) => return Ok(api),
                    Err(missing) => attempts.push(LoadAttempt {
                        path,
                        cause: missing.into(),
                    }),
                },
                // The platform loader doesn't tell "missing" apart from
                // "broken", so this isn't recorded as an attempt.
                Err(error) => debug!(%error, "platform loader search failed"),
            }
        }

        let error = if attempts.is_empty() {
            LoadError::NotFound {
                file_name: self.file_name.clone(),
                searched: candidates,
            }
        } else {
            LoadError::Unloadable {
                attempts,
                pointer_width: usize::BITS,
            }
        };
        warn!("{error}");
        Err(error)
    }
}

#[cfg(unix)]
fn open(path: &OsStr) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};

    // Safety: loading hiredis-vip runs no initialisers with observable
    // side effects on the rest of the process.
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }.map(Into::into)
}

#[cfg(not(unix))]
fn open(path: &OsStr) -> Result<Library, libloading::Error> {
    // Safety: see the unix variant.
    unsafe { Library::new(path) }
}
