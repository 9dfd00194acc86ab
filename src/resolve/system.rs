//! Resolver backed by the host system.
//!
//! By-name resolution runs a helper program (`modprobe -q <name>` by default)
//! and reports its exit code. Filesystem-type lookup consults the kernel's
//! registered filesystem list.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Serialize;

use super::{ResolveCx, Resolver, Status};

/// Status reported when the helper could not run or was killed by a signal.
pub const HELPER_FAILED: Status = -1;

const DEFAULT_PROGRAM: &str = "modprobe";
const DEFAULT_FILESYSTEMS: &str = "/proc/filesystems";

/// A registered filesystem type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsType {
    /// Filesystem name as listed by the kernel.
    pub name: String,
    /// True if the filesystem does not need a backing block device.
    pub nodev: bool,
}

/// Parses the `/proc/filesystems` format.
///
/// Each line holds an optional `nodev` flag followed by the filesystem name.
pub fn parse_filesystems(contents: &str) -> impl Iterator<Item = FsType> + '_ {
    contents.lines().filter_map(|line| {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some("nodev"), Some(name)) => Some(FsType {
                name: name.to_string(),
                nodev: true,
            }),
            (Some(name), None) => Some(FsType {
                name: name.to_string(),
                nodev: false,
            }),
            _ => None,
        }
    })
}

/// Resolver that shells out for resolution and reads the filesystem list.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    program: PathBuf,
    args: Vec<OsString>,
    filesystems: PathBuf,
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            args: vec![OsString::from("-q")],
            filesystems: PathBuf::from(DEFAULT_FILESYSTEMS),
        }
    }
}

impl SystemResolver {
    /// Creates a resolver using `modprobe -q` and `/proc/filesystems`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the helper program and its leading arguments. The target
    /// name is appended as the final argument.
    #[must_use]
    pub fn with_program<I, A>(mut self, program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.program = program.into();
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Reads the filesystem list from `path` instead of `/proc/filesystems`.
    #[must_use]
    pub fn with_filesystems_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.filesystems = path.into();
        self
    }
}

impl Resolver for SystemResolver {
    type Handle = FsType;

    fn resolve(&self, cx: &ResolveCx<'_>, name: &str) -> Status {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) => status.code().unwrap_or(HELPER_FAILED),
            Err(err) => {
                tracing::debug!(
                    index = cx.index(),
                    program = %self.program.display(),
                    error = %err,
                    "resolution helper failed to run"
                );
                HELPER_FAILED
            }
        }
    }

    fn lookup_fs_type(&self, cx: &ResolveCx<'_>, name: &str) -> Option<FsType> {
        let contents = match fs::read_to_string(&self.filesystems) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::debug!(
                    index = cx.index(),
                    path = %self.filesystems.display(),
                    error = %err,
                    "filesystem list unreadable"
                );
                return None;
            }
        };
        let found = parse_filesystems(&contents).find(|fs| fs.name == name);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::CancelToken;
    use std::io::Write;

    const SAMPLE: &str = "nodev\tsysfs\nnodev\ttmpfs\n\text4\n\tvfat\n\n";

    #[test]
    fn parses_nodev_and_block_filesystems() {
        let parsed: Vec<FsType> = parse_filesystems(SAMPLE).collect();
        assert_eq!(parsed.len(), 4);
        assert_eq!(
            parsed[0],
            FsType {
                name: "sysfs".into(),
                nodev: true
            }
        );
        assert_eq!(
            parsed[2],
            FsType {
                name: "ext4".into(),
                nodev: false
            }
        );
    }

    #[test]
    fn lookup_reads_the_configured_list() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(SAMPLE.as_bytes()).expect("write");

        let resolver = SystemResolver::new().with_filesystems_file(file.path());
        let cancel = CancelToken::new();
        let cx = ResolveCx::new(1, &cancel);

        let found = resolver.lookup_fs_type(&cx, "tmpfs").expect("tmpfs listed");
        assert!(found.nodev);
        assert!(resolver.lookup_fs_type(&cx, "fakefs").is_none());
    }

    #[test]
    fn lookup_of_missing_list_is_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = SystemResolver::new().with_filesystems_file(dir.path().join("missing"));
        let cancel = CancelToken::new();
        assert!(resolver
            .lookup_fs_type(&ResolveCx::new(0, &cancel), "ext4")
            .is_none());
    }

    #[cfg(unix)]
    #[test]
    fn resolve_reports_helper_exit_code() {
        let cancel = CancelToken::new();
        let cx = ResolveCx::new(0, &cancel);

        let ok = SystemResolver::new().with_program("sh", ["-c", "exit 0", "helper"]);
        assert_eq!(ok.resolve(&cx, "dummy"), 0);

        let failing = SystemResolver::new().with_program("sh", ["-c", "exit 3", "helper"]);
        assert_eq!(failing.resolve(&cx, "dummy"), 3);
    }

    #[test]
    fn resolve_with_missing_helper_fails() {
        let cancel = CancelToken::new();
        let resolver =
            SystemResolver::new().with_program("/nonexistent/resolve-helper", Vec::<String>::new());
        assert_eq!(
            resolver.resolve(&ResolveCx::new(0, &cancel), "dummy"),
            HELPER_FAILED
        );
    }
}
