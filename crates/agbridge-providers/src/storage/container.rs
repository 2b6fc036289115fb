use super::{SearchPattern, Storage, StorageEntry, not_found};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Captured result of one command run inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn reports_missing_path(&self) -> bool {
        self.stderr.contains("No such file or directory")
    }
}

/// Batch command execution inside a named container.
pub trait ContainerExec: Send + Sync {
    fn exec(&self, container: &str, argv: &[String], user: Option<&str>)
    -> std::io::Result<ExecOutput>;
}

/// `docker exec` (or a compatible CLI such as `podman`).
#[derive(Debug, Clone)]
pub struct DockerExec {
    binary: String,
}

impl Default for DockerExec {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerExec {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ContainerExec for DockerExec {
    fn exec(
        &self,
        container: &str,
        argv: &[String],
        user: Option<&str>,
    ) -> std::io::Result<ExecOutput> {
        let mut command = Command::new(&self.binary);
        command.arg("exec");
        if let Some(user) = user {
            command.args(["-u", user]);
        }
        command.arg(container).args(argv);

        tracing::debug!(container, ?argv, "container exec");
        let output = command.output()?;
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Storage inside a container, reached through sequential exec round trips.
pub struct ContainerStorage {
    exec: Arc<dyn ContainerExec>,
    container: String,
    user: Option<String>,
}

impl ContainerStorage {
    pub fn new(exec: Arc<dyn ContainerExec>, container: impl Into<String>, user: Option<String>) -> Self {
        Self {
            exec,
            container: container.into(),
            user,
        }
    }

    fn run(&self, argv: Vec<String>) -> Result<ExecOutput> {
        self.exec
            .exec(&self.container, &argv, self.user.as_deref())
            .map_err(|err| Error::Exec(format!("{}: {}", self.container, err)))
    }

    fn run_checked(&self, argv: Vec<String>, path: &Path) -> Result<ExecOutput> {
        let output = self.run(argv)?;
        if output.success() {
            return Ok(output);
        }
        if output.reports_missing_path() {
            return Err(not_found(path));
        }
        Err(Error::Exec(format!(
            "exit code {}: {}",
            output.exit_code,
            output.stderr.trim()
        )))
    }
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Parse `find -printf '%T@'` output (fractional epoch seconds).
fn parse_epoch(value: &str) -> DateTime<Utc> {
    let (secs, frac) = value.split_once('.').unwrap_or((value, "0"));
    let secs = secs.parse::<i64>().unwrap_or(0);
    let nanos = format!("{:0<9}", &frac[..frac.len().min(9)])
        .parse::<u32>()
        .unwrap_or(0);
    DateTime::from_timestamp(secs, nanos).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// One `find` output row: fields are tab separated, the path comes first and
/// may itself contain tabs, so fields are split off from the right.
fn parse_find_row(line: &str, with_type: bool) -> Option<StorageEntry> {
    let fields = if with_type { 4 } else { 3 };
    let mut parts: Vec<&str> = line.rsplitn(fields, '\t').collect();
    if parts.len() != fields {
        return None;
    }
    parts.reverse();
    let path = PathBuf::from(parts[0]);
    let (is_dir, size, mtime) = if with_type {
        (parts[1] == "d", parts[2], parts[3])
    } else {
        (false, parts[1], parts[2])
    };
    Some(StorageEntry {
        path,
        is_dir,
        size: size.parse().unwrap_or(0),
        modified: parse_epoch(mtime),
    })
}

impl Storage for ContainerStorage {
    fn list_dir(&self, dir: &Path) -> Result<Vec<StorageEntry>> {
        let mut argv = strings(&["find"]);
        argv.push(arg(dir));
        argv.extend(strings(&["-mindepth", "1", "-maxdepth", "1", "-printf", "%p\t%y\t%s\t%T@\n"]));
        let output = self.run_checked(argv, dir)?;
        let mut entries: Vec<StorageEntry> = output
            .stdout
            .lines()
            .filter_map(|line| parse_find_row(line, true))
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn walk_files(&self, root: &Path, max_depth: usize) -> Result<Vec<StorageEntry>> {
        let mut argv = strings(&["find"]);
        argv.push(arg(root));
        argv.extend(strings(&["-mindepth", "1", "-maxdepth"]));
        argv.push(max_depth.to_string());
        argv.extend(strings(&["-type", "f", "-printf", "%p\t%s\t%T@\n"]));
        let output = self.run_checked(argv, root)?;
        let mut entries: Vec<StorageEntry> = output
            .stdout
            .lines()
            .filter_map(|line| parse_find_row(line, false))
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let mut argv = strings(&["cat", "--"]);
        argv.push(arg(path));
        Ok(self.run_checked(argv, path)?.stdout)
    }

    fn read_first_line(&self, path: &Path) -> Result<Option<String>> {
        let mut argv = strings(&["head", "-n", "1", "--"]);
        argv.push(arg(path));
        let output = self.run_checked(argv, path)?;
        let line = output.stdout.trim_end_matches(['\n', '\r']);
        if line.is_empty() && output.stdout.is_empty() {
            return Ok(None);
        }
        Ok(Some(line.to_string()))
    }

    fn remove(&self, path: &Path) -> Result<bool> {
        let mut argv = strings(&["sh", "-c", "test -e \"$1\" || exit 3; rm -rf -- \"$1\"", "sh"]);
        argv.push(arg(path));
        let output = self.run(argv)?;
        match output.exit_code {
            0 => Ok(true),
            3 => Ok(false),
            code => Err(Error::Exec(format!(
                "rm exited with {}: {}",
                code,
                output.stderr.trim()
            ))),
        }
    }

    fn grep(&self, root: &Path, pattern: &SearchPattern) -> Result<Vec<(PathBuf, usize)>> {
        let mut argv = strings(&["grep", "-r", "-c"]);
        argv.push(if pattern.is_literal() { "-F" } else { "-E" }.to_string());
        if pattern.is_case_insensitive() {
            argv.push("-i".to_string());
        }
        argv.push("-e".to_string());
        argv.push(pattern.posix_ere());
        argv.push("--".to_string());
        argv.push(arg(root));

        let output = self.run(argv)?;
        // grep: 0 = matches, 1 = no matches, 2 = trouble (possibly partial)
        match output.exit_code {
            0 | 1 => {}
            _ if output.reports_missing_path() && output.stdout.is_empty() => {
                return Err(not_found(root));
            }
            _ if !output.stdout.is_empty() => {
                tracing::warn!(stderr = %output.stderr.trim(), "grep reported errors; using partial results");
            }
            code => {
                return Err(Error::Exec(format!(
                    "grep exited with {}: {}",
                    code,
                    output.stderr.trim()
                )));
            }
        }

        Ok(output
            .stdout
            .lines()
            .filter_map(|line| {
                let (path, count) = line.rsplit_once(':')?;
                let count = count.parse::<usize>().ok()?;
                (count > 0).then(|| (PathBuf::from(path), count))
            })
            .collect())
    }
}
