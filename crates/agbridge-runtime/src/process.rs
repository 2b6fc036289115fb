use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

/// What to run for one backend turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// A running backend: its output streams plus a handle to reap or kill it.
pub struct SpawnedProcess {
    pub stdout: ByteStream,
    pub stderr: ByteStream,
    pub control: Box<dyn ProcessControl>,
}

#[async_trait]
pub trait ProcessControl: Send {
    /// Exit code; signal deaths report -1. Must be safe to call again after
    /// being cancelled.
    async fn wait(&mut self) -> io::Result<i32>;

    async fn kill(&mut self) -> io::Result<()>;
}

#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn spawn(&self, invocation: &Invocation) -> io::Result<SpawnedProcess>;
}

/// Spawns on the local host with piped output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

struct ChildControl {
    child: Child,
}

#[async_trait]
impl ProcessControl for ChildControl {
    async fn wait(&mut self) -> io::Result<i32> {
        let status = self.child.wait().await?;
        Ok(status.code().unwrap_or(-1))
    }

    async fn kill(&mut self) -> io::Result<()> {
        if self.child.id().is_none() {
            // already reaped
            return Ok(());
        }
        self.child.kill().await
    }
}

fn missing_pipe(name: &str) -> io::Error {
    io::Error::other(format!("child {} was not piped", name))
}

#[async_trait]
impl ProcessSpawner for TokioSpawner {
    async fn spawn(&self, invocation: &Invocation) -> io::Result<SpawnedProcess> {
        let Some((program, args)) = invocation.argv.split_first() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command line"));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;
        tracing::debug!(program, pid = ?child.id(), "spawned backend");

        Ok(SpawnedProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            control: Box::new(ChildControl { child }),
        })
    }
}

/// Runs the invocation inside a container: `docker exec -i [-u] [-w] [-e] name argv...`.
#[derive(Debug, Clone)]
pub struct ContainerSpawner {
    docker: String,
    container: String,
    user: Option<String>,
}

impl ContainerSpawner {
    pub fn new(container: impl Into<String>, user: Option<String>) -> Self {
        Self {
            docker: "docker".to_string(),
            container: container.into(),
            user,
        }
    }

    pub fn with_docker_binary(mut self, binary: impl Into<String>) -> Self {
        self.docker = binary.into();
        self
    }

    pub fn wrap(&self, invocation: &Invocation) -> Invocation {
        let mut argv = vec![self.docker.clone(), "exec".to_string(), "-i".to_string()];
        if let Some(user) = &self.user {
            argv.push("-u".to_string());
            argv.push(user.clone());
        }
        if let Some(cwd) = &invocation.cwd {
            argv.push("-w".to_string());
            argv.push(cwd.to_string_lossy().into_owned());
        }
        for (key, value) in &invocation.env {
            argv.push("-e".to_string());
            argv.push(format!("{}={}", key, value));
        }
        argv.push(self.container.clone());
        argv.extend(invocation.argv.iter().cloned());

        Invocation {
            argv,
            cwd: None,
            env: Vec::new(),
        }
    }
}

#[async_trait]
impl ProcessSpawner for ContainerSpawner {
    async fn spawn(&self, invocation: &Invocation) -> io::Result<SpawnedProcess> {
        TokioSpawner.spawn(&self.wrap(invocation)).await
    }
}
