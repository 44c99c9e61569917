use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::VersionControl;
use crate::config::VcsConfig;
use crate::error::{Error, Result};
use crate::models::CommitId;

/// Version-control sink that shells out to `git`.
#[derive(Debug, Clone)]
pub struct GitSink {
    program: String,
    timeout: Duration,
    identity: Option<(String, String)>,
}

impl GitSink {
    pub fn new(config: &VcsConfig) -> Self {
        let identity = match (&config.author_name, &config.author_email) {
            (Some(name), Some(email)) => Some((name.clone(), email.clone())),
            _ => None,
        };
        Self {
            program: config.program.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            identity,
        }
    }

    /// Run git in `workdir` and return its trimmed stdout.
    async fn run(&self, workdir: &Path, args: &[OsString]) -> Result<String> {
        let mut command = Command::new(&self.program);
        if let Some((name, email)) = &self.identity {
            command
                .arg("-c")
                .arg(format!("user.name={}", name))
                .arg("-c")
                .arg(format!("user.email={}", email));
        }
        command.args(args).current_dir(workdir).kill_on_drop(true);

        let rendered = format!(
            "{} {}",
            self.program,
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        tracing::debug!(command = %rendered, workdir = %workdir.display(), "Running git");

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::Process {
                    command: rendered,
                    code: None,
                    stderr: e.to_string(),
                })
            }
            Err(_) => {
                return Err(Error::Process {
                    command: rendered,
                    code: None,
                    stderr: format!("timed out after {:?}", self.timeout),
                })
            }
        };

        if !output.status.success() {
            return Err(Error::Process {
                command: rendered,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn args<const N: usize>(items: [&str; N]) -> Vec<OsString> {
    items.into_iter().map(OsString::from).collect()
}

fn pathspec(workdir: &Path, path: &Path) -> OsString {
    path.strip_prefix(workdir)
        .unwrap_or(path)
        .as_os_str()
        .to_os_string()
}

#[async_trait]
impl VersionControl for GitSink {
    async fn revision_count(&self, workdir: &Path) -> Result<u64> {
        match self.run(workdir, &args(["rev-list", "--count", "HEAD"])).await {
            Ok(out) => Ok(out.parse().unwrap_or(0)),
            Err(e) => {
                tracing::debug!(error = %e, "No revision count, using 0");
                Ok(0)
            }
        }
    }

    async fn head(&self, workdir: &Path) -> Result<Option<CommitId>> {
        match self
            .run(workdir, &args(["rev-parse", "--verify", "--quiet", "HEAD"]))
            .await
        {
            Ok(out) if !out.is_empty() => Ok(Some(CommitId(out))),
            Ok(_) => Ok(None),
            Err(Error::Process { code: Some(_), .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn stage(&self, workdir: &Path, path: &Path) -> Result<()> {
        let mut argv = args(["add", "--"]);
        argv.push(pathspec(workdir, path));
        self.run(workdir, &argv).await?;
        Ok(())
    }

    async fn commit(&self, workdir: &Path, path: &Path, message: &str) -> Result<CommitId> {
        let mut argv = args(["commit", "--quiet", "--only", "-m"]);
        argv.push(OsString::from(message));
        argv.push(OsString::from("--"));
        argv.push(pathspec(workdir, path));
        self.run(workdir, &argv).await?;

        let id = self.run(workdir, &args(["rev-parse", "HEAD"])).await?;
        tracing::info!(commit = %id, "Committed snapshot");
        Ok(CommitId(id))
    }
}
