//! Scene composition
//!
//! The compositor places an object over a photograph using a
//! [`WorldTransform`] and writes the rendered result. The stock
//! implementation drives Blender in background mode with an external
//! placement script:
//!
//! ```text
//! <blender> -b -P <script> -- <background> <output> <matrix-json> [model]
//! ```

use serde::Serialize;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::ComposeError;
use crate::placement::WorldTransform;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything one render needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneRequest {
    /// Photograph used as the background plane
    pub background: PathBuf,
    /// Rendered image destination
    pub output: PathBuf,
    /// Object placement
    pub transform: WorldTransform,
    /// Model file to import; the script's default object when `None`
    pub model: Option<PathBuf>,
}

/// Renders a placed object over a background
pub trait SceneCompositor {
    /// Render `request`, writing `request.output`
    fn compose(&self, request: &SceneRequest) -> Result<(), ComposeError>;
}

/// Blender in background mode
#[derive(Debug, Clone)]
pub struct BlenderCompositor {
    /// Blender executable, looked up on `PATH` when relative
    pub executable: PathBuf,
    /// Placement script passed with `-P`
    pub script: PathBuf,
    /// Wall-clock limit for one render
    pub timeout: Duration,
}

impl BlenderCompositor {
    /// Default executable name
    pub const DEFAULT_EXECUTABLE: &'static str = "blender";
    /// Default render time limit
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// `blender` from `PATH` running `script`
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            executable: PathBuf::from(Self::DEFAULT_EXECUTABLE),
            script: script.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Use a specific executable
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Use a different time limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command-line arguments after the executable
    pub fn arguments(&self, request: &SceneRequest) -> Result<Vec<OsString>, ComposeError> {
        let matrix = serde_json::to_string(&request.transform.matrix)?;
        let mut args: Vec<OsString> = vec![
            "-b".into(),
            "-P".into(),
            self.script.clone().into(),
            "--".into(),
            request.background.clone().into(),
            request.output.clone().into(),
            matrix.into(),
        ];
        if let Some(model) = &request.model {
            args.push(model.clone().into());
        }
        Ok(args)
    }

    fn spawn(&self, args: &[OsString]) -> Result<Child, ComposeError> {
        Command::new(&self.executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ComposeError::NotInstalled {
                    executable: self.executable.clone(),
                },
                _ => ComposeError::Io(e),
            })
    }

    /// Exit status from a wait outcome. On a timeout or a failed wait the
    /// child is killed and reaped before the error is returned.
    fn settle(
        &self,
        child: &mut Child,
        waited: Result<Option<ExitStatus>, ComposeError>,
    ) -> Result<ExitStatus, ComposeError> {
        match waited {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                warn!(timeout = ?self.timeout, "render timed out, killing process");
                stop(child);
                Err(ComposeError::TimedOut(self.timeout))
            }
            Err(e) => {
                warn!(error = %e, "waiting on render failed, killing process");
                stop(child);
                Err(e)
            }
        }
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<Option<ExitStatus>, ComposeError> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if started.elapsed() >= self.timeout {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl SceneCompositor for BlenderCompositor {
    fn compose(&self, request: &SceneRequest) -> Result<(), ComposeError> {
        let args = self.arguments(request)?;
        debug!(executable = %self.executable.display(), ?args, "starting render");

        let mut child = self.spawn(&args)?;
        // A full stderr pipe blocks the child, so drain it concurrently
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || -> io::Result<String> {
                let mut bytes = Vec::new();
                pipe.read_to_end(&mut bytes)?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            })
        });

        let waited = self.wait_with_timeout(&mut child);
        let status = self.settle(&mut child, waited)?;
        let stderr = collect_stderr(stderr_reader);

        if !status.success() {
            return Err(ComposeError::Failed {
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        info!(output = %request.output.display(), "render finished");
        Ok(())
    }
}

/// Kill and reap; a kill error usually means the process already exited
fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill failed");
    }
    if let Err(e) = child.wait() {
        debug!(error = %e, "reaping render process failed");
    }
}

/// Captured stderr, or empty when the reader failed
fn collect_stderr(reader: Option<JoinHandle<io::Result<String>>>) -> String {
    let Some(handle) = reader else {
        return String::new();
    };
    match handle.join() {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            debug!(error = %e, "reading render stderr failed");
            String::new()
        }
        Err(_) => {
            debug!("render stderr reader panicked");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model: Option<&str>) -> SceneRequest {
        SceneRequest {
            background: PathBuf::from("in.png"),
            output: PathBuf::from("out.png"),
            transform: WorldTransform {
                matrix: [
                    [0.5, 0.0, 0.0, 0.1],
                    [0.0, 0.5, 0.0, -0.2],
                    [0.0, 0.0, 0.5, 0.0],
                    [0.0, 0.0, 0.0, 1.0],
                ],
            },
            model: model.map(PathBuf::from),
        }
    }

    #[test]
    fn test_arguments_layout() {
        let blender = BlenderCompositor::new("render_blender.py");
        let args = blender.arguments(&request(None)).unwrap();
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(&args[..6], &["-b", "-P", "render_blender.py", "--", "in.png", "out.png"]);
        let matrix: [[f64; 4]; 4] = serde_json::from_str(&args[6]).unwrap();
        assert_eq!(matrix[1][3], -0.2);
        assert_eq!(args.len(), 7);

        let with_model = blender.arguments(&request(Some("duck.obj"))).unwrap();
        assert_eq!(with_model.len(), 8);
        assert_eq!(with_model[7], OsString::from("duck.obj"));
    }

    #[test]
    fn test_missing_executable() {
        let blender = BlenderCompositor::new("render_blender.py")
            .with_executable("/nonexistent/bin/blender-qrpose");
        assert!(matches!(
            blender.compose(&request(None)),
            Err(ComposeError::NotInstalled { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_process_reports_exit_code() {
        // `false` ignores its arguments and exits 1
        let blender = BlenderCompositor::new("script.py").with_executable("false");
        match blender.compose(&request(None)) {
            Err(ComposeError::Failed { code, .. }) => assert_eq!(code, Some(1)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_process() {
        let blender = BlenderCompositor::new("script.py").with_executable("true");
        assert!(blender.compose(&request(Some("model.obj"))).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_wait_kills_and_reaps_child() {
        let blender = BlenderCompositor::new("script.py");
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let waited = Err(ComposeError::Io(io::Error::other("poll failed")));
        assert!(matches!(
            blender.settle(&mut child, waited),
            Err(ComposeError::Io(_))
        ));
        // Reaped: the exit status is already known
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn test_stderr_reader_failure_yields_empty_text() {
        let failing = thread::spawn(|| Err(io::Error::other("pipe closed")));
        assert_eq!(collect_stderr(Some(failing)), "");
        let captured = thread::spawn(|| Ok("warning: no GPU".to_string()));
        assert_eq!(collect_stderr(Some(captured)), "warning: no GPU");
        assert_eq!(collect_stderr(None), "");
    }
}
