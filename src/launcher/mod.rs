use crate::RunRequest;
use std::process::{Command, Stdio};
use thiserror::Error;

/// Errors that can occur while constructing or starting a checker process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("path translation failed: {0}")]
    PathTranslation(String),
    #[error("failed to start checker '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LaunchError>;

/// How to invoke the external checker.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Checker executable (name on PATH or explicit path).
    pub program: String,
    /// Run the checker through WSL, translating the image path with `wslpath`.
    pub wsl: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            program: "xcheck".to_string(),
            wsl: false,
        }
    }
}

impl CheckerConfig {
    /// The program name shown to the user in diagnostics.
    pub fn display_name(&self) -> &str {
        &self.program
    }
}

/// Build the checker invocation for one run request.
///
/// The argument list is `[<image>, -v?, -r?]`. Both output streams are piped
/// so the drainer can read them separately. When WSL mode is on, the host
/// path is first translated by the external `wslpath` helper and the checker
/// itself is run through `wsl`.
pub fn build_command(config: &CheckerConfig, request: &RunRequest) -> Result<Command> {
    let mut cmd = if config.wsl {
        let guest_path = translate_path(&request.image.to_string_lossy())?;
        let mut cmd = Command::new("wsl");
        cmd.arg(&config.program).arg(guest_path);
        cmd
    } else {
        let mut cmd = Command::new(&config.program);
        cmd.arg(&request.image);
        cmd
    };

    if request.verbose {
        cmd.arg("-v");
    }
    if request.repair {
        cmd.arg("-r");
    }

    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    Ok(cmd)
}

/// Translate a host path into the form the WSL guest expects.
///
/// `wslpath` is an opaque external collaborator; its output is taken as-is.
pub fn translate_path(host_path: &str) -> Result<String> {
    let output = wslpath_command(host_path).output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LaunchError::PathTranslation(stderr.trim().to_string()));
    }

    let guest = String::from_utf8(output.stdout)?.trim().to_string();
    if guest.is_empty() {
        return Err(LaunchError::PathTranslation(format!(
            "wslpath produced no output for '{host_path}'"
        )));
    }
    Ok(guest)
}

fn wslpath_command(host_path: &str) -> Command {
    let mut cmd = Command::new("wsl");
    cmd.arg("wslpath").arg(host_path);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::path::PathBuf;

    fn request(verbose: bool, repair: bool) -> RunRequest {
        RunRequest {
            image: PathBuf::from("/tmp/fs.img"),
            verbose,
            repair,
        }
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn plain_invocation_is_program_then_image() {
        let config = CheckerConfig::default();
        let cmd = build_command(&config, &request(false, false)).unwrap();

        assert_eq!(cmd.get_program(), OsStr::new("xcheck"));
        assert_eq!(args_of(&cmd), vec!["/tmp/fs.img"]);
    }

    #[test]
    fn verbose_appends_v_flag() {
        let config = CheckerConfig::default();
        let cmd = build_command(&config, &request(true, false)).unwrap();
        assert_eq!(args_of(&cmd), vec!["/tmp/fs.img", "-v"]);
    }

    #[test]
    fn repair_appends_r_flag() {
        let config = CheckerConfig::default();
        let cmd = build_command(&config, &request(false, true)).unwrap();
        assert_eq!(args_of(&cmd), vec!["/tmp/fs.img", "-r"]);
    }

    #[test]
    fn both_flags_keep_v_before_r() {
        let config = CheckerConfig::default();
        let cmd = build_command(&config, &request(true, true)).unwrap();
        assert_eq!(args_of(&cmd), vec!["/tmp/fs.img", "-v", "-r"]);
    }

    #[test]
    fn custom_program_is_used() {
        let config = CheckerConfig {
            program: "/opt/bin/fscheck".to_string(),
            wsl: false,
        };
        let cmd = build_command(&config, &request(false, false)).unwrap();
        assert_eq!(cmd.get_program(), OsStr::new("/opt/bin/fscheck"));
    }

    #[test]
    fn wslpath_invocation_shape() {
        let cmd = wslpath_command("C:\\images\\fs.img");
        assert_eq!(cmd.get_program(), OsStr::new("wsl"));
        assert_eq!(args_of(&cmd), vec!["wslpath", "C:\\images\\fs.img"]);
    }
}
