use crate::RunRequest;
use crate::launcher::{self, CheckerConfig, LaunchError};
use std::io::{BufRead, BufReader};
use std::process::Child;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

/// Message from the drainer to the event pump.
///
/// Lines are FIFO within each origin stream; ordering between stdout and
/// stderr is not guaranteed. Exactly one `Exited` is sent per run, always
/// last.
#[derive(Debug, Clone)]
pub enum CheckerEvent {
    /// A line from the checker's stdout.
    Stdout(String),
    /// A line from the checker's stderr.
    Stderr(String),
    /// The run is over. `code` is `None` when the child was killed or never
    /// started.
    Exited { code: Option<i32> },
}

/// Handle to an in-flight verification run.
///
/// The only shared state with the drainer is the child-process slot; all
/// output flows through the channel.
pub struct RunHandle {
    child: Arc<Mutex<Option<Child>>>,
    tx: Sender<CheckerEvent>,
}

impl RunHandle {
    /// Best-effort cancellation: kill the child if one is still live.
    ///
    /// Returns `false` (a no-op) when no process is running. Killing the
    /// child closes its pipes, so the reader threads drain to EOF and the
    /// normal `Exited` event follows.
    pub fn stop(&self) -> bool {
        let mut guard = lock(&self.child);
        match guard.as_mut() {
            Some(child) => {
                if child.kill().is_ok() {
                    let _ = self
                        .tx
                        .send(CheckerEvent::Stdout("[INFO] Process terminated by user.".into()));
                }
                true
            }
            None => false,
        }
    }
}

/// Launch the checker for `request` and drain it in the background.
///
/// Path translation, spawning, and both pipe reads all happen off the calling
/// thread. A launch failure is reported through the channel as one synthetic
/// error line plus `Exited`, never as a panic or return value.
///
/// The caller is responsible for the single-run invariant and for validating
/// that the image file exists before calling this.
pub fn start(config: CheckerConfig, request: RunRequest, tx: Sender<CheckerEvent>) -> RunHandle {
    let slot: Arc<Mutex<Option<Child>>> = Arc::new(Mutex::new(None));
    let handle = RunHandle {
        child: Arc::clone(&slot),
        tx: tx.clone(),
    };

    thread::spawn(move || drain(&config, &request, &slot, &tx));
    handle
}

fn drain(
    config: &CheckerConfig,
    request: &RunRequest,
    slot: &Mutex<Option<Child>>,
    tx: &Sender<CheckerEvent>,
) {
    let spawned = launcher::build_command(config, request).and_then(|mut cmd| {
        cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: config.display_name().to_string(),
            source,
        })
    });

    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => {
            let _ = tx.send(CheckerEvent::Stderr(format!("[ERROR] {err}")));
            let _ = tx.send(CheckerEvent::Exited { code: None });
            return;
        }
    };

    // The readers own the pipes; the slot owns the child so stop() can reach it.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    *lock(slot) = Some(child);

    let out_reader = stdout.map(|pipe| {
        let tx = tx.clone();
        thread::spawn(move || read_lines(pipe, &tx, CheckerEvent::Stdout))
    });
    let err_reader = stderr.map(|pipe| {
        let tx = tx.clone();
        thread::spawn(move || read_lines(pipe, &tx, CheckerEvent::Stderr))
    });

    if let Some(reader) = out_reader {
        let _ = reader.join();
    }
    if let Some(reader) = err_reader {
        let _ = reader.join();
    }

    // Both pipes are closed, so the wait is short.
    let code = {
        let mut guard = lock(slot);
        let code = guard
            .as_mut()
            .and_then(|child| child.wait().ok())
            .and_then(|status| status.code());
        *guard = None;
        code
    };

    let _ = tx.send(CheckerEvent::Exited { code });
}

fn read_lines<R, F>(pipe: R, tx: &Sender<CheckerEvent>, event: F)
where
    R: std::io::Read,
    F: Fn(String) -> CheckerEvent,
{
    for line in BufReader::new(pipe).lines() {
        let Ok(text) = line else { break };
        if tx.send(event(text)).is_err() {
            break;
        }
    }
}

fn lock<'a>(slot: &'a Mutex<Option<Child>>) -> MutexGuard<'a, Option<Child>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::time::Duration;

    fn collect_until_exit(rx: &mpsc::Receiver<CheckerEvent>) -> Vec<CheckerEvent> {
        let mut events = Vec::new();
        loop {
            let event = rx
                .recv_timeout(Duration::from_secs(10))
                .expect("drainer must always complete");
            let done = matches!(event, CheckerEvent::Exited { .. });
            events.push(event);
            if done {
                return events;
            }
        }
    }

    #[test]
    #[cfg(unix)]
    fn echo_run_yields_one_stdout_line_then_exit() {
        let config = CheckerConfig {
            program: "echo".to_string(),
            wsl: false,
        };
        let request = RunRequest::new(PathBuf::from("[PASS] check1"));

        let (tx, rx) = mpsc::channel();
        let _handle = start(config, request, tx);
        let events = collect_until_exit(&rx);

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], CheckerEvent::Stdout(line) if line == "[PASS] check1"));
        assert!(matches!(events[1], CheckerEvent::Exited { code: Some(0) }));
    }

    #[test]
    fn missing_program_yields_synthetic_error_then_exit() {
        let config = CheckerConfig {
            program: "/nonexistent/imgcheck-no-such-binary".to_string(),
            wsl: false,
        };
        let request = RunRequest::new(PathBuf::from("fs.img"));

        let (tx, rx) = mpsc::channel();
        let _handle = start(config, request, tx);
        let events = collect_until_exit(&rx);

        assert_eq!(events.len(), 2, "exactly one error line plus completion");
        assert!(matches!(&events[0], CheckerEvent::Stderr(line) if line.starts_with("[ERROR]")));
        assert!(matches!(events[1], CheckerEvent::Exited { code: None }));
    }

    #[test]
    fn stop_after_completion_is_a_noop() {
        let config = CheckerConfig {
            program: "/nonexistent/imgcheck-no-such-binary".to_string(),
            wsl: false,
        };
        let request = RunRequest::new(PathBuf::from("fs.img"));

        let (tx, rx) = mpsc::channel();
        let handle = start(config, request, tx);
        let _ = collect_until_exit(&rx);

        assert!(!handle.stop(), "stop with no live child is a no-op");
    }
}
