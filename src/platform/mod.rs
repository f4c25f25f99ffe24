use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use wait_timeout::ChildExt;

const TERM_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    tracing::debug!(cmd, ?args, ?timeout, "running command");
    let mut command = Command::new(cmd);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = spawn_in_own_group(&mut command)
        .with_context(|| format!("failed to start process: {cmd}"))?;

    // Pipes are drained on helper threads so a chatty child cannot fill the
    // pipe buffer and stall until the timeout.
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let status = wait_or_kill(&mut child, cmd, timeout)?;

    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

/// Runs `cmd` with stdout streamed into `out_path` (truncated first). Returns
/// the exit code. stderr is discarded.
pub fn run_command_to_file(
    cmd: &str,
    args: &[&str],
    timeout: Duration,
    out_path: &Path,
) -> Result<i32> {
    tracing::debug!(cmd, ?args, ?timeout, out = %out_path.display(), "running command into file");
    let file = File::create(out_path)
        .with_context(|| format!("failed to create output file: {}", out_path.display()))?;

    let mut command = Command::new(cmd);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(file))
        .stderr(Stdio::null());
    let mut child = spawn_in_own_group(&mut command)
        .with_context(|| format!("failed to start process: {cmd}"))?;

    let status = wait_or_kill(&mut child, cmd, timeout)?;
    Ok(status.code().unwrap_or(-1))
}

/// Each child leads its own process group so a timeout can take down
/// everything it forked (`sudo` and the command under it, shell pipelines).
#[cfg(unix)]
fn spawn_in_own_group(command: &mut Command) -> std::io::Result<Child> {
    use std::os::unix::process::CommandExt;
    command.process_group(0).spawn()
}

#[cfg(not(unix))]
fn spawn_in_own_group(command: &mut Command) -> std::io::Result<Child> {
    command.spawn()
}

fn wait_or_kill(child: &mut Child, cmd: &str, timeout: Duration) -> Result<ExitStatus> {
    let started = Instant::now();
    let waited = child
        .wait_timeout(timeout)
        .with_context(|| format!("failed to wait for process: {cmd}"));
    match waited {
        Ok(Some(status)) => {
            tracing::debug!(cmd, elapsed = ?started.elapsed(), code = ?status.code(), "command finished");
            // Background writers left behind by the child must not keep
            // touching its output after we return.
            signal_group(child, GroupSignal::Kill);
            Ok(status)
        }
        Ok(None) => {
            terminate_group(child);
            tracing::warn!(cmd, ?timeout, "command timed out");
            Err(anyhow!("timed out after {timeout:?}: {cmd}"))
        }
        Err(err) => {
            terminate_group(child);
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Term,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &Child, sig: GroupSignal) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    let sig = match sig {
        GroupSignal::Term => libc::SIGTERM,
        GroupSignal::Kill => libc::SIGKILL,
    };
    // ESRCH just means the group is already gone.
    unsafe {
        libc::killpg(pgid, sig);
    }
}

#[cfg(not(unix))]
fn signal_group(_child: &Child, _sig: GroupSignal) {}

/// SIGTERM first so `sudo` can relay it to its command, then SIGKILL for
/// whatever is left in the group.
fn terminate_group(child: &mut Child) {
    signal_group(child, GroupSignal::Term);
    if !matches!(child.wait_timeout(TERM_GRACE), Ok(Some(_))) {
        let _ = child.kill();
    }
    signal_group(child, GroupSignal::Kill);
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Equivalent of `command -v name` for plain program names.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    find_in_dirs(name, std::env::split_paths(&path_var))
}

fn find_in_dirs(name: &str, dirs: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    if name.is_empty() || name.contains('/') {
        return None;
    }
    dirs.into_iter()
        .filter(|d| !d.as_os_str().is_empty())
        .map(|d| d.join(name))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(unix)]
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

/// Whether a privileged step should go through sudo: requested and not
/// already root.
pub fn wants_sudo(requested: bool) -> bool {
    requested && !is_root()
}

/// Argument vector for running `cmd args` as `sudo -n cmd args`. `-n` makes
/// sudo fail instead of prompting.
pub fn sudo_args<'a>(cmd: &'a str, args: &[&'a str]) -> Vec<&'a str> {
    let mut full = vec!["-n", cmd];
    full.extend_from_slice(args);
    full
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uname {
    pub nodename: String,
    pub release: String,
    pub machine: String,
}

#[cfg(unix)]
pub fn uname() -> Option<Uname> {
    use std::ffi::CStr;

    unsafe {
        let mut uts: libc::utsname = std::mem::zeroed();
        if libc::uname(&mut uts) != 0 {
            return None;
        }
        let field = |raw: &[libc::c_char]| {
            CStr::from_ptr(raw.as_ptr())
                .to_string_lossy()
                .trim()
                .to_string()
        };
        Some(Uname {
            nodename: field(&uts.nodename),
            release: field(&uts.release),
            machine: field(&uts.machine),
        })
    }
}

#[cfg(not(unix))]
pub fn uname() -> Option<Uname> {
    None
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Quotes `s` for a POSIX shell. Used for commands that run on the remote
/// side of ssh, where the argument vector is flattened into one string.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

pub fn shell_join<S: AsRef<OsStr>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| shell_quote(&p.as_ref().to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}
