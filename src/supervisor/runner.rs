use std::io::{self, BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, error, info, warn};

use super::shutdown::{ShutdownCoordinator, SpawnAttempt};
use super::Replica;
use crate::event::EventPublisher;
use crate::message::HiveMessage;

/// Child output lines longer than this are truncated; the excess is read
/// and discarded so the stream stays line-aligned.
const MAX_LINE_BYTES: usize = 1024 * 1024;

pub(super) struct RunOutcome {
    pub exit_code: i32,
    pub torn_down: bool,
}

/// Runs one child to completion for `(replica.index, attempt)`: spawn under
/// the shutdown lock, stream both output pipes to the event pipeline, wait,
/// deregister. Emits exactly one `aborted`, or one `started` followed by
/// the IO messages and exactly one `exited`.
pub(super) fn run_child(
    replica: &Replica,
    attempt: u32,
    coordinator: &ShutdownCoordinator,
    events: &EventPublisher<HiveMessage>,
) -> RunOutcome {
    let mut command = Command::new(&replica.program);
    command
        .args(&replica.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if !replica.forward_os_env {
        command.env_clear();
    }
    command.envs(replica.env.iter().map(|(name, value)| (name, value)));

    let mut child = match coordinator.try_spawn(replica.index, &mut command) {
        SpawnAttempt::TornDown => {
            return RunOutcome {
                exit_code: -1,
                torn_down: true,
            }
        }
        SpawnAttempt::Failed(err) => {
            warn!(
                process = %replica.name,
                index = replica.index,
                attempt,
                "cannot start child: {err}"
            );
            emit(events, HiveMessage::aborted(replica.index, attempt, err.to_string()));
            return RunOutcome {
                exit_code: -1,
                torn_down: coordinator.is_tearing_down(),
            };
        }
        SpawnAttempt::Spawned(child) => child,
    };

    let pid = child.id() as i32;
    info!(
        process = %replica.name,
        index = replica.index,
        pid,
        attempt,
        "child started"
    );
    emit(events, HiveMessage::started(replica.index, pid, attempt));

    // Both pipes were requested before the spawn; stream them to EOF so a
    // chatty child never stalls on a full pipe.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    thread::scope(|scope| {
        scope.spawn(move || {
            if let Some(stdout) = stdout {
                stream_lines(stdout, |line| {
                    debug!(process = %replica.name, index = replica.index, "{line}");
                    emit(events, HiveMessage::stdout_line(replica.index, pid, attempt, line));
                });
            }
        });
        scope.spawn(move || {
            if let Some(stderr) = stderr {
                stream_lines(stderr, |line| {
                    error!(process = %replica.name, index = replica.index, "{line}");
                    emit(events, HiveMessage::stderr_line(replica.index, pid, attempt, line));
                });
            }
        });
    });

    let (exit_code, data) = match child.wait() {
        Ok(status) => {
            // code() is None when a signal ended the child
            let code = status.code().unwrap_or(-1);
            if code == 0 {
                info!(process = %replica.name, index = replica.index, pid, "child exited cleanly");
            } else {
                warn!(
                    process = %replica.name,
                    index = replica.index,
                    pid,
                    exit_code = code,
                    "child exited unsuccessfully"
                );
            }
            (code, String::new())
        }
        Err(err) => {
            warn!(
                process = %replica.name,
                index = replica.index,
                pid,
                "cannot wait for child: {err}"
            );
            (-1, err.to_string())
        }
    };
    emit(
        events,
        HiveMessage::exited(replica.index, pid, attempt, exit_code, data),
    );

    let torn_down = coordinator.deregister(replica.index);
    RunOutcome {
        exit_code,
        torn_down,
    }
}

fn emit(events: &EventPublisher<HiveMessage>, message: HiveMessage) {
    if events.publish(message).is_err() {
        warn!("event pipeline is closed, dropping message");
    }
}

fn stream_lines<R: Read>(source: R, mut sink: impl FnMut(String)) {
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match read_line_capped(&mut reader, &mut buf, MAX_LINE_BYTES) {
            Ok(None) => break,
            Ok(Some(truncated)) => {
                if truncated {
                    warn!("child output line exceeded {MAX_LINE_BYTES} bytes and was truncated");
                }
                sink(String::from_utf8_lossy(&buf).into_owned());
            }
            Err(err) => {
                debug!("child output stream closed: {err}");
                break;
            }
        }
    }
}

/// Reads one line into `buf` (newline excluded), storing at most `cap`
/// bytes; the rest of an over-long line is consumed and dropped. A trailing
/// line without a newline at EOF is still returned. `Ok(None)` means EOF
/// with nothing read, `Ok(Some(truncated))` a delivered line.
fn read_line_capped<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    cap: usize,
) -> io::Result<Option<bool>> {
    let mut truncated = false;
    let mut saw_data = false;
    loop {
        let available = match reader.fill_buf() {
            Ok(chunk) => chunk,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        if available.is_empty() {
            return if saw_data { Ok(Some(truncated)) } else { Ok(None) };
        }
        saw_data = true;

        let (line_part, consumed, done) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (&available[..pos], pos + 1, true),
            None => (available, available.len(), false),
        };
        let room = cap.saturating_sub(buf.len());
        if line_part.len() > room {
            truncated = true;
        }
        buf.extend_from_slice(&line_part[..line_part.len().min(room)]);
        reader.consume(consumed);
        if done {
            return Ok(Some(truncated));
        }
    }
}
