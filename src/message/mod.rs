use serde::Serialize;

/// Kind of a hive event, persisted as one of five string literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Aborted,
    Started,
    Exited,
    Stdout,
    Stderr,
}

/// One lifecycle or IO event of a replica, produced by the child runner.
/// The batcher enriches it with the run id, machine snapshot, and
/// ingestion timestamp when it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HiveMessage {
    /// Replica index, assigned at spawn enumeration and stable across
    /// restarts of the same replica.
    pub index: usize,
    /// OS pid, -1 if the child never spawned.
    pub pid: i32,
    /// 0-based restart counter of the replica.
    pub attempt: u32,
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Error text for `aborted` and failed `exited`, one line for
    /// `stdout`/`stderr`, empty otherwise.
    pub data: String,
    /// Real exit code, -1 when not applicable.
    #[serde(rename = "exitCode")]
    pub exit_code: i32,
}

impl HiveMessage {
    pub fn started(index: usize, pid: i32, attempt: u32) -> Self {
        Self {
            index,
            pid,
            attempt,
            kind: MessageType::Started,
            data: String::new(),
            exit_code: -1,
        }
    }

    pub fn exited(index: usize, pid: i32, attempt: u32, exit_code: i32, data: String) -> Self {
        Self {
            index,
            pid,
            attempt,
            kind: MessageType::Exited,
            data,
            exit_code,
        }
    }

    pub fn aborted(index: usize, attempt: u32, data: String) -> Self {
        Self {
            index,
            pid: -1,
            attempt,
            kind: MessageType::Aborted,
            data,
            exit_code: -1,
        }
    }

    pub fn stdout_line(index: usize, pid: i32, attempt: u32, line: String) -> Self {
        Self {
            index,
            pid,
            attempt,
            kind: MessageType::Stdout,
            data: line,
            exit_code: -1,
        }
    }

    pub fn stderr_line(index: usize, pid: i32, attempt: u32, line: String) -> Self {
        Self {
            index,
            pid,
            attempt,
            kind: MessageType::Stderr,
            data: line,
            exit_code: -1,
        }
    }
}
