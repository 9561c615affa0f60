//! Scripted host for driving the manager without real hardware.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use smi_cfgmgr_common::{ExecResult, Host, SmiError, SmiResult};

/// A detached command started through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRecord {
    /// The full command line.
    pub command: String,
    /// Where the daemon output was directed.
    pub log_path: PathBuf,
    /// Fake pid handed back to the caller.
    pub pid: u32,
}

#[derive(Debug)]
struct ProcessTable {
    command: String,
    baseline: Vec<String>,
}

#[derive(Debug)]
struct MockState {
    /// Scripted responses per exact command; the last one repeats.
    responses: HashMap<String, VecDeque<ExecResult>>,
    executed: Vec<String>,
    spawned: Vec<SpawnRecord>,
    sleeps: Vec<Duration>,
    missing_tools: HashSet<String>,
    process_table: Option<ProcessTable>,
    /// Spawned commands containing one of these never show up as alive.
    dying: Vec<String>,
    spawn_fails: bool,
    next_pid: u32,
}

/// A [`Host`] that answers commands from a script and records everything.
///
/// Commands without a scripted response succeed with empty output.
///
/// # Example
///
/// ```
/// use smi_cfgmgr_test::MockHost;
///
/// let host = MockHost::new()
///     .respond("ibstat \"endpoint0\"", "Port 1:\n\tState: Active")
///     .missing_tool("opensm");
/// assert!(host.executed().is_empty());
/// ```
#[derive(Debug)]
pub struct MockHost {
    state: Mutex<MockState>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHost {
    /// Creates a host with no scripted responses.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                responses: HashMap::new(),
                executed: Vec::new(),
                spawned: Vec::new(),
                sleeps: Vec::new(),
                missing_tools: HashSet::new(),
                process_table: None,
                dying: Vec::new(),
                spawn_fails: false,
                next_pid: 4000,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Scripts a successful response for `cmd`.
    pub fn respond(self, cmd: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.set_response(cmd, ExecResult::ok(stdout));
        self
    }

    /// Scripts a sequence of successful responses; the last one repeats.
    pub fn respond_seq<I, S>(self, cmd: impl Into<String>, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue = outputs.into_iter().map(ExecResult::ok).collect();
        self.lock().responses.insert(cmd.into(), queue);
        self
    }

    /// Scripts a failing response for `cmd`.
    pub fn respond_failure(
        self,
        cmd: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        self.set_response(cmd, ExecResult::failed(exit_code, stderr));
        self
    }

    /// Marks `program` as not installed.
    pub fn missing_tool(self, program: impl Into<String>) -> Self {
        self.lock().missing_tools.insert(program.into());
        self
    }

    /// Simulates the process table: running `cmd` lists `baseline` rows
    /// followed by every spawned daemon that is still alive.
    pub fn with_process_table<I, S>(self, cmd: impl Into<String>, baseline: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().process_table = Some(ProcessTable {
            command: cmd.into(),
            baseline: baseline.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Spawned commands containing `pattern` exit immediately.
    pub fn daemon_dies(self, pattern: impl Into<String>) -> Self {
        self.lock().dying.push(pattern.into());
        self
    }

    /// Every spawn attempt fails.
    pub fn spawn_fails(self) -> Self {
        self.lock().spawn_fails = true;
        self
    }

    /// Replaces the script for `cmd` with a single repeating response.
    pub fn set_response(&self, cmd: impl Into<String>, result: ExecResult) {
        self.lock()
            .responses
            .insert(cmd.into(), VecDeque::from([result]));
    }

    /// Commands run through [`Host::exec`], in order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Detached commands started, in order.
    pub fn spawned(&self) -> Vec<SpawnRecord> {
        self.lock().spawned.clone()
    }

    /// Every sleep requested, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    /// Forgets recorded commands and sleeps. Scripts and spawned daemons
    /// are kept so the process table stays consistent.
    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.executed.clear();
        state.sleeps.clear();
    }

    fn render_process_table(state: &MockState, table: &ProcessTable) -> String {
        let alive = state
            .spawned
            .iter()
            .filter(|s| !state.dying.iter().any(|p| s.command.contains(p.as_str())))
            .map(|s| format!("{} {}", s.pid, s.command));
        table
            .baseline
            .iter()
            .cloned()
            .chain(alive)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Host for MockHost {
    async fn exec(&self, cmd: &str) -> SmiResult<ExecResult> {
        let mut state = self.lock();
        state.executed.push(cmd.to_string());

        if let Some(table) = state.process_table.as_ref() {
            if table.command == cmd {
                return Ok(ExecResult::ok(Self::render_process_table(&state, table)));
            }
        }

        let result = match state.responses.get_mut(cmd) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(result.unwrap_or_else(|| ExecResult::ok("")))
    }

    async fn spawn_detached(&self, cmd: &str, log_path: &Path) -> SmiResult<u32> {
        let mut state = self.lock();
        if state.spawn_fails {
            return Err(SmiError::ShellExec {
                command: cmd.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock spawn failure"),
            });
        }
        let pid = state.next_pid;
        state.next_pid += 1;
        state.spawned.push(SpawnRecord {
            command: cmd.to_string(),
            log_path: log_path.to_path_buf(),
            pid,
        });
        Ok(pid)
    }

    async fn tool_available(&self, program: &str) -> SmiResult<bool> {
        Ok(!self.lock().missing_tools.contains(program))
    }

    async fn sleep(&self, duration: Duration) {
        self.lock().sleeps.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_sequence_repeats_last() {
        let host = MockHost::new().respond_seq("list", ["first", "second"]);
        assert_eq!(host.exec("list").await.unwrap().stdout, "first");
        assert_eq!(host.exec("list").await.unwrap().stdout, "second");
        assert_eq!(host.exec("list").await.unwrap().stdout, "second");
        assert_eq!(host.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_unscripted_command_succeeds_empty() {
        let host = MockHost::new();
        let result = host.exec("rdma dev del \"x\"").await.unwrap();
        assert!(result.success());
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_process_table_tracks_spawns() {
        let host = MockHost::new()
            .with_process_table("ps", ["1 /sbin/init"])
            .daemon_dies("0xdead");
        host.spawn_detached("opensm -g 0xbeef", Path::new("/tmp/a.log"))
            .await
            .unwrap();
        host.spawn_detached("opensm -g 0xdead", Path::new("/tmp/b.log"))
            .await
            .unwrap();

        let table = host.exec("ps").await.unwrap().stdout;
        assert!(table.contains("/sbin/init"));
        assert!(table.contains("opensm -g 0xbeef"));
        assert!(!table.contains("0xdead"));
    }

    #[tokio::test]
    async fn test_missing_tool_and_sleep() {
        let host = MockHost::new().missing_tool("opensm");
        assert!(!host.tool_available("opensm").await.unwrap());
        assert!(host.tool_available("ibstat").await.unwrap());
        host.sleep(Duration::from_millis(5)).await;
        assert_eq!(host.sleeps(), vec![Duration::from_millis(5)]);
    }
}
