use crate::domain::ports::{CommandOutput, CommandRunner};
use crate::utils::error::{DemoError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    pub port: u16,
    pub found: Vec<u32>,
    pub killed: Vec<u32>,
    pub failed: Vec<u32>,
}

impl ReclaimReport {
    fn empty(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }
}

/// 透過 tokio::process 執行系統指令
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| DemoError::CommandError {
                command: program.to_string(),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Kills whatever is listening on a port before the dev server binds it.
///
/// Finding nothing (or lacking the lookup tool) is not an error, so running
/// it twice in a row on a free port is harmless.
pub struct PortReclaimer {
    port: u16,
    platform: Platform,
    settle_delay: Duration,
    runner: Arc<dyn CommandRunner>,
}

impl PortReclaimer {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            platform: Platform::current(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            runner: Arc::new(SystemCommandRunner),
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub async fn reclaim(&self) -> Result<ReclaimReport> {
        tracing::info!("🔄 Checking for existing processes on port {}...", self.port);

        let own_pid = std::process::id();
        let pids: Vec<u32> = self
            .find_listeners()
            .await
            .into_iter()
            .filter(|pid| *pid != own_pid)
            .collect();

        if pids.is_empty() {
            tracing::info!("✅ No existing processes found on port {}", self.port);
            return Ok(ReclaimReport::empty(self.port));
        }

        let mut report = ReclaimReport {
            port: self.port,
            found: pids.clone(),
            ..Default::default()
        };

        for pid in pids {
            tracing::info!("🛑 Killing process {}...", pid);
            let (program, args) = self.kill_command(pid);
            match self.runner.run(program, &args).await {
                Ok(output) if output.success => {
                    tracing::info!("✅ Successfully killed process {}", pid);
                    report.killed.push(pid);
                }
                Ok(output) => {
                    tracing::warn!(
                        "⚠️ Error killing process {}: {}",
                        pid,
                        output.stderr.trim()
                    );
                    report.failed.push(pid);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Error killing process {}: {}", pid, e);
                    report.failed.push(pid);
                }
            }
        }

        tokio::time::sleep(self.settle_delay).await;
        Ok(report)
    }

    async fn find_listeners(&self) -> Vec<u32> {
        let (program, args) = self.lookup_command();
        let output = match self.runner.run(program, &args).await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("Port lookup unavailable: {}", e);
                return Vec::new();
            }
        };

        // lsof 找不到任何行程時會以非零狀態結束
        if !output.success || output.stdout.trim().is_empty() {
            return Vec::new();
        }

        match self.platform {
            Platform::Windows => parse_netstat_pids(&output.stdout, self.port),
            Platform::Unix => parse_lsof_pids(&output.stdout),
        }
    }

    fn lookup_command(&self) -> (&'static str, Vec<String>) {
        match self.platform {
            Platform::Windows => ("netstat", vec!["-ano".to_string()]),
            Platform::Unix => (
                "lsof",
                vec![
                    "-t".to_string(),
                    "-i".to_string(),
                    format!(":{}", self.port),
                    "-sTCP:LISTEN".to_string(),
                ],
            ),
        }
    }

    fn kill_command(&self, pid: u32) -> (&'static str, Vec<String>) {
        match self.platform {
            Platform::Windows => (
                "taskkill",
                vec!["/F".to_string(), "/PID".to_string(), pid.to_string()],
            ),
            Platform::Unix => ("kill", vec!["-9".to_string(), pid.to_string()]),
        }
    }
}

/// `lsof -t` prints one PID per line.
pub fn parse_lsof_pids(stdout: &str) -> Vec<u32> {
    let mut pids = Vec::new();
    for pid in stdout.lines().filter_map(|line| line.trim().parse::<u32>().ok()) {
        if !pids.contains(&pid) {
            pids.push(pid);
        }
    }
    pids
}

/// `netstat -ano` rows: Proto, Local Address, Foreign Address, State, PID.
pub fn parse_netstat_pids(stdout: &str, port: u16) -> Vec<u32> {
    let suffix = format!(":{}", port);
    let mut pids = Vec::new();

    for line in stdout.lines() {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < 5 || !columns[0].eq_ignore_ascii_case("tcp") {
            continue;
        }
        if !columns[1].ends_with(&suffix) || columns[3] != "LISTENING" {
            continue;
        }
        if let Some(pid) = columns.last().and_then(|pid| pid.parse::<u32>().ok()) {
            if pid != 0 && !pids.contains(&pid) {
                pids.push(pid);
            }
        }
    }
    pids
}
