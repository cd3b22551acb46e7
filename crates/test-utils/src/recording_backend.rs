use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scipipe::errors::Result;
use scipipe::exec::{CommandOutput, CommandRequest, ExecutorBackend, ShellBackend};

/// An executor backend that:
/// - records every command it is asked to run
/// - tracks how many commands run at the same time
/// - either runs the command through the real shell or just sleeps.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    shell: Option<ShellBackend>,
    delay: Duration,
    fail_matching: Option<(String, i32)>,
    commands: Mutex<Vec<CommandRequest>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl RecordingBackend {
    /// Run commands for real with `bash -lc`.
    pub fn shell() -> Arc<Self> {
        Arc::new(Self {
            shell: Some(ShellBackend::new()),
            ..Self::default()
        })
    }

    /// Do not run anything; every command "succeeds" after `delay`.
    pub fn fake(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    /// Like [`RecordingBackend::fake`], but commands containing `needle`
    /// exit with `code`.
    pub fn failing(needle: &str, code: i32) -> Arc<Self> {
        Arc::new(Self {
            fail_matching: Some((needle.to_string(), code)),
            ..Self::default()
        })
    }

    /// Commands in the order they were started.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.command.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.commands.lock().unwrap().clone()
    }

    pub fn invocations(&self) -> usize {
        self.commands.lock().unwrap().len()
    }

    /// Highest number of commands that were running at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

impl ExecutorBackend for RecordingBackend {
    fn run_command(
        &self,
        request: CommandRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + '_>> {
        Box::pin(async move {
            self.commands.lock().unwrap().push(request.clone());

            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);

            let result = match (&self.shell, &self.fail_matching) {
                (_, Some((needle, code))) if request.command.contains(needle.as_str()) => {
                    Ok(CommandOutput {
                        code: Some(*code),
                        output: format!("simulated failure of: {}", request.command),
                    })
                }
                (Some(shell), _) => shell.run_command(request).await,
                (None, _) => {
                    tokio::time::sleep(self.delay).await;
                    Ok(CommandOutput {
                        code: Some(0),
                        output: String::new(),
                    })
                }
            };

            self.running.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }
}
