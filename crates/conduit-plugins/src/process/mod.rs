//! Plugin handles backed by a long-lived child process.
//!
//! [`ProcessPluginHandle`] spawns the plugin executable once, keeps its
//! stdin and stdout open for the whole run and exchanges one JSONL message
//! pair per operation (see [`crate::protocol`]). A successful `describe`
//! reply is cached for the life of the handle. Teardown asks the plugin to
//! shut down, gives it a grace period to exit and kills it otherwise. Drop
//! runs the same teardown, so the child is reaped on every exit path.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::context::{Context, ExecutionDecision};
use crate::descriptor::PluginDescriptor;
use crate::discovery::DiscoveredPlugin;
use crate::error::PluginError;
use crate::handle::PluginHandle;
use crate::protocol::{HostMessage, PluginReply};

/// Tracing target for plugin process operations.
const PROCESS_TARGET: &str = "conduit_plugins::process";

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A plugin running in its own process.
#[derive(Debug)]
pub struct ProcessPluginHandle {
    name: String,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
    grace: Duration,
    descriptor: Option<PluginDescriptor>,
    torn_down: bool,
}

impl ProcessPluginHandle {
    /// Spawns the executable of a discovered plugin.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::SpawnFailed`] when the process cannot be
    /// started or its pipes cannot be captured.
    pub fn spawn(plugin: &DiscoveredPlugin, grace: Duration) -> Result<Self, PluginError> {
        debug!(
            target: PROCESS_TARGET,
            plugin = %plugin.name,
            executable = %plugin.path.display(),
            "spawning plugin process"
        );
        Self::spawn_command(&plugin.name, Command::new(&plugin.path), grace)
    }

    /// Spawns a prepared command as plugin `name`.
    ///
    /// Stdin and stdout are replaced with pipes; stderr is inherited.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::SpawnFailed`] when the process cannot be
    /// started or its pipes cannot be captured.
    pub fn spawn_command(
        name: &str,
        mut command: Command,
        grace: Duration,
    ) -> Result<Self, PluginError> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = command.spawn().map_err(|err| PluginError::SpawnFailed {
            name: name.to_owned(),
            message: err.to_string(),
            source: Some(Arc::new(err)),
        })?;

        let pipes = child.stdin.take().zip(child.stdout.take());
        let Some((stdin, stdout)) = pipes else {
            drop(child.kill());
            drop(child.wait());
            return Err(PluginError::SpawnFailed {
                name: name.to_owned(),
                message: String::from("failed to capture plugin stdio"),
                source: None,
            });
        };

        Ok(Self {
            name: name.to_owned(),
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
            grace,
            descriptor: None,
            torn_down: false,
        })
    }

    /// Reports whether [`PluginHandle::teardown`] has run.
    #[must_use]
    pub const fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Sends one message and reads its reply.
    fn call(&mut self, message: &HostMessage) -> Result<PluginReply, PluginError> {
        self.send(message)?;
        let reply = self.receive(message.op())?;
        match reply {
            PluginReply::Error { message: text } => Err(PluginError::Remote {
                name: self.name.clone(),
                message: text,
            }),
            other => Ok(other),
        }
    }

    fn send(&mut self, message: &HostMessage) -> Result<(), PluginError> {
        let name = self.name.as_str();
        let stdin = match (self.torn_down, self.stdin.as_mut()) {
            (false, Some(stdin)) => stdin,
            _ => {
                return Err(PluginError::TornDown {
                    name: name.to_owned(),
                });
            }
        };
        let json = serde_json::to_string(message).map_err(PluginError::SerializeMessage)?;

        debug!(
            target: PROCESS_TARGET,
            plugin = name,
            op = message.op(),
            message_bytes = json.len(),
            "writing message to plugin stdin"
        );

        stdin
            .write_all(json.as_bytes())
            .and_then(|()| stdin.write_all(b"\n"))
            .and_then(|()| stdin.flush())
            .map_err(|err| PluginError::io(name, err))
    }

    fn receive(&mut self, op: &str) -> Result<PluginReply, PluginError> {
        let mut line = String::new();
        let bytes_read = self
            .stdout
            .read_line(&mut line)
            .map_err(|err| PluginError::io(&self.name, err))?;

        if bytes_read == 0 {
            return Err(PluginError::InvalidOutput {
                name: self.name.clone(),
                message: format!("plugin closed stdout before answering '{op}'"),
            });
        }

        serde_json::from_str(line.trim()).map_err(|err| PluginError::DeserializeReply {
            name: self.name.clone(),
            message: format!("invalid reply to '{op}': {err}"),
            source: Some(err),
        })
    }

    fn unexpected(&self, op: &str, reply: &PluginReply) -> PluginError {
        PluginError::InvalidOutput {
            name: self.name.clone(),
            message: format!("expected a reply to '{op}', got '{}'", reply.kind()),
        }
    }

    /// Waits up to the grace period for the child to exit, then kills it.
    fn terminate_child(&mut self) {
        let deadline = Instant::now() + self.grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(
                        target: PROCESS_TARGET,
                        plugin = %self.name,
                        ?status,
                        "plugin process exited"
                    );
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL_INTERVAL),
                Ok(None) => {
                    warn!(
                        target: PROCESS_TARGET,
                        plugin = %self.name,
                        grace_ms = u64::try_from(self.grace.as_millis()).unwrap_or(u64::MAX),
                        "plugin did not exit after shutdown, killing process"
                    );
                    break;
                }
                Err(err) => {
                    warn!(
                        target: PROCESS_TARGET,
                        plugin = %self.name,
                        error = %err,
                        "failed to check plugin process status, killing process"
                    );
                    break;
                }
            }
        }
        drop(self.child.kill());
        drop(self.child.wait());
    }
}

impl PluginHandle for ProcessPluginHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&mut self, context: &Context) -> ExecutionDecision {
        let message = HostMessage::Decide {
            context: context.clone(),
        };
        match self.call(&message) {
            Ok(PluginReply::Decision { decision }) => decision,
            Ok(other) => ExecutionDecision::decline(self.unexpected("decide", &other).to_string()),
            Err(err) => {
                debug!(
                    target: PROCESS_TARGET,
                    plugin = %self.name,
                    error = %err,
                    "decide failed, treating as declined"
                );
                ExecutionDecision::decline(err.to_string())
            }
        }
    }

    fn process(&mut self, context: &Context) -> Result<Context, PluginError> {
        let message = HostMessage::Process {
            context: context.clone(),
        };
        match self.call(&message)? {
            PluginReply::Context { context: processed } => Ok(processed),
            other => Err(self.unexpected("process", &other)),
        }
    }

    fn describe(&mut self) -> PluginDescriptor {
        if let Some(descriptor) = &self.descriptor {
            return descriptor.clone();
        }
        let outcome = self.call(&HostMessage::Describe).and_then(|reply| match reply {
            PluginReply::Descriptor { descriptor } => Ok(descriptor),
            other => Err(self.unexpected("describe", &other)),
        });
        if let Ok(descriptor) = &outcome {
            self.descriptor = Some(descriptor.clone());
        }
        outcome.unwrap_or_else(|err| {
            warn!(
                target: PROCESS_TARGET,
                plugin = %self.name,
                error = %err,
                "describe failed, using fallback descriptor"
            );
            PluginDescriptor::unavailable()
        })
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        if let Err(err) = self.send(&HostMessage::Shutdown) {
            debug!(
                target: PROCESS_TARGET,
                plugin = %self.name,
                error = %err,
                "could not deliver shutdown request"
            );
        }
        self.torn_down = true;
        // Closing stdin lets plugins that only watch for EOF exit too.
        drop(self.stdin.take());
        self.terminate_child();
        debug!(target: PROCESS_TARGET, plugin = %self.name, "plugin torn down");
    }
}

impl Drop for ProcessPluginHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(all(test, unix))]
mod tests;
