use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::browser::dom::DomElement;
use crate::browser::page::{BrowserLauncher, ElementHandle, LaunchOptions, LivePage};
use crate::error::BrowserError;

pub const DEFAULT_DRIVER_SCRIPT: &str = "driver/browser_server.js";

/// Request sent to browser_server.js over stdin (one JSON line).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BrowserRequest {
    Navigate {
        cmd: &'static str,
        url: String,
        timeout_ms: u64,
    },
    CurrentUrl {
        cmd: &'static str,
    },
    Extract {
        cmd: &'static str,
    },
    WaitAttached {
        cmd: &'static str,
        selector: String,
        timeout_ms: u64,
    },
    Count {
        cmd: &'static str,
        selector: String,
    },
    Element {
        cmd: &'static str,
        selector: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Quit {
        cmd: &'static str,
    },
}

impl BrowserRequest {
    pub fn navigate(url: &str, timeout: Duration) -> Self {
        BrowserRequest::Navigate {
            cmd: "navigate",
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn current_url() -> Self {
        BrowserRequest::CurrentUrl { cmd: "current_url" }
    }

    pub fn extract() -> Self {
        BrowserRequest::Extract { cmd: "extract" }
    }

    pub fn wait_attached(selector: &str, timeout: Duration) -> Self {
        BrowserRequest::WaitAttached {
            cmd: "wait_attached",
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn count(selector: &str) -> Self {
        BrowserRequest::Count {
            cmd: "count",
            selector: selector.to_string(),
        }
    }

    pub fn inner_text(handle: &ElementHandle) -> Self {
        Self::element("inner_text", handle, None)
    }

    pub fn click(handle: &ElementHandle) -> Self {
        Self::element("click", handle, None)
    }

    pub fn fill(handle: &ElementHandle, value: &str) -> Self {
        Self::element("fill", handle, Some(value.to_string()))
    }

    fn element(cmd: &'static str, handle: &ElementHandle, value: Option<String>) -> Self {
        BrowserRequest::Element {
            cmd,
            selector: handle.selector.clone(),
            index: handle.index,
            value,
        }
    }

    pub fn quit() -> Self {
        BrowserRequest::Quit { cmd: "quit" }
    }
}

/// Response received from browser_server.js over stdout (one JSON line).
#[derive(Debug, Deserialize)]
pub struct BrowserResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ready: Option<bool>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub found: Option<bool>,
    #[serde(default)]
    pub count: Option<u32>,
}

/// A browser session backed by a long-lived browser_server.js process.
///
/// Commands are sent as NDJSON over stdin, responses read from stdout. The
/// process is shut down on `close` or, failing that, on drop.
pub struct BrowserSession {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    load_timeout: Duration,
    closed: bool,
}

impl BrowserSession {
    /// Spawn the driver script and wait for its ready signal.
    pub fn launch(script: &Path, options: &LaunchOptions) -> Result<Self, BrowserError> {
        let mut command = Command::new("node");
        command.arg(script);
        command.arg(if options.headless { "--headless" } else { "--headed" });
        if let Some(state) = &options.storage_state {
            command.arg("--storage-state").arg(state);
        }

        let session = Self::spawn(command, &script.display().to_string(), options.load_timeout)?;
        debug!(headless = options.headless, "browser session ready");
        Ok(session)
    }

    /// Spawn `command` as a driver process and complete the ready handshake.
    ///
    /// The process is killed and reaped if the handshake fails.
    pub fn spawn(
        mut command: Command,
        script_name: &str,
        load_timeout: Duration,
    ) -> Result<Self, BrowserError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| BrowserError::Spawn {
                script: script_name.to_string(),
                source: e,
            })?;

        match Self::handshake(&mut child, script_name) {
            Ok((stdin, reader)) => {
                debug!(script = %script_name, "driver signalled ready");
                Ok(BrowserSession {
                    child,
                    stdin,
                    reader,
                    load_timeout,
                    closed: false,
                })
            }
            Err(e) => {
                let _ = child.kill();
                if let Err(reap) = child.wait() {
                    warn!(script = %script_name, error = %reap, "failed to reap browser driver");
                }
                Err(e)
            }
        }
    }

    fn handshake(
        child: &mut Child,
        script_name: &str,
    ) -> Result<(ChildStdin, BufReader<ChildStdout>), BrowserError> {
        let stdin = child.stdin.take().ok_or_else(|| {
            BrowserError::SessionIO(format!("failed to capture stdin of {}", script_name))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            BrowserError::SessionIO(format!("failed to capture stdout of {}", script_name))
        })?;

        let mut reader = BufReader::new(stdout);

        let mut line = String::new();
        reader
            .read_line(&mut line)
            .map_err(|e| BrowserError::SessionIO(format!("failed to read ready signal: {}", e)))?;

        let response: BrowserResponse =
            serde_json::from_str(line.trim()).map_err(|e| BrowserError::JsonParse {
                context: "driver ready signal".into(),
                source: e,
            })?;

        if !response.ok || response.ready != Some(true) {
            return Err(BrowserError::Protocol {
                command: "launch".into(),
                error: response
                    .error
                    .unwrap_or_else(|| "driver did not signal ready".into()),
            });
        }

        Ok((stdin, reader))
    }

    fn send(&mut self, request: &BrowserRequest) -> Result<BrowserResponse, BrowserError> {
        if self.closed {
            return Err(BrowserError::SessionIO("session already closed".into()));
        }

        let json = serde_json::to_string(request).map_err(|e| BrowserError::JsonSerialize {
            context: "BrowserRequest".into(),
            source: e,
        })?;

        writeln!(self.stdin, "{}", json)
            .and_then(|_| self.stdin.flush())
            .map_err(|e| BrowserError::SessionIO(format!("failed to write to driver: {}", e)))?;

        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .map_err(|e| BrowserError::SessionIO(format!("failed to read from driver: {}", e)))?;

        if line.trim().is_empty() {
            return Err(BrowserError::SessionIO(
                "empty response from driver (process may have died)".into(),
            ));
        }

        serde_json::from_str(line.trim()).map_err(|e| BrowserError::JsonParse {
            context: "driver response".into(),
            source: e,
        })
    }

    fn send_ok(
        &mut self,
        request: &BrowserRequest,
        command_name: &str,
    ) -> Result<BrowserResponse, BrowserError> {
        let response = self.send(request)?;
        if !response.ok {
            return Err(BrowserError::Protocol {
                command: command_name.into(),
                error: response.error.unwrap_or_else(|| "unknown error".into()),
            });
        }
        Ok(response)
    }
}

impl LivePage for BrowserSession {
    fn navigate(&mut self, url: &str) -> Result<String, BrowserError> {
        let request = BrowserRequest::navigate(url, self.load_timeout);
        let response = self.send_ok(&request, "navigate")?;
        Ok(response.url.unwrap_or_else(|| url.to_string()))
    }

    fn current_url(&mut self) -> Result<String, BrowserError> {
        let response = self.send_ok(&BrowserRequest::current_url(), "current_url")?;
        response.url.ok_or_else(|| BrowserError::Protocol {
            command: "current_url".into(),
            error: "no url in response".into(),
        })
    }

    fn wait_attached(&mut self, selector: &str, timeout: Duration) -> Result<bool, BrowserError> {
        let request = BrowserRequest::wait_attached(selector, timeout);
        let response = self.send_ok(&request, "wait_attached")?;
        Ok(response.found.unwrap_or(false))
    }

    fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, BrowserError> {
        let response = self.send_ok(&BrowserRequest::count(selector), "count")?;
        let count = response.count.unwrap_or(0) as usize;
        Ok((0..count).map(|i| ElementHandle::nth(selector, i)).collect())
    }

    fn inner_text(&mut self, handle: &ElementHandle) -> Result<String, BrowserError> {
        let response = self.send_ok(&BrowserRequest::inner_text(handle), "inner_text")?;
        Ok(response.text.unwrap_or_default())
    }

    fn click(&mut self, handle: &ElementHandle) -> Result<(), BrowserError> {
        self.send_ok(&BrowserRequest::click(handle), "click")?;
        Ok(())
    }

    fn fill(&mut self, handle: &ElementHandle, value: &str) -> Result<(), BrowserError> {
        self.send_ok(&BrowserRequest::fill(handle, value), "fill")?;
        Ok(())
    }

    fn extract(&mut self) -> Result<Vec<DomElement>, BrowserError> {
        let response = self.send_ok(&BrowserRequest::extract(), "extract")?;
        let data = response.data.ok_or_else(|| BrowserError::Protocol {
            command: "extract".into(),
            error: "no data in extract response".into(),
        })?;
        serde_json::from_value(data).map_err(|e| BrowserError::JsonParse {
            context: "extract payload".into(),
            source: e,
        })
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        // Best effort: the process may already be gone.
        let _ = self.send(&BrowserRequest::quit());
        self.closed = true;
        if let Err(e) = self.child.wait() {
            warn!(error = %e, "failed to reap browser driver");
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Launches `BrowserSession`s from a configured driver script.
#[derive(Debug, Clone)]
pub struct NodeLauncher {
    pub script: PathBuf,
}

impl NodeLauncher {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl Default for NodeLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_DRIVER_SCRIPT)
    }
}

impl BrowserLauncher for NodeLauncher {
    fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn LivePage>, BrowserError> {
        Ok(Box::new(BrowserSession::launch(&self.script, options)?))
    }
}
