//! Serde model of Jupyter kernel connection files.
//!
//! A connection file is the JSON blob a kernel writes into the runtime
//! directory (`kernel-<id>.json`): transport endpoints for the five channel
//! sockets plus the HMAC signing key. Connecting to those sockets is the
//! job of an external client; this model exists so connection files can be
//! listed, validated, and handed to one.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Contents of a `kernel-*.json` connection file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Transport scheme, normally "tcp"
    pub transport: String,
    /// Bind address, normally "127.0.0.1"
    pub ip: String,
    /// Shell channel port (execute requests)
    pub shell_port: u16,
    /// IOPub channel port (outputs, status)
    pub iopub_port: u16,
    /// Stdin channel port
    pub stdin_port: u16,
    /// Control channel port
    pub control_port: u16,
    /// Heartbeat channel port
    pub hb_port: u16,
    /// HMAC signing key
    pub key: String,
    /// Signing scheme, normally "hmac-sha256"
    pub signature_scheme: String,
    /// Kernel name, when the launcher recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_name: Option<String>,
}

impl ConnectionInfo {
    /// Read and parse a connection file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid
    /// connection JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Endpoint URL for the shell channel.
    #[must_use]
    pub fn shell_url(&self) -> String {
        self.url(self.shell_port)
    }

    /// Endpoint URL for the IOPub channel.
    #[must_use]
    pub fn iopub_url(&self) -> String {
        self.url(self.iopub_port)
    }

    fn url(&self, port: u16) -> String {
        format!("{}://{}:{}", self.transport, self.ip, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "transport": "tcp",
        "ip": "127.0.0.1",
        "shell_port": 53794,
        "iopub_port": 53795,
        "stdin_port": 53796,
        "control_port": 53797,
        "hb_port": 53798,
        "key": "6b2f57e8-assorted-hex",
        "signature_scheme": "hmac-sha256",
        "kernel_name": "python3"
    }"#;

    #[test]
    fn test_parse_connection_file() {
        let info: ConnectionInfo = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(info.transport, "tcp");
        assert_eq!(info.shell_port, 53794);
        assert_eq!(info.kernel_name.as_deref(), Some("python3"));
        assert_eq!(info.shell_url(), "tcp://127.0.0.1:53794");
        assert_eq!(info.iopub_url(), "tcp://127.0.0.1:53795");
    }

    #[test]
    fn test_kernel_name_is_optional() {
        let json = SAMPLE.replace(",\n        \"kernel_name\": \"python3\"", "");
        let info: ConnectionInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info.kernel_name, None);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel-bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(ConnectionInfo::from_file(&path).is_err());
    }
}
