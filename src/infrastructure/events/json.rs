//! JSON Event Sink
//!
//! Streams release events as NDJSON for CI/automation consumption.

use std::io::{self, Write};
use std::sync::Mutex;

use crate::domain::ports::{ReleaseEvent, ReleaseEventSink};

/// Event sink that outputs NDJSON events
pub struct JsonEventSink {
    /// Mutex to ensure thread-safe writes
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonEventSink {
    /// Create a new JSON event sink writing to stdout
    pub fn stdout() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Create a JSON event sink writing to a custom writer (for testing)
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    fn write_event(&self, event: serde_json::Value) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", event);
            let _ = writer.flush();
        }
    }
}

impl ReleaseEventSink for JsonEventSink {
    fn on_event(&self, event: ReleaseEvent) {
        let json = match event {
            ReleaseEvent::Staged {
                site,
                deploy,
                is_patch,
                file_count,
            } => {
                serde_json::json!({
                    "event": "staged",
                    "site": site,
                    "deploy": deploy,
                    "is_patch": is_patch,
                    "file_count": file_count,
                })
            }

            ReleaseEvent::Uploaded {
                site,
                deploy,
                adapter,
                destination_ref,
            } => {
                serde_json::json!({
                    "event": "uploaded",
                    "site": site,
                    "deploy": deploy,
                    "adapter": adapter,
                    "destination_ref": destination_ref,
                })
            }

            ReleaseEvent::Activated {
                site,
                deploy,
                target,
                superseded,
            } => {
                serde_json::json!({
                    "event": "activated",
                    "site": site,
                    "deploy": deploy,
                    "target": target,
                    "superseded": superseded,
                })
            }

            ReleaseEvent::ActivationFailed {
                site,
                deploy,
                target,
                error,
            } => {
                serde_json::json!({
                    "event": "activation_failed",
                    "site": site,
                    "deploy": deploy,
                    "target": target,
                    "error": error,
                })
            }

            ReleaseEvent::RolledBack {
                site,
                deploy,
                target,
                superseded,
            } => {
                serde_json::json!({
                    "event": "rolled_back",
                    "site": site,
                    "deploy": deploy,
                    "target": target,
                    "superseded": superseded,
                })
            }

            ReleaseEvent::CleanupRan {
                site,
                adapter,
                removed,
                kept,
            } => {
                serde_json::json!({
                    "event": "cleanup_ran",
                    "site": site,
                    "adapter": adapter,
                    "removed": removed,
                    "kept": kept,
                })
            }
        };

        self.write_event(json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{DeployId, ReleaseTarget, SiteId};
    use std::sync::Arc;

    struct TestWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl TestWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buffer = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    buffer: buffer.clone(),
                },
                buffer,
            )
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn staged_event_is_one_json_line() {
        let (writer, buffer) = TestWriter::new();
        let sink = JsonEventSink::with_writer(writer);

        sink.on_event(ReleaseEvent::Staged {
            site: SiteId::new("docs").unwrap(),
            deploy: DeployId::new("d0").unwrap(),
            is_patch: true,
            file_count: 3,
        });

        let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(output.ends_with('\n'));
        assert!(output.contains("\"event\":\"staged\""));
        assert!(output.contains("\"is_patch\":true"));
        assert!(output.contains("\"file_count\":3"));
    }

    #[test]
    fn activation_failure_carries_error_text() {
        let (writer, buffer) = TestWriter::new();
        let sink = JsonEventSink::with_writer(writer);

        sink.on_event(ReleaseEvent::ActivationFailed {
            site: SiteId::new("docs").unwrap(),
            deploy: DeployId::new("d0").unwrap(),
            target: ReleaseTarget::Production,
            error: "destination timeout".to_string(),
        });

        let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(output.contains("\"event\":\"activation_failed\""));
        assert!(output.contains("\"target\":\"production\""));
        assert!(output.contains("destination timeout"));
    }

    #[test]
    fn events_stream_as_separate_lines() {
        let (writer, buffer) = TestWriter::new();
        let sink = JsonEventSink::with_writer(writer);

        sink.on_event(ReleaseEvent::Uploaded {
            site: SiteId::new("docs").unwrap(),
            deploy: DeployId::new("d0").unwrap(),
            adapter: "memory".to_string(),
            destination_ref: Some("memory://d0".to_string()),
        });
        sink.on_event(ReleaseEvent::CleanupRan {
            site: SiteId::new("docs").unwrap(),
            adapter: "memory".to_string(),
            removed: 2,
            kept: 5,
        });

        let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(output.lines().count(), 2);
    }
}
