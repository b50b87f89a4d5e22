#![allow(unused)]

use spin::Mutex;
use std::{io, sync::Arc};
use tracing_subscriber::fmt::MakeWriter;

/// Captures formatted log output in memory.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    buf: Arc<Mutex<String>>,
}

#[derive(Debug, Clone)]
pub struct CaptureWriter {
    buf: Arc<Mutex<String>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.lock().push_str(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> String {
        self.buf.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.content().lines().map(str::to_string).collect()
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CaptureWriter;
    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buf: self.buf.clone(),
        }
    }
}
