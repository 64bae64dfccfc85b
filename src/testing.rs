//! Log capture for tests. The logger is process-wide, so assertions should
//! look for a line unique to the test rather than count lines.

use std::sync::{Mutex, OnceLock};

static LOG_LINES: OnceLock<Mutex<Vec<String>>> = OnceLock::new();
static LOGGER: CaptureLogger = CaptureLogger;

fn log_buffer() -> &'static Mutex<Vec<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(Vec::new()))
}

struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if let Ok(mut buf) = log_buffer().lock() {
            buf.push(format!("[{}] {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

/// Installs the capture logger. Safe to call from every test.
pub fn capture_logs() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Debug);
    }
}

pub fn logged_lines() -> Vec<String> {
    log_buffer().lock().map(|buf| buf.clone()).unwrap_or_default()
}

/// Polls the captured log until a line contains every fragment.
pub async fn wait_for_log(fragments: &[&str]) -> Option<String> {
    for _ in 0..250 {
        let found = logged_lines()
            .into_iter()
            .find(|line| fragments.iter().all(|f| line.contains(f)));
        if found.is_some() {
            return found;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    None
}
