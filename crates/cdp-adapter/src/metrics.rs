use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdapterMetricsSnapshot {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub commands: u64,
    pub command_failures: u64,
}

static SESSIONS_OPENED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_CLOSED: AtomicU64 = AtomicU64::new(0);
static COMMANDS: AtomicU64 = AtomicU64::new(0);
static COMMAND_FAILURES: AtomicU64 = AtomicU64::new(0);

pub fn record_session_opened() {
    SESSIONS_OPENED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_session_closed() {
    SESSIONS_CLOSED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_command<T, E>(result: &Result<T, E>) {
    COMMANDS.fetch_add(1, Ordering::Relaxed);
    if result.is_err() {
        COMMAND_FAILURES.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn snapshot() -> AdapterMetricsSnapshot {
    AdapterMetricsSnapshot {
        sessions_opened: SESSIONS_OPENED.load(Ordering::Relaxed),
        sessions_closed: SESSIONS_CLOSED.load(Ordering::Relaxed),
        commands: COMMANDS.load(Ordering::Relaxed),
        command_failures: COMMAND_FAILURES.load(Ordering::Relaxed),
    }
}
