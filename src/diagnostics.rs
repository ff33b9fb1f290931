//! Advisory process diagnostics logged when the watcher starts

use tracing::info;

/// One thread of this process as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub name: String,
    pub state: String,
}

/// Memory usage and thread roster at one point in time.
/// Fields the platform does not expose stay empty.
#[derive(Debug, Clone, Default)]
pub struct ProcessSnapshot {
    /// Resident set size in KiB
    pub resident_kib: Option<u64>,
    /// Peak resident set size in KiB
    pub peak_resident_kib: Option<u64>,
    pub threads: Vec<ThreadInfo>,
}

impl ProcessSnapshot {
    #[cfg(target_os = "linux")]
    pub fn capture() -> Self {
        use std::fs;

        let status = fs::read_to_string("/proc/self/status").unwrap_or_default();
        let threads = fs::read_dir("/proc/self/task")
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|task| {
                        let name = fs::read_to_string(task.path().join("comm"))
                            .map(|s| s.trim().to_string())
                            .unwrap_or_default();
                        let state = fs::read_to_string(task.path().join("status"))
                            .ok()
                            .and_then(|s| status_field(&s, "State:").map(str::to_string))
                            .unwrap_or_default();
                        ThreadInfo { name, state }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            resident_kib: status_kib(&status, "VmRSS:"),
            peak_resident_kib: status_kib(&status, "VmHWM:"),
            threads,
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn capture() -> Self {
        Self::default()
    }

    pub fn log(&self) {
        info!(
            resident_kib = ?self.resident_kib,
            peak_resident_kib = ?self.peak_resident_kib,
            threads = self.threads.len(),
            "Process memory usage"
        );
        for thread in &self.threads {
            info!(name = %thread.name, state = %thread.state, "Thread");
        }
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn status_field<'a>(status: &'a str, key: &str) -> Option<&'a str> {
    status
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .map(str::trim)
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn status_kib(status: &str, key: &str) -> Option<u64> {
    status_field(status, key)?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_fields() {
        let status = "Name:\tsorter\nState:\tS (sleeping)\nVmHWM:\t  20480 kB\nVmRSS:\t  10240 kB\n";
        assert_eq!(status_kib(status, "VmRSS:"), Some(10240));
        assert_eq!(status_kib(status, "VmHWM:"), Some(20480));
        assert_eq!(status_field(status, "State:"), Some("S (sleeping)"));
        assert_eq!(status_kib(status, "VmSwap:"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_capture_sees_current_thread() {
        let snapshot = ProcessSnapshot::capture();
        assert!(snapshot.resident_kib.is_some());
        assert!(!snapshot.threads.is_empty());
    }
}
