//! Progress display module
//!
//! Handles displaying hashing progress in the CLI.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::hash::Progress;
use crate::verify::{CheckReport, PieceCheck};

/// Format bytes to human readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format speed to human readable string
pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec as u64))
}

/// Format duration to human readable string
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Calculate ETA based on read speed and remaining bytes
pub fn calculate_eta(done: u64, total: u64, speed: f64) -> Option<Duration> {
    if speed <= 0.0 || done >= total {
        return None;
    }

    let remaining = total.saturating_sub(done) as f64;
    Some(Duration::from_secs_f64(remaining / speed))
}

/// Render a 40 column bar for `percent`
fn bar(percent: f64) -> String {
    let bar_width: usize = 40;
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * bar_width as f64) as usize;
    "=".repeat(filled) + &" ".repeat(bar_width - filled)
}

/// Progress display for CLI
pub struct ProgressDisplay {
    start_time: Instant,
    last_update: Option<Instant>,
    update_interval: Duration,
    quiet: bool,
    /// Last known read speed, used by the hash-check line
    speed: f64,
    /// A piece failed to match; the bar turns red
    mismatch: bool,
}

impl ProgressDisplay {
    /// Create a new progress display
    pub fn new(quiet: bool) -> Self {
        Self::with_interval(quiet, Duration::from_millis(100))
    }

    /// Create a progress display with custom update interval
    pub fn with_interval(quiet: bool, interval: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            last_update: None,
            update_interval: interval,
            quiet,
            speed: 0.0,
            mismatch: false,
        }
    }

    fn due(&mut self, force: bool) -> bool {
        if self.quiet {
            return false;
        }
        let due = force
            || self
                .last_update
                .map_or(true, |last| last.elapsed() >= self.update_interval);
        if due {
            self.last_update = Some(Instant::now());
        }
        due
    }

    /// Progress line while making a torrent
    pub fn update(&mut self, progress: &Progress) -> io::Result<()> {
        self.speed = progress.speed();
        if !self.due(progress.percent >= 100.0) {
            return Ok(());
        }

        let eta = calculate_eta(progress.bytes_read, progress.total_size, self.speed)
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string());
        let mut out = io::stdout();
        write!(
            out,
            "\r\x1b[2K[{}] {:6.2}% | {} / {} | {} | ETA: {}",
            bar(progress.percent),
            progress.percent,
            format_bytes(progress.bytes_read),
            format_bytes(progress.total_size),
            format_speed(self.speed),
            eta,
        )?;
        out.flush()
    }

    /// Remember read speed without drawing; hash-check draws per piece
    pub fn record_speed(&mut self, progress: &Progress) {
        self.speed = progress.speed();
    }

    /// Progress line while hash-checking
    pub fn update_check(&mut self, check: &PieceCheck) -> io::Result<()> {
        self.mismatch |= !check.matched;
        if !self.due(check.percent_checked >= 100.0) {
            return Ok(());
        }

        let (color, reset) = if self.mismatch { ("\x1b[31m", "\x1b[0m") } else { ("", "") };
        let mut out = io::stdout();
        write!(
            out,
            "\r\x1b[2K[{}{}{}] {:6.2}% matched | {:6.2}% checked | {}",
            color,
            bar(check.percent_matched),
            reset,
            check.percent_matched,
            check.percent_checked,
            format_speed(self.speed),
        )?;
        out.flush()
    }

    /// Summary after a torrent was written
    pub fn print_made(&self, output: &str, info_hash: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        println!();
        println!("Finished writing torrent at {}", output);
        println!("Info hash: {}", info_hash);
        println!("Time taken: {}", format_duration(self.start_time.elapsed()));
        Ok(())
    }

    /// Summary after a hash check
    pub fn print_checked(&self, report: &CheckReport) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        println!();
        println!("Finished hash checking torrent");
        println!("  Matched: {} / {} pieces ({:.2}%)", report.matched, report.pieces, report.percent());
        if !report.mismatched.is_empty() {
            let shown: Vec<String> = report.mismatched.iter().take(20).map(u32::to_string).collect();
            let more = report.mismatched.len().saturating_sub(shown.len());
            if more > 0 {
                println!("  Mismatched: {} and {} more", shown.join(", "), more);
            } else {
                println!("  Mismatched: {}", shown.join(", "));
            }
        }
        println!("Time taken: {}", format_duration(self.start_time.elapsed()));
        Ok(())
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn saw_mismatch(&self) -> bool {
        self.mismatch
    }
}
