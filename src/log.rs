//! Run data logs with rotation.
//!
//! Each run writes plain-text data streams (agent data, structure data)
//! into its output directory. Files are rotated to a timestamped backup
//! once they exceed a configurable line limit.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

/// Default maximum number of lines before rotation.
pub const DEFAULT_MAX_LINES: usize = 10_000;

/// Stream holding one line per agent per tick.
pub const ROBOT_DATA: &str = "robot_data";
/// Stream holding one line per beam per tick.
pub const STRUCTURE_DATA: &str = "structure";

/// Append-only writer for one data stream.
pub struct DataLogger {
    /// Path to the data file.
    pub path: PathBuf,
    /// Maximum lines before rotation.
    pub max_lines: usize,
    /// Who produced the stream, written into every line.
    pub source: String,
}

impl DataLogger {
    /// Create a logger for `stream` inside `dir`.
    pub fn new(dir: &Path, stream: &str, source: &str) -> Self {
        Self {
            path: data_file_path(dir, stream),
            max_lines: DEFAULT_MAX_LINES,
            source: source.to_string(),
        }
    }

    /// Create a logger with a custom max lines setting.
    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Write one entry.
    ///
    /// Format: `YYYY-MM-DD HH:MM:SS | <source> | <message>`
    pub fn log(&self, message: &str) -> io::Result<()> {
        self.ensure_dir()?;

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("{} | {} | {}\n", timestamp, self.source, message);

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        self.rotate_if_needed()
    }

    /// Write a separator marking the start of a run.
    pub fn log_session_start(&self, run: &str) -> io::Result<()> {
        self.ensure_dir()?;

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let separator = format!(
            "\n======================================================================\n\
             === {} ({}) - Run Started at {} ===\n\
             ======================================================================\n\n",
            self.source, run, timestamp
        );

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(separator.as_bytes())?;
        file.flush()
    }

    fn ensure_dir(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn rotate_if_needed(&self) -> io::Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        if count_lines(&self.path)? <= self.max_lines {
            return Ok(());
        }
        rotate_log(&self.path)
    }

    /// Current number of lines in the data file.
    pub fn line_count(&self) -> io::Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        count_lines(&self.path)
    }

    /// Read the last `n` lines.
    pub fn read_recent(&self, n: usize) -> io::Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let lines: Vec<String> = reader.lines().collect::<io::Result<_>>()?;
        let start = lines.len().saturating_sub(n);
        Ok(lines[start..].to_vec())
    }
}

/// Path of a data stream inside a run directory.
pub fn data_file_path(dir: &Path, stream: &str) -> PathBuf {
    dir.join(format!("{}.log", stream))
}

/// Count lines in a file.
pub fn count_lines(path: &Path) -> io::Result<usize> {
    let reader = BufReader::new(File::open(path)?);
    Ok(reader.lines().count())
}

/// Move a data file to a timestamped backup and start it afresh.
pub fn rotate_log(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let backup_name = format!(
        "{}.{}.bak",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("data"),
        timestamp
    );
    fs::rename(path, path.with_file_name(backup_name))?;
    File::create(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backups(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.to_string_lossy().ends_with(".bak"))
            .collect()
    }

    #[test]
    fn test_data_file_path() {
        let dir = Path::new("/tmp/runs/1");
        assert_eq!(data_file_path(dir, ROBOT_DATA), PathBuf::from("/tmp/runs/1/robot_data.log"));
    }

    #[test]
    fn test_log_line_format() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(dir.path(), ROBOT_DATA, "Aaron");

        logger.log("location=[1, 1, 0]").unwrap();
        logger.log("beams=1").unwrap();

        let content = fs::read_to_string(&logger.path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert!(line.contains(" | Aaron | "));
        }
        assert!(lines[1].ends_with("beams=1"));
    }

    #[test]
    fn test_session_start_separator() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(dir.path(), STRUCTURE_DATA, "structure");
        logger.log_session_start("run-42").unwrap();

        let content = fs::read_to_string(&logger.path).unwrap();
        assert!(content.contains("======"));
        assert!(content.contains("run-42"));
        assert!(content.contains("Run Started"));
    }

    #[test]
    fn test_rotation() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(dir.path(), ROBOT_DATA, "swarm").with_max_lines(5);
        for i in 0..10 {
            logger.log(&format!("tick {}", i)).unwrap();
        }
        assert!(logger.line_count().unwrap() <= 5);
        assert!(!backups(dir.path()).is_empty());
    }

    #[test]
    fn test_rotate_log_keeps_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.log");
        fs::write(&path, "a\nb\nc\n").unwrap();
        rotate_log(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        let saved = backups(dir.path());
        assert_eq!(saved.len(), 1);
        assert_eq!(fs::read_to_string(&saved[0]).unwrap(), "a\nb\nc\n");

        rotate_log(&dir.path().join("missing.log")).unwrap();
    }

    #[test]
    fn test_read_recent() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(dir.path(), ROBOT_DATA, "swarm");
        assert!(logger.read_recent(3).unwrap().is_empty());

        for i in 0..10 {
            logger.log(&format!("Message {}", i)).unwrap();
        }
        let recent = logger.read_recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].contains("Message 7"));
        assert!(recent[2].contains("Message 9"));
    }

    #[test]
    fn test_logger_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("runs").join("7");
        let logger = DataLogger::new(&nested, STRUCTURE_DATA, "structure");
        logger.log("B0 [0, 0, 0] [0, 0, 1]").unwrap();
        assert!(logger.path.exists());
    }
}
