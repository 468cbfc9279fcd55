//! Utility functions for file handling and common operations

use crate::{SiteBreakError, SiteBreakResult};
use std::fs::File;
use std::path::Path;

/// Get the number of CPU cores, with a fallback default
pub fn get_num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Validate file paths and check if they exist
pub fn validate_file_exists<P: AsRef<Path>>(path: P) -> SiteBreakResult<()> {
    if !path.as_ref().exists() {
        return Err(SiteBreakError::FileNotFound(
            path.as_ref().to_string_lossy().to_string(),
        ));
    }
    Ok(())
}

/// Validate that a file is readable
pub fn validate_file_readable<P: AsRef<Path>>(path: P) -> SiteBreakResult<()> {
    validate_file_exists(&path)?;

    File::open(&path)
        .map_err(|_| SiteBreakError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    Ok(())
}

/// Timer utility for measuring execution time
pub struct Timer {
    start: std::time::Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::info!("Starting timer: {}", name);
        Timer {
            start: std::time::Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    pub fn log_elapsed(&self) {
        let duration = self.elapsed();
        log::info!("Timer '{}' elapsed: {:.2?}", self.name, duration);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.log_elapsed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_get_num_cpus() {
        let num_cpus = get_num_cpus();
        assert!(num_cpus >= 1);
    }

    #[test]
    fn test_validate_file_exists() {
        let temp_file = NamedTempFile::new().unwrap();
        assert!(validate_file_exists(temp_file.path()).is_ok());

        assert!(validate_file_exists("/nonexistent/file").is_err());
    }

    #[test]
    fn test_validate_file_readable() {
        let temp_file = NamedTempFile::new().unwrap();
        assert!(validate_file_readable(temp_file.path()).is_ok());

        assert!(validate_file_readable("/nonexistent/file").is_err());
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new("test");
        std::thread::sleep(std::time::Duration::from_millis(1));
        assert!(timer.elapsed().as_millis() >= 1);
    }
}
