use crate::core::message::{Message, Role};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Optional append-only transcript file. Inactive unless a path was given
/// on the command line; every accepted submission and every settlement is
/// appended in display order.
pub struct LoggingState {
    file_path: Option<String>,
    is_active: bool,
}

impl LoggingState {
    pub fn new(log_file: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut logging = LoggingState {
            file_path: log_file,
            is_active: false,
        };

        // A log file provided at startup enables logging immediately
        if let Some(path) = logging.file_path.clone() {
            logging.test_file_access(&path)?;
            logging.is_active = true;
            logging.write_to_log(&format!(
                "## Session started {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ))?;
        }

        Ok(logging)
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Append a transcript entry, prefixing user lines so the two voices
    /// stay distinguishable in the flat file.
    pub fn log_transcript_message(&self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        match message.role {
            Role::User => self.log_message(&format!("You: {}", message.content)),
            Role::Assistant => self.log_message(&message.content),
        }
    }

    pub fn log_message(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        if !self.is_active || self.file_path.is_none() {
            return Ok(());
        }

        self.write_to_log(content)
    }

    fn write_to_log(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let file_path = self.file_path.as_ref().unwrap();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        let mut writer = BufWriter::new(file);

        // Write each line of content, preserving the exact formatting
        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }

        // Add an empty line after each message for spacing (matching screen display)
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }

    pub fn get_status_string(&self) -> String {
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!(
                "active ({})",
                Path::new(path)
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
            ),
            (Some(path), false) => format!(
                "paused ({})",
                Path::new(path)
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
            ),
        }
    }

    fn test_file_access(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        // Try to create/open the file to ensure we have write permissions
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        // Test write access
        file.flush()?;
        Ok(())
    }
}
