// file: src/utils/validation.rs
// description: data validation utilities and helpers
// reference: input validation patterns

use crate::config::{DEFAULT_INPUT_FILE, FALLBACK_INPUT_FILE};
use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct Validator;

impl Validator {
    /// Resolves the input path. When the configured default is missing, the
    /// legacy fallback name is tried before giving up; an explicitly given
    /// missing path is a hard failure.
    pub fn resolve_input_path(path: &Path) -> Result<PathBuf> {
        if path.exists() {
            return Ok(path.to_path_buf());
        }

        if path == Path::new(DEFAULT_INPUT_FILE) {
            let fallback = Path::new(FALLBACK_INPUT_FILE);
            if fallback.exists() {
                info!(
                    "{} not found, using {} as input",
                    DEFAULT_INPUT_FILE, FALLBACK_INPUT_FILE
                );
                return Ok(fallback.to_path_buf());
            }
        }

        Err(PipelineError::Validation(format!(
            "Input file does not exist: {}",
            path.display()
        )))
    }

    pub fn validate_key_file(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PipelineError::Validation(format!(
                "Key file does not exist: {}",
                path.display()
            )));
        }

        if !path.is_file() {
            return Err(PipelineError::Validation(format!(
                "Key path is not a file: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn truncate_text(text: &str, max_length: usize) -> String {
        if text.len() <= max_length {
            text.to_string()
        } else {
            let mut cut = max_length;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}...", &text[..cut])
        }
    }
}
