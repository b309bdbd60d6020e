// file: src/utils/template.rs
// description: signing payload template with a single substitution placeholder
// reference: template validation happens at parse time, rendering cannot fail

use crate::error::{PipelineError, Result};

const PLACEHOLDER: &str = "{}";

/// A payload template such as `trade_no={}&version=1.0`. The placeholder is
/// located once at parse time; rendering is a plain concatenation.
#[derive(Debug, Clone)]
pub struct RowTemplate {
    prefix: String,
    suffix: String,
}

impl RowTemplate {
    /// Parses a template string containing exactly one `{}` placeholder.
    pub fn parse(template: &str) -> Result<Self> {
        let count = template.matches(PLACEHOLDER).count();
        if count != 1 {
            return Err(PipelineError::Template(format!(
                "template must contain exactly one {{}} placeholder, found {}: {:?}",
                count, template
            )));
        }

        let (prefix, suffix) = template.split_once(PLACEHOLDER).ok_or_else(|| {
            PipelineError::Template(format!("malformed template: {:?}", template))
        })?;

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Substitutes `value` into the placeholder position.
    pub fn render(&self, value: &str) -> String {
        let mut rendered =
            String::with_capacity(self.prefix.len() + value.len() + self.suffix.len());
        rendered.push_str(&self.prefix);
        rendered.push_str(value);
        rendered.push_str(&self.suffix);
        rendered
    }
}
