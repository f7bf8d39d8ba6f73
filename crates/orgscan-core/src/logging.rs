use tracing::{debug, error, info};

/// Progress logger scoped to one named section of work (a dataset run, a
/// recipe, a cache sweep). Emits structured tracing events so the hosting
/// environment's subscriber decides presentation.
#[derive(Debug, Clone)]
pub struct SectionLogger {
    section: String,
}

impl SectionLogger {
    pub fn new(section: impl Into<String>) -> Self {
        let section = section.into();
        debug!(section = %section, "section started");
        Self { section }
    }

    pub fn log(&self, message: &str) {
        debug!(section = %self.section, "{message}");
    }

    pub fn ended(&self, message: &str) {
        info!(section = %self.section, "{message}");
    }

    pub fn failed(&self, err: &dyn std::error::Error) {
        error!(section = %self.section, error = %err, "section failed");
    }
}
