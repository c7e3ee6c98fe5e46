use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_FEEDBACK_FILE: &str = "Feedbacks H1.xlsx";
pub const DEFAULT_ROUTES_FILE: &str = "BD_Rutas.xlsx";
pub const DEFAULT_OUTPUT_DIR: &str = "reports";

/// Input spreadsheets: one feedback export plus one or more route files
/// (typically one per month), read in the order given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sources {
    pub feedback: PathBuf,
    pub routes: Vec<PathBuf>,
}

impl Default for Sources {
    fn default() -> Self {
        Sources {
            feedback: PathBuf::from(DEFAULT_FEEDBACK_FILE),
            routes: vec![PathBuf::from(DEFAULT_ROUTES_FILE)],
        }
    }
}

impl Sources {
    pub fn all_paths(&self) -> Vec<&Path> {
        std::iter::once(self.feedback.as_path())
            .chain(self.routes.iter().map(|p| p.as_path()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub sources: Sources,
    pub output_dir: PathBuf,
}

impl Settings {
    pub fn new(feedback: PathBuf, routes: Vec<PathBuf>, output_dir: PathBuf) -> Self {
        let routes = if routes.is_empty() {
            Sources::default().routes
        } else {
            routes
        };
        Settings {
            sources: Sources { feedback, routes },
            output_dir,
        }
    }

    /// Path inside the output directory, creating the directory on demand.
    pub fn output_path(&self, file_name: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(self.output_dir.join(file_name))
    }
}
