//! The job manifest: which files to import, with which layout, into which
//! entity. The orchestrator walks this; the core only loads and validates it.

use crate::error::{ErrorKind, Result};
use failure::ResultExt;
use serde::Deserialize;
use std::convert::TryFrom;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub jobs: Vec<ImportJob>,
}

impl Manifest {
    pub fn from_yaml(text: &str) -> Result<Manifest> {
        let manifest: Manifest =
            serde_yaml::from_str(text).map_err(|err| ErrorKind::Yaml(err.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Manifest> {
        let manifest: Manifest =
            serde_yaml::from_reader(rdr).map_err(|err| ErrorKind::Yaml(err.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Manifest> {
        let file = File::open(path).with_context(|err| ErrorKind::Io(err.kind()))?;
        Manifest::from_reader(file)
    }

    pub fn validate(&self) -> Result<()> {
        for job in &self.jobs {
            job.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub name: String,
    pub input_glob: String,
    pub layout_file: String,
    pub mode: ImportMode,
    /// Registry name of the destination entity; the parent entity in graph
    /// mode.
    pub entity: String,
    #[serde(default)]
    pub source_system: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
}

impl ImportJob {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ErrorKind::BadManifest("job with an empty name".to_string()).into());
        }
        let bad = |reason: &str| -> crate::error::Error {
            ErrorKind::BadManifest(format!("job `{}`: {}", self.name, reason)).into()
        };
        if self.input_glob.is_empty() {
            return Err(bad("no input glob"));
        }
        if self.layout_file.is_empty() {
            return Err(bad("no layout file"));
        }
        if self.entity.is_empty() {
            return Err(bad("no entity"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ImportMode {
    /// One line, one flat record.
    Single,
    /// One line, one parent plus repeating children.
    Graph,
}

impl FromStr for ImportMode {
    type Err = crate::error::Error;
    fn from_str(value: &str) -> Result<ImportMode> {
        match value.to_ascii_lowercase().as_str() {
            "single" => Ok(ImportMode::Single),
            "graph" => Ok(ImportMode::Graph),
            _ => Err(ErrorKind::BadManifest(format!("unknown mode `{}`", value)).into()),
        }
    }
}

impl TryFrom<String> for ImportMode {
    type Error = crate::error::Error;
    fn try_from(value: String) -> Result<ImportMode> {
        value.parse()
    }
}
