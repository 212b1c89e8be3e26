//! Output assembly: render every artifact in memory, then write them all
//!
//! Nothing reaches the output directory unless every interface of the run
//! rendered. Each file goes to a hidden temporary sibling first and is
//! renamed into place once all temporaries exist.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::c_header::{generate_stub_header, header_file_name};
use super::c_server_stubs::CServerStubGenerator;
use super::{base_name, to_snake, CodegenError, GeneratorConfig};
use crate::ast::InterfaceFile;
use crate::error::{GenError, IntegrityError, Location};
use crate::semantic::{InterfacePlan, SemanticAnalyzer};

/// One rendered file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: String,
}

/// Header and source rendered for one interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPair {
    pub interface: String,
    pub header: Artifact,
    pub source: Artifact,
}

impl ArtifactPair {
    pub fn artifacts(&self) -> [&Artifact; 2] {
        [&self.header, &self.source]
    }
}

/// Parse an interface model from JSON text
pub fn parse_model(text: &str) -> Result<InterfaceFile, GenError> {
    Ok(serde_json::from_str(text)?)
}

/// Read and parse an interface model file
pub fn load_model(path: &Path) -> Result<InterfaceFile, GenError> {
    let text = fs::read_to_string(path)?;
    parse_model(&text)
}

/// Render header and source for one analyzed interface
pub fn render_interface(
    plan: &InterfacePlan,
    generator: &CServerStubGenerator,
) -> Result<ArtifactPair, CodegenError> {
    let header = generate_stub_header(plan, generator.accessor())?;
    let source = generator.generate(plan)?;
    Ok(ArtifactPair {
        interface: plan.name.clone(),
        header: Artifact {
            file_name: header_file_name(plan),
            contents: header,
        },
        source: Artifact {
            file_name: format!("{}_stub.c", to_snake(base_name(&plan.name))),
            contents: source,
        },
    })
}

/// Ordinals must still equal positions after analysis
fn check_ordinals(plan: &InterfacePlan) -> Result<(), IntegrityError> {
    for (position, method) in plan.methods.iter().enumerate() {
        if method.ordinal as usize != position {
            return Err(IntegrityError::OrdinalMismatch {
                at: Location::interface(&plan.name).method(&method.name),
                expected: position as u32,
                found: method.ordinal,
            });
        }
    }
    Ok(())
}

/// Analyze and render every interface in a model
pub fn generate_file(
    file: &InterfaceFile,
    config: &GeneratorConfig,
) -> Result<Vec<ArtifactPair>, GenError> {
    let analyzer = SemanticAnalyzer::new();
    let generator = CServerStubGenerator::new(config.clone());
    let plans = analyzer.analyze_file(file)?;

    let mut pairs = Vec::with_capacity(plans.len());
    for plan in &plans {
        check_ordinals(plan)?;
        pairs.push(render_interface(plan, &generator)?);
        tracing::info!(
            package = %file.package,
            interface = %plan.name,
            methods = plan.methods.len(),
            mode = %config.mode,
            "rendered stub"
        );
    }
    Ok(pairs)
}

/// Two interfaces in one run may not render to the same file
pub fn check_unique_names(pairs: &[ArtifactPair]) -> Result<(), GenError> {
    let mut seen = BTreeSet::new();
    for pair in pairs {
        for artifact in pair.artifacts() {
            if !seen.insert(artifact.file_name.as_str()) {
                return Err(IntegrityError::DuplicateInterface {
                    at: Location::interface(&pair.interface),
                }
                .into());
            }
        }
    }
    Ok(())
}

fn temp_path(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(format!(".{}.tmp", file_name))
}

fn backup_path(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(format!(".{}.bak", file_name))
}

/// A target renamed into place, with the file it replaced
struct Committed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

/// Write all artifacts, or none of them
///
/// Existing files are moved aside before being replaced. If any rename
/// fails, targets already written are removed and their previous contents
/// put back.
pub fn write_artifacts(pairs: &[ArtifactPair], dir: &Path) -> Result<Vec<PathBuf>, GenError> {
    check_unique_names(pairs)?;
    fs::create_dir_all(dir)?;

    let artifacts: Vec<&Artifact> = pairs.iter().flat_map(|p| p.artifacts()).collect();
    let mut temps = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        let temp = temp_path(dir, &artifact.file_name);
        if let Err(err) = fs::write(&temp, &artifact.contents) {
            discard(&temps);
            let _ = fs::remove_file(&temp);
            return Err(err.into());
        }
        temps.push(temp);
    }

    let mut committed: Vec<Committed> = Vec::with_capacity(artifacts.len());
    for (index, artifact) in artifacts.iter().enumerate() {
        match commit(&temps[index], dir, &artifact.file_name) {
            Ok(entry) => {
                tracing::debug!(path = %entry.target.display(), "wrote artifact");
                committed.push(entry);
            }
            Err(err) => {
                discard(&temps[index..]);
                roll_back(&committed);
                return Err(err.into());
            }
        }
    }

    let mut written = Vec::with_capacity(committed.len());
    for entry in committed {
        if let Some(backup) = &entry.backup {
            if let Err(err) = fs::remove_file(backup) {
                tracing::warn!(path = %backup.display(), error = %err, "could not remove backup file");
            }
        }
        written.push(entry.target);
    }
    Ok(written)
}

/// Move any existing regular file aside, then rename the temporary into place
fn commit(temp: &Path, dir: &Path, file_name: &str) -> std::io::Result<Committed> {
    let target = dir.join(file_name);
    let replaces_file = fs::symlink_metadata(&target)
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    let backup = if replaces_file {
        let backup = backup_path(dir, file_name);
        fs::rename(&target, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(err) = fs::rename(temp, &target) {
        if let Some(backup) = &backup {
            restore(backup, &target);
        }
        return Err(err);
    }
    Ok(Committed { target, backup })
}

fn roll_back(committed: &[Committed]) {
    for entry in committed.iter().rev() {
        if let Err(err) = fs::remove_file(&entry.target) {
            tracing::warn!(path = %entry.target.display(), error = %err, "could not remove written file");
        }
        if let Some(backup) = &entry.backup {
            restore(backup, &entry.target);
        }
    }
}

fn restore(backup: &Path, target: &Path) {
    if let Err(err) = fs::rename(backup, target) {
        tracing::warn!(
            backup = %backup.display(),
            path = %target.display(),
            error = %err,
            "could not restore previous file"
        );
    }
}

fn discard(temps: &[PathBuf]) {
    for temp in temps {
        if let Err(err) = fs::remove_file(temp) {
            tracing::warn!(path = %temp.display(), error = %err, "could not remove temporary file");
        }
    }
}
