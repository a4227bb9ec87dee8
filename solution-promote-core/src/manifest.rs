//! Dependency manifests: `name==version` entries from a `package.json`
//! (`models` + `dev_exchange_packages`) or from a comma-separated string.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PromoteError, Result};
use crate::version::ArtifactVersion;

/// Package name -> version, in declaration order. Names are unique; a later
/// insert replaces the version but keeps the first position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyManifest {
    entries: IndexMap<String, ArtifactVersion>,
}

impl DependencyManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, version: ArtifactVersion) -> Option<ArtifactVersion> {
        self.entries.insert(name.into(), version)
    }

    pub fn get(&self, name: &str) -> Option<&ArtifactVersion> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArtifactVersion)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Builds the manifest declared by a `package.json`. A package without a
    /// `dependencies` section has no dependencies.
    pub fn from_package_json(package: &PackageJson) -> Result<Self> {
        match &package.dependencies {
            Some(deps) => parse_manifest(&deps.models, &deps.dev_exchange_packages),
            None => Ok(Self::new()),
        }
    }
}

impl<'a> IntoIterator for &'a DependencyManifest {
    type Item = (&'a String, &'a ArtifactVersion);
    type IntoIter = indexmap::map::Iter<'a, String, ArtifactVersion>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Splits `name==version` on the first `==` and trims both sides.
pub fn parse_entry(entry: &str) -> Result<(String, ArtifactVersion)> {
    let (name, version) = entry.split_once("==").ok_or_else(|| {
        PromoteError::Format(format!("dependency entry '{entry}' is missing '=='"))
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(PromoteError::Format(format!(
            "dependency entry '{entry}' has an empty name"
        )));
    }
    Ok((name.to_string(), ArtifactVersion::parse(version.trim())?))
}

/// Merges dev packages and models; a model overrides a dev package with the
/// same name.
pub fn parse_manifest<M, D>(models: &[M], dev_packages: &[D]) -> Result<DependencyManifest>
where
    M: AsRef<str>,
    D: AsRef<str>,
{
    let mut manifest = DependencyManifest::new();
    for entry in dev_packages {
        let (name, version) = parse_entry(entry.as_ref())?;
        manifest.insert(name, version);
    }
    let dev_names: Vec<String> = manifest.entries.keys().cloned().collect();
    for entry in models {
        let (name, version) = parse_entry(entry.as_ref())?;
        if dev_names.contains(&name) {
            warn!(package = %name, model_version = %version, "Model entry overrides dev package with the same name");
        }
        manifest.insert(name, version);
    }
    debug!(count = manifest.len(), "Parsed dependency manifest");
    Ok(manifest)
}

/// Parses `name==version,name==version,...`. Blank input is an empty manifest.
pub fn parse_manifest_from_csv(raw: &str) -> Result<DependencyManifest> {
    let mut manifest = DependencyManifest::new();
    if raw.trim().is_empty() {
        return Ok(manifest);
    }
    for entry in raw.split(',') {
        let (name, version) = parse_entry(entry.trim())?;
        manifest.insert(name, version);
    }
    Ok(manifest)
}

/// The parts of a solution `package.json` this tool reads. Other fields are
/// kept so the document can be written back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageJson {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<PackageDependencies>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageJson {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// `{name}-{version}.ibsolution`
    pub fn artifact_file_name(&self) -> String {
        artifact_file_name(&self.name, &self.version)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackageDependencies {
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub dev_exchange_packages: Vec<String>,
}

/// Generated `package.json` for a solution builder release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolutionPackage {
    pub name: String,
    pub authors: Vec<String>,
    pub owner: String,
    pub visibility: String,
    pub version: String,
    pub short_description: String,
    pub long_description: String,
    pub solution_type: String,
}

impl SolutionPackage {
    pub fn for_flow_release(solution_name: &str, flow_name: &str, version: &ArtifactVersion) -> Self {
        Self {
            name: solution_name.to_string(),
            authors: vec!["INSTABASE".to_string()],
            owner: "IB_DEPLOYED".to_string(),
            visibility: "PUBLIC".to_string(),
            version: version.to_string(),
            short_description: format!("{flow_name} v{version}"),
            long_description: " ".to_string(),
            solution_type: "ibflowbin".to_string(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

pub fn artifact_file_name(name: &str, version: impl std::fmt::Display) -> String {
    format!("{name}-{version}.ibsolution")
}
