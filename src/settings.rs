use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::context::{NFS_FOLDERS_ENV, RSYNC_FOLDERS_ENV, ResolveContext, SSHFS_FOLDERS_ENV};
use crate::error::{Error, Result};
use crate::machine::OsKind;

/// Host-side directory of the built-in enrollment share, relative to the
/// settings file's parent directory.
pub const ENROLLMENT_HOST_DIR: &str = "shared-enrollment";

/// Guest-side mount point of the built-in enrollment share.
pub const ENROLLMENT_GUEST_PATH: &str = "/shared/enrollment";

/// Transport used for a shared folder between host and guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderKind {
    Sshfs,
    Nfs,
    Rsync,
}

impl FolderKind {
    pub const ALL: [FolderKind; 3] = [Self::Sshfs, Self::Nfs, Self::Rsync];

    fn from_key(input: &str) -> Option<Self> {
        match input {
            "sshfs" => Some(Self::Sshfs),
            "nfs" => Some(Self::Nfs),
            "rsync" => Some(Self::Rsync),
            _ => None,
        }
    }

    /// Environment variable carrying the override string for this transport.
    pub fn override_env(&self) -> &'static str {
        match self {
            FolderKind::Sshfs => SSHFS_FOLDERS_ENV,
            FolderKind::Nfs => NFS_FOLDERS_ENV,
            FolderKind::Rsync => RSYNC_FOLDERS_ENV,
        }
    }
}

impl std::fmt::Display for FolderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FolderKind::Sshfs => write!(f, "sshfs"),
            FolderKind::Nfs => write!(f, "nfs"),
            FolderKind::Rsync => write!(f, "rsync"),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct BoxSettings {
    name: Option<String>,
    url: Option<String>,
    memory: Option<u64>,
    cpus: Option<u32>,
}

#[derive(Debug, Clone)]
struct FolderEntry {
    host: String,
    guest: String,
}

/// Loaded settings document with the resolution context layered on top.
///
/// Read-only after load; lookups never touch the process environment.
#[derive(Debug)]
pub struct Settings {
    base_dir: PathBuf,
    boxes: HashMap<String, BoxSettings>,
    folders: HashMap<FolderKind, Vec<FolderEntry>>,
    context: ResolveContext,
    pub warnings: Vec<String>,
}

impl Settings {
    /// Load the settings document at `path`, if any.
    ///
    /// A `None` path always yields an empty document. A missing file yields an
    /// empty document unless the context is strict, in which case it is a
    /// fatal [`Error::SettingsMissing`]. Malformed JSON is always fatal.
    pub fn load(path: Option<&Path>, context: ResolveContext) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::empty(context));
        };

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                if context.strict {
                    return Err(Error::SettingsMissing {
                        path: path.to_path_buf(),
                    });
                }
                return Ok(Self::empty(context));
            }
            Err(source) => {
                return Err(Error::ReadSettings {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let value: Value =
            serde_json::from_str(&contents).map_err(|source| Error::ParseSettings {
                path: path.to_path_buf(),
                source,
            })?;

        let mut warnings = detect_unknown_fields(&value);

        let raw = RawSettings::deserialize(value).map_err(|source| Error::ParseSettings {
            path: path.to_path_buf(),
            source,
        })?;

        let base_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(raw.into_settings(base_dir, context, &mut warnings))
    }

    fn empty(context: ResolveContext) -> Self {
        Self {
            base_dir: PathBuf::from("."),
            boxes: HashMap::new(),
            folders: HashMap::new(),
            context,
            warnings: Vec::new(),
        }
    }

    /// Memory in MB declared for `machine`, 0 when absent.
    pub fn memory(&self, machine: &str) -> u64 {
        self.boxes
            .get(machine)
            .and_then(|settings| settings.memory)
            .unwrap_or(0)
    }

    /// CPU count declared for `machine`, 1 when absent.
    pub fn cpus(&self, machine: &str) -> u32 {
        self.boxes
            .get(machine)
            .and_then(|settings| settings.cpus)
            .unwrap_or(1)
    }

    /// Box image identifier for `machine`. An empty stored value counts as
    /// absent. The OS kind is accepted for interface symmetry only.
    pub fn box_image(&self, _os: OsKind, machine: &str) -> Option<String> {
        self.boxes
            .get(machine)
            .and_then(|settings| settings.name.as_deref())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    /// Box source URL for `machine`, empty stored values counting as absent.
    pub fn box_url(&self, machine: &str) -> Option<String> {
        self.boxes
            .get(machine)
            .and_then(|settings| settings.url.as_deref())
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }

    /// Resolve the host→guest folder map for one transport.
    ///
    /// Merge order is: the built-in enrollment share (sshfs only), document
    /// entries in declaration order, then override pairs from the context,
    /// which replace the guest path of a host already in the map. When the
    /// context is boxes-only the map is empty regardless of transport.
    pub fn folders(&self, kind: FolderKind) -> Result<IndexMap<String, String>> {
        if self.context.boxes_only {
            return Ok(IndexMap::new());
        }

        let mut map = IndexMap::new();

        if kind == FolderKind::Sshfs {
            map.insert(
                self.base_dir.join(ENROLLMENT_HOST_DIR).display().to_string(),
                ENROLLMENT_GUEST_PATH.to_string(),
            );
        }

        if let Some(entries) = self.folders.get(&kind) {
            for entry in entries {
                map.insert(entry.host.clone(), entry.guest.clone());
            }
        }

        if let Some(overrides) = self.context.folder_override(kind) {
            for mount in overrides.split_whitespace() {
                let malformed = || Error::MalformedFolderOverride {
                    variable: kind.override_env().to_string(),
                    entry: mount.to_string(),
                };
                let (host, guest) = mount.split_once(':').ok_or_else(malformed)?;
                if host.is_empty() || guest.is_empty() {
                    return Err(malformed());
                }
                map.insert(host.to_string(), guest.to_string());
            }
        }

        Ok(map)
    }

    /// Context this document was loaded with.
    pub fn context(&self) -> &ResolveContext {
        &self.context
    }
}

/// Resolve the box name used to pin the box under test across runs.
///
/// An environment variable wins and is persisted to `pin_file` for later
/// runs; otherwise a previous pin is reused; otherwise `default`.
pub fn pinned_box_name(default: &str, env_var: &str, pin_file: &Path) -> Result<String> {
    if let Ok(name) = env::var(env_var) {
        fs::write(pin_file, format!("{name}\n")).map_err(|source| Error::WriteBoxPin {
            path: pin_file.to_path_buf(),
            source,
        })?;
        return Ok(name);
    }

    match fs::read_to_string(pin_file) {
        Ok(contents) => Ok(contents.trim_end().to_string()),
        Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(default.to_string()),
        Err(source) => Err(Error::ReadBoxPin {
            path: pin_file.to_path_buf(),
            source,
        }),
    }
}

fn detect_unknown_fields(value: &Value) -> Vec<String> {
    let mut warnings = Vec::new();
    let allowed_root = ["boxes", "folders"];

    if let Value::Object(map) = value {
        for key in map.keys() {
            if !allowed_root.contains(&key.as_str()) {
                warnings.push(format!(
                    "Unknown field `{key}` at root; this value will be ignored."
                ));
            }
        }
    }

    warnings
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    #[serde(default)]
    boxes: Option<Value>,
    #[serde(default)]
    folders: Option<Value>,
}

impl RawSettings {
    fn into_settings(
        self,
        base_dir: PathBuf,
        context: ResolveContext,
        warnings: &mut Vec<String>,
    ) -> Settings {
        let boxes = collect_boxes(self.boxes.as_ref(), warnings);
        let folders = collect_folders(self.folders.as_ref(), warnings);

        Settings {
            base_dir,
            boxes,
            folders,
            context,
            warnings: std::mem::take(warnings),
        }
    }
}

fn collect_boxes(value: Option<&Value>, warnings: &mut Vec<String>) -> HashMap<String, BoxSettings> {
    let mut boxes = HashMap::new();

    let Some(value) = value else {
        return boxes;
    };
    let Some(entries) = value.as_object() else {
        warnings.push("Expected `boxes` to be a mapping of machine names.".to_string());
        return boxes;
    };

    for (machine, attrs) in entries {
        let Some(attrs) = attrs.as_object() else {
            warnings.push(format!(
                "Expected box attributes for `{machine}` to be a mapping; this entry will be ignored."
            ));
            continue;
        };

        let memory = attrs.get("memory").and_then(Value::as_u64);
        if attrs.contains_key("memory") && memory.is_none() {
            warnings.push(format!("Ignoring non-numeric `memory` for box `{machine}`."));
        }

        let cpus = attrs
            .get("cpus")
            .and_then(Value::as_u64)
            .and_then(|count| u32::try_from(count).ok());
        if attrs.contains_key("cpus") && cpus.is_none() {
            warnings.push(format!("Ignoring non-numeric `cpus` for box `{machine}`."));
        }

        boxes.insert(
            machine.clone(),
            BoxSettings {
                name: attrs.get("name").and_then(Value::as_str).map(String::from),
                url: attrs.get("url").and_then(Value::as_str).map(String::from),
                memory,
                cpus,
            },
        );
    }

    boxes
}

fn collect_folders(
    value: Option<&Value>,
    warnings: &mut Vec<String>,
) -> HashMap<FolderKind, Vec<FolderEntry>> {
    let mut folders: HashMap<FolderKind, Vec<FolderEntry>> = HashMap::new();

    let Some(value) = value else {
        return folders;
    };
    let Some(transports) = value.as_object() else {
        warnings.push("Expected `folders` to be a mapping of transport kinds.".to_string());
        return folders;
    };

    for (key, list) in transports {
        let Some(kind) = FolderKind::from_key(key) else {
            warnings.push(format!(
                "Unknown folder transport `{key}`; supported transports: sshfs, nfs, rsync."
            ));
            continue;
        };

        let Some(list) = list.as_array() else {
            warnings.push(format!(
                "Expected `folders.{key}` to be a list of host/guest pairs."
            ));
            continue;
        };

        let mut entries = Vec::with_capacity(list.len());
        for (idx, entry) in list.iter().enumerate() {
            let host = entry.get("host").and_then(Value::as_str).unwrap_or_default();
            let guest = entry.get("guest").and_then(Value::as_str).unwrap_or_default();

            if host.is_empty() || guest.is_empty() {
                warnings.push(format!(
                    "Folder entry #{idx} for transport `{kind}` is missing a host or guest path; entry skipped."
                ));
                continue;
            }

            entries.push(FolderEntry {
                host: host.to_string(),
                guest: guest.to_string(),
            });
        }

        folders.insert(kind, entries);
    }

    folders
}
