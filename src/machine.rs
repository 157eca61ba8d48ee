use crate::error::{Error, Result};
use crate::settings::Settings;

/// Operating system family of a guest machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsKind {
    Linux,
    Windows,
}

/// Caller-declared machine attributes, prior to settings resolution.
///
/// `name`, `os`, `hostname` and `ip` are required; the remaining fields fall
/// back to the settings document and then to hard defaults during
/// [`MachineSpec::resolve`].
#[derive(Debug, Clone)]
pub struct MachineSpec {
    pub name: String,
    pub os: OsKind,
    pub hostname: String,
    pub ip: String,
    pub memory: Option<u64>,
    pub cpus: Option<u32>,
    pub box_image: Option<String>,
    pub box_url: Option<String>,
}

impl MachineSpec {
    pub fn new(
        name: impl Into<String>,
        os: OsKind,
        hostname: impl Into<String>,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            os,
            hostname: hostname.into(),
            ip: ip.into(),
            memory: None,
            cpus: None,
            box_image: None,
            box_url: None,
        }
    }

    pub fn memory(mut self, mb: u64) -> Self {
        self.memory = Some(mb);
        self
    }

    pub fn cpus(mut self, count: u32) -> Self {
        self.cpus = Some(count);
        self
    }

    pub fn box_image(mut self, name: impl Into<String>) -> Self {
        self.box_image = Some(name.into());
        self
    }

    pub fn box_url(mut self, url: impl Into<String>) -> Self {
        self.box_url = Some(url.into());
        self
    }

    /// Resolve the spec into an immutable [`Machine`].
    ///
    /// Each optional field applies the precedence: explicit value, then
    /// settings lookup, then hard default (0 MB, 1 CPU, no box). An explicit
    /// empty box image or URL counts as absent, the same as in the settings
    /// document.
    pub fn resolve(self, settings: Option<&Settings>) -> Result<Machine> {
        if self.name.is_empty() {
            return Err(Error::InvalidMachine {
                message: "machine must have a non-empty `name`".to_string(),
            });
        }

        let memory = self
            .memory
            .or_else(|| settings.map(|s| s.memory(&self.name)))
            .unwrap_or(0);
        let cpus = self
            .cpus
            .or_else(|| settings.map(|s| s.cpus(&self.name)))
            .unwrap_or(1);
        let box_image = self
            .box_image
            .filter(|name| !name.is_empty())
            .or_else(|| settings.and_then(|s| s.box_image(self.os, &self.name)));
        let box_url = self
            .box_url
            .filter(|url| !url.is_empty())
            .or_else(|| settings.and_then(|s| s.box_url(&self.name)));

        Ok(Machine {
            name: self.name,
            os: self.os,
            hostname: self.hostname,
            ip: self.ip,
            memory,
            cpus,
            box_image,
            box_url,
        })
    }
}

/// Fully-resolved guest machine. Holds no settings reference; hostname and IP
/// are opaque passthrough, never validated here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub name: String,
    pub os: OsKind,
    pub hostname: String,
    pub ip: String,
    pub memory: u64,
    pub cpus: u32,
    pub box_image: Option<String>,
    pub box_url: Option<String>,
}
