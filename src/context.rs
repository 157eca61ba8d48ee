use std::env;

use crate::settings::FolderKind;

/// When present, a missing settings file is a fatal load error instead of
/// defaulting to an empty document.
pub const STRICT_CONFIG_ENV: &str = "GUESTLAB_CONFIG";

/// When set to the literal `yes`, folder sharing is disabled entirely.
pub const BOXES_ONLY_ENV: &str = "GUESTLAB_BOX";

/// Per-transport folder overrides, format `host1:guest1 host2:guest2 …`.
pub const SSHFS_FOLDERS_ENV: &str = "GUESTLAB_SSHFS";
pub const NFS_FOLDERS_ENV: &str = "GUESTLAB_NFS";
pub const RSYNC_FOLDERS_ENV: &str = "GUESTLAB_RSYNC";

/// Shell-profile variable forwarded into Linux guest interactive shells when
/// present in the calling environment.
pub const SHELL_PROFILE_ENV: &str = "GUESTLAB_BASHRC";

/// Environment-derived switches that influence settings resolution.
///
/// Captured once (normally via [`ResolveContext::from_env`]) and handed to
/// [`Settings::load`](crate::Settings::load); lookups never touch the process
/// environment themselves, so a hand-built context makes resolution fully
/// deterministic in tests.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// Treat a missing settings file as a fatal error.
    pub strict: bool,
    /// Disable all folder sharing; every folder lookup returns an empty map.
    pub boxes_only: bool,
    /// Override string for the sshfs transport.
    pub sshfs_folders: Option<String>,
    /// Override string for the nfs transport.
    pub nfs_folders: Option<String>,
    /// Override string for the rsync transport.
    pub rsync_folders: Option<String>,
    /// Forward [`SHELL_PROFILE_ENV`] into Linux guest shells.
    pub forward_shell_profile: bool,
}

impl ResolveContext {
    /// Capture the recognized environment variables.
    pub fn from_env() -> Self {
        Self {
            strict: env::var_os(STRICT_CONFIG_ENV).is_some(),
            boxes_only: env::var(BOXES_ONLY_ENV).is_ok_and(|value| value == "yes"),
            sshfs_folders: env::var(SSHFS_FOLDERS_ENV).ok(),
            nfs_folders: env::var(NFS_FOLDERS_ENV).ok(),
            rsync_folders: env::var(RSYNC_FOLDERS_ENV).ok(),
            forward_shell_profile: env::var_os(SHELL_PROFILE_ENV).is_some(),
        }
    }

    /// Override string captured for the given transport, if any.
    pub fn folder_override(&self, kind: FolderKind) -> Option<&str> {
        match kind {
            FolderKind::Sshfs => self.sshfs_folders.as_deref(),
            FolderKind::Nfs => self.nfs_folders.as_deref(),
            FolderKind::Rsync => self.rsync_folders.as_deref(),
        }
    }
}
