use crate::context::SHELL_PROFILE_ENV;
use crate::error::Result;
use crate::machine::{Machine, OsKind};
use crate::settings::{FolderKind, Settings};

/// Libvirt storage pool guests are provisioned into.
pub const STORAGE_POOL: &str = "guestlab";

/// Dot prefix joins the default (or empty) Windows domain.
pub const WINDOWS_ADMIN_USER: &str = ".\\Administrator";

/// WinRM retry tuning; the first connection has to survive a slow boot.
pub const WINRM_RETRY_LIMIT: u32 = 50;
pub const WINRM_RETRY_DELAY_SECS: u64 = 10;

/// One shared-folder directive for the provisioning front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedFolder {
    pub host: String,
    pub guest: String,
    pub transport: FolderKind,
    pub options: MountOptions,
}

/// Transport-specific mount options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOptions {
    /// Extra sshfs options, e.g. `-o cache=no`.
    Sshfs { opts_append: String },
    Nfs { udp: bool },
    Rsync,
}

impl MountOptions {
    fn for_kind(kind: FolderKind) -> Self {
        match kind {
            FolderKind::Sshfs => MountOptions::Sshfs {
                opts_append: "-o cache=no".to_string(),
            },
            FolderKind::Nfs => MountOptions::Nfs { udp: false },
            FolderKind::Rsync => MountOptions::Rsync,
        }
    }
}

/// OS-specific remote-access configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAccess {
    Ssh {
        /// Environment variable names forwarded into interactive shells.
        forward_env: Vec<String>,
    },
    WinRm {
        username: String,
        retry_limit: u32,
        retry_delay_secs: u64,
    },
}

/// Declarative per-guest definition consumed by the provisioning front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestDefinition {
    pub name: String,
    pub box_image: Option<String>,
    pub box_url: Option<String>,
    pub hostname: String,
    /// Private-network address.
    pub ip: String,
    pub memory: u64,
    pub cpus: u32,
    pub storage_pool: String,
    /// Whether the tool's default project share is disabled.
    pub default_share_disabled: bool,
    pub synced_folders: Vec<SyncedFolder>,
    pub access: RemoteAccess,
}

/// Map a resolved machine onto its guest definition, branching on OS kind.
pub fn define_guest(machine: &Machine, settings: &Settings) -> Result<GuestDefinition> {
    let (default_share_disabled, synced_folders, access) = match machine.os {
        OsKind::Linux => {
            let mut folders = Vec::new();
            for kind in FolderKind::ALL {
                for (host, guest) in settings.folders(kind)? {
                    folders.push(SyncedFolder {
                        host,
                        guest,
                        transport: kind,
                        options: MountOptions::for_kind(kind),
                    });
                }
            }

            let forward_env = if settings.context().forward_shell_profile {
                vec![SHELL_PROFILE_ENV.to_string()]
            } else {
                Vec::new()
            };

            (true, folders, RemoteAccess::Ssh { forward_env })
        }
        OsKind::Windows => (
            false,
            Vec::new(),
            RemoteAccess::WinRm {
                username: WINDOWS_ADMIN_USER.to_string(),
                retry_limit: WINRM_RETRY_LIMIT,
                retry_delay_secs: WINRM_RETRY_DELAY_SECS,
            },
        ),
    };

    Ok(GuestDefinition {
        name: machine.name.clone(),
        box_image: machine.box_image.clone(),
        box_url: machine.box_url.clone(),
        hostname: machine.hostname.clone(),
        ip: machine.ip.clone(),
        memory: machine.memory,
        cpus: machine.cpus,
        storage_pool: STORAGE_POOL.to_string(),
        default_share_disabled,
        synced_folders,
        access,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResolveContext;
    use crate::machine::MachineSpec;
    use crate::settings::{ENROLLMENT_GUEST_PATH, ENROLLMENT_HOST_DIR};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn load_settings(
        dir: &tempfile::TempDir,
        contents: &str,
        context: ResolveContext,
    ) -> Settings {
        let path = dir.path().join("settings.json");
        fs::write(&path, contents).expect("write settings");
        Settings::load(Some(&path), context).expect("load settings")
    }

    fn linux_machine(settings: &Settings) -> Machine {
        MachineSpec::new("client", OsKind::Linux, "client.test", "192.168.100.20")
            .resolve(Some(settings))
            .expect("resolve machine")
    }

    #[test]
    fn linux_guest_disables_default_share_and_mounts_all_transports() {
        let dir = tempdir().unwrap();
        let settings = load_settings(
            &dir,
            r#"{"folders": {
                "nfs": [{"host": "./data", "guest": "/data"}],
                "rsync": [{"host": "./src", "guest": "/src"}]
            }}"#,
            ResolveContext::default(),
        );

        let guest = define_guest(&linux_machine(&settings), &settings).expect("define");

        assert!(guest.default_share_disabled);
        assert_eq!(guest.storage_pool, STORAGE_POOL);
        assert_eq!(guest.synced_folders.len(), 3);

        let enrollment_host = dir.path().join(ENROLLMENT_HOST_DIR).display().to_string();
        assert_eq!(
            guest.synced_folders[0],
            SyncedFolder {
                host: enrollment_host,
                guest: ENROLLMENT_GUEST_PATH.to_string(),
                transport: FolderKind::Sshfs,
                options: MountOptions::Sshfs {
                    opts_append: "-o cache=no".to_string()
                },
            }
        );
        assert_eq!(
            guest.synced_folders[1],
            SyncedFolder {
                host: "./data".to_string(),
                guest: "/data".to_string(),
                transport: FolderKind::Nfs,
                options: MountOptions::Nfs { udp: false },
            }
        );
        assert_eq!(
            guest.synced_folders[2],
            SyncedFolder {
                host: "./src".to_string(),
                guest: "/src".to_string(),
                transport: FolderKind::Rsync,
                options: MountOptions::Rsync,
            }
        );
    }

    #[test]
    fn linux_guest_forwards_shell_profile_when_requested() {
        let dir = tempdir().unwrap();

        let plain = load_settings(&dir, "{}", ResolveContext::default());
        let guest = define_guest(&linux_machine(&plain), &plain).expect("define");
        assert_eq!(
            guest.access,
            RemoteAccess::Ssh {
                forward_env: Vec::new()
            }
        );

        let forwarding = load_settings(
            &dir,
            "{}",
            ResolveContext {
                forward_shell_profile: true,
                ..ResolveContext::default()
            },
        );
        let guest = define_guest(&linux_machine(&forwarding), &forwarding).expect("define");
        assert_eq!(
            guest.access,
            RemoteAccess::Ssh {
                forward_env: vec![SHELL_PROFILE_ENV.to_string()]
            }
        );
    }

    #[test]
    fn windows_guest_uses_winrm_with_retry_tuning() {
        let dir = tempdir().unwrap();
        let settings = load_settings(
            &dir,
            r#"{"boxes": {"ad": {"name": "windows/2022", "memory": 4096}}}"#,
            ResolveContext::default(),
        );

        let machine = MachineSpec::new("ad", OsKind::Windows, "ad", "192.168.100.30")
            .resolve(Some(&settings))
            .expect("resolve machine");
        let guest = define_guest(&machine, &settings).expect("define");

        assert!(!guest.default_share_disabled);
        assert!(guest.synced_folders.is_empty());
        assert_eq!(guest.box_image.as_deref(), Some("windows/2022"));
        assert_eq!(guest.memory, 4096);
        assert_eq!(
            guest.access,
            RemoteAccess::WinRm {
                username: WINDOWS_ADMIN_USER.to_string(),
                retry_limit: WINRM_RETRY_LIMIT,
                retry_delay_secs: WINRM_RETRY_DELAY_SECS,
            }
        );
    }

    #[test]
    fn boxes_only_mode_leaves_linux_guests_without_shares() {
        let dir = tempdir().unwrap();
        let settings = load_settings(
            &dir,
            r#"{"folders": {"sshfs": [{"host": "./data", "guest": "/data"}]}}"#,
            ResolveContext {
                boxes_only: true,
                ..ResolveContext::default()
            },
        );

        let guest = define_guest(&linux_machine(&settings), &settings).expect("define");
        assert!(guest.synced_folders.is_empty());
        assert!(guest.default_share_disabled);
    }

    #[test]
    fn unresolved_box_stays_absent_in_the_definition() {
        let settings = Settings::load(None, ResolveContext::default()).expect("empty settings");
        let guest = define_guest(&linux_machine(&settings), &settings).expect("define");

        assert_eq!(guest.box_image, None);
        assert_eq!(guest.box_url, None);
        assert_eq!(guest.memory, 0);
        assert_eq!(guest.cpus, 1);

        let enrollment_host = PathBuf::from(".")
            .join(ENROLLMENT_HOST_DIR)
            .display()
            .to_string();
        assert_eq!(
            guest.synced_folders[0].host, enrollment_host,
            "empty document anchors the enrollment share at the working directory"
        );
    }
}
