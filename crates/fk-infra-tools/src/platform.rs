//! Release asset naming for the host platform

use crate::error::{Result, ToolsError};

/// Host platform in the `<os>_<arch>` vocabulary of upstream release assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: &'static str,
    pub arch: &'static str,
}

impl Platform {
    pub fn current() -> Result<Self> {
        Self::from_rust(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust target names (`macos`, `x86_64`) to release names (`darwin`, `amd64`).
    pub fn from_rust(os: &str, arch: &str) -> Result<Self> {
        let unsupported = || ToolsError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let mapped_os = match os {
            "linux" => "linux",
            "macos" => "darwin",
            "windows" => "windows",
            _ => return Err(unsupported()),
        };
        let mapped_arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            _ => return Err(unsupported()),
        };

        Ok(Self {
            os: mapped_os,
            arch: mapped_arch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping() {
        assert_eq!(
            Platform::from_rust("macos", "aarch64").unwrap(),
            Platform {
                os: "darwin",
                arch: "arm64"
            }
        );
        assert_eq!(
            Platform::from_rust("linux", "x86_64").unwrap(),
            Platform {
                os: "linux",
                arch: "amd64"
            }
        );
    }

    #[test]
    fn test_unsupported() {
        let err = Platform::from_rust("solaris", "sparc64").unwrap_err();
        assert!(err.to_string().contains("solaris-sparc64"));
    }
}
