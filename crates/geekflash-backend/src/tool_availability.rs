//! Availability of the external tools the local backend shells out to

use std::path::PathBuf;

use serde::Serialize;

use crate::commands::CommandOptions;

/// Resolution of one required program
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    /// Resolved location on `PATH`, if any
    pub path: Option<PathBuf>,
}

impl ToolStatus {
    fn resolve(name: &str) -> Self {
        let path = which::which(name)
            .inspect_err(|e| tracing::debug!("{} not found: {}", name, e))
            .ok();
        Self {
            name: name.to_string(),
            path,
        }
    }

    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }
}

/// Availability of `edl`, `fastboot`, python and (when used) `sudo`
#[derive(Debug, Clone, Serialize)]
pub struct ToolAvailability {
    pub edl: ToolStatus,
    pub fastboot: ToolStatus,
    pub python: ToolStatus,
    /// `None` when sudo is disabled in the settings
    pub sudo: Option<ToolStatus>,
}

impl ToolAvailability {
    /// Resolve every configured program (run once, on demand)
    pub fn check(options: &CommandOptions) -> Self {
        Self {
            edl: ToolStatus::resolve(&options.edl_program),
            fastboot: ToolStatus::resolve(&options.fastboot_program),
            python: ToolStatus::resolve(&options.python_program),
            sudo: options.use_sudo.then(|| ToolStatus::resolve("sudo")),
        }
    }

    pub fn tools(&self) -> impl Iterator<Item = &ToolStatus> {
        [&self.edl, &self.fastboot, &self.python]
            .into_iter()
            .chain(self.sudo.as_ref())
    }

    /// Names of programs that could not be resolved
    pub fn missing(&self) -> Vec<&str> {
        self.tools()
            .filter(|t| !t.is_available())
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn all_available(&self) -> bool {
        self.tools().all(ToolStatus::is_available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tools_are_reported() {
        let options = CommandOptions {
            edl_program: "geekflash-missing-edl".to_string(),
            fastboot_program: "geekflash-missing-fastboot".to_string(),
            use_sudo: false,
            ..CommandOptions::default()
        };
        let tools = ToolAvailability::check(&options);

        assert!(tools.sudo.is_none());
        let missing = tools.missing();
        assert!(missing.contains(&"geekflash-missing-edl"));
        assert!(missing.contains(&"geekflash-missing-fastboot"));
        assert!(!tools.all_available());
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_resolves() {
        let options = CommandOptions {
            python_program: "sh".to_string(),
            ..CommandOptions::default()
        };
        let tools = ToolAvailability::check(&options);
        assert!(tools.python.is_available());
        assert_eq!(tools.tools().count(), 4);
    }

    #[cfg(unix)]
    #[test]
    #[serial_test::serial]
    fn test_programs_resolve_from_path() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        for name in ["edl", "fastboot", "python3"] {
            let program = temp.path().join(name);
            std::fs::write(&program, "#!/bin/sh\nexit 0\n").unwrap();
            std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let saved = std::env::var_os("PATH");
        std::env::set_var("PATH", temp.path());
        let tools = ToolAvailability::check(&CommandOptions {
            use_sudo: false,
            ..CommandOptions::default()
        });
        match saved {
            Some(path) => std::env::set_var("PATH", path),
            None => std::env::remove_var("PATH"),
        }

        assert!(tools.all_available(), "missing: {:?}", tools.missing());
        assert!(tools.edl.path.as_ref().is_some_and(|p| p.ends_with("edl")));
    }
}
