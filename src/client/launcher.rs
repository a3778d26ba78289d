//! Starting a server process on demand

use std::env;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::Result;

/// Name of the server binary built alongside the client
pub const SERVER_PROGRAM: &str = "prok-server";

/// Something that can bring up a server on a control port.
///
/// Launching must not wait for the server to become reachable; callers poll
/// with PING afterwards.
pub trait ServerLauncher: Send + Sync {
    fn launch(&self, port: u16) -> Result<()>;
}

/// Launches the server binary as a detached child process
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    program: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit server executable instead of looking one up
    pub fn with_program(program: Option<PathBuf>) -> Self {
        Self { program }
    }

    /// Executable to run: the configured path, else the server binary next
    /// to the current executable, else whatever `PATH` finds
    pub fn program(&self) -> PathBuf {
        if let Some(program) = &self.program {
            return program.clone();
        }

        let file_name = format!("{}{}", SERVER_PROGRAM, env::consts::EXE_SUFFIX);
        env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)))
            .filter(|candidate| candidate.is_file())
            .unwrap_or_else(|| PathBuf::from(file_name))
    }
}

impl ServerLauncher for ProcessLauncher {
    fn launch(&self, port: u16) -> Result<()> {
        let program = self.program();
        let child = Command::new(&program)
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;

        // The child outlives us; dropping the handle does not kill it
        tracing::info!("Spawned {} (pid {}) on port {}", program.display(), child.id(), port);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_configured_program_wins() {
        let launcher = ProcessLauncher::with_program(Some(PathBuf::from("/opt/prok/server")));
        assert_eq!(launcher.program(), PathBuf::from("/opt/prok/server"));
    }

    #[test]
    fn test_fallback_program_name() {
        let program = ProcessLauncher::new().program();
        let name = program.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(SERVER_PROGRAM));
    }

    #[test]
    fn test_missing_program_fails() {
        let launcher =
            ProcessLauncher::with_program(Some(PathBuf::from("/nonexistent/prok-server-missing")));
        assert!(matches!(launcher.launch(10345), Err(Error::Io(_))));
    }
}
