use crate::{EngineError, EngineIo};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

/// Where to find the engine binary.
#[derive(Debug, Clone, Default)]
pub struct StockfishConfig {
    /// Explicit executable path. Falls back to common install locations.
    pub path: Option<PathBuf>,
}

/// A running engine process. Its stdin/stdout are pumped through the
/// [`EngineIo`] returned by [`StockfishProcess::spawn`].
pub struct StockfishProcess {
    process: Child,
}

impl StockfishProcess {
    /// Spawn the engine and start the stdin writer and stdout reader tasks.
    #[tracing::instrument(level = "info")]
    pub fn spawn(config: &StockfishConfig) -> Result<(Self, EngineIo), EngineError> {
        let path = match &config.path {
            Some(path) => path.clone(),
            None => find_stockfish_path().ok_or(EngineError::NotFound)?,
        };
        tracing::info!("Spawning engine at {:?}", path);

        let mut process = tokio::process::Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn engine: {}", e);
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::NotFound
                } else {
                    EngineError::Spawn(e.to_string())
                }
            })?;

        let mut stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("engine has no stdin".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("engine has no stdout".to_string()))?;

        let (to_engine_tx, mut to_engine_rx) = mpsc::channel::<String>(64);
        let (from_engine_tx, from_engine_rx) = mpsc::channel::<String>(256);

        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::warn!("Engine stdout EOF - engine closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        tracing::trace!("UCI << {}", trimmed);
                        if from_engine_tx.send(trimmed.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error reading from engine stdout: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Output reader task exiting");
        });

        tokio::spawn(async move {
            while let Some(cmd) = to_engine_rx.recv().await {
                tracing::trace!("UCI >> {}", cmd);
                if let Err(e) = stdin.write_all(format!("{}\n", cmd).as_bytes()).await {
                    tracing::error!("Failed to write to engine stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    tracing::error!("Failed to flush engine stdin: {}", e);
                    break;
                }
            }
            tracing::debug!("Stdin writer task exiting");
        });

        Ok((
            Self { process },
            EngineIo {
                tx: to_engine_tx,
                rx: from_engine_rx,
            },
        ))
    }

    /// Wait briefly for the process to exit after `quit`, then kill it.
    pub async fn shutdown(mut self) {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(1), self.process.wait()).await;
        let _ = self.process.kill().await;
    }
}

impl std::fmt::Debug for StockfishProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockfishProcess")
            .field("pid", &self.process.id())
            .finish()
    }
}

/// Find Stockfish executable in common locations
pub fn find_stockfish_path() -> Option<PathBuf> {
    let paths = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
    ];

    if let Some(found) = paths.iter().map(Path::new).find(|p| p.exists()) {
        return Some(found.to_path_buf());
    }

    // Fall back to whatever `stockfish` resolves to on PATH.
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join("stockfish"))
        .find(|candidate| candidate.is_file())
}
