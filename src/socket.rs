//! Broadcasts reports to presentation clients connected over a Unix socket.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::report::{Report, Reporter, Result};

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/punchpower.sock";

const ACCEPT_POLL: Duration = Duration::from_millis(100);

pub struct SocketReporter {
    path: PathBuf,
    clients: Arc<Mutex<Vec<UnixStream>>>,
    shutdown: Arc<AtomicBool>,
}

impl SocketReporter {
    /// Bind the socket and start accepting clients in the background.
    pub fn bind(path: &Path) -> Result<Self> {
        // Stale socket from a previous run
        let _ = std::fs::remove_file(path);

        let listener = UnixListener::bind(path)?;
        // Let unprivileged clients connect
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777))?;
        listener.set_nonblocking(true)?;

        let clients: Arc<Mutex<Vec<UnixStream>>> = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let clients_accept = Arc::clone(&clients);
        let shutdown_accept = Arc::clone(&shutdown);
        thread::spawn(move || {
            while !shutdown_accept.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        log::info!("client connected");
                        stream.set_nonblocking(false).ok();
                        if let Ok(mut clients) = clients_accept.lock() {
                            clients.push(stream);
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(ACCEPT_POLL);
                    }
                    Err(e) => {
                        log::warn!("accept error: {e}");
                        thread::sleep(ACCEPT_POLL);
                    }
                }
            }
        });

        log::info!("socket at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            clients,
            shutdown,
        })
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Reporter for SocketReporter {
    fn report(&mut self, report: &Report) -> Result<()> {
        let json = report.to_json()?;
        let Ok(mut clients) = self.clients.lock() else {
            log::warn!("client list poisoned, dropping report");
            return Ok(());
        };
        clients.retain_mut(|stream| match writeln!(stream, "{json}").and_then(|_| stream.flush()) {
            Ok(()) => true,
            Err(_) => {
                log::info!("client disconnected");
                false
            }
        });
        Ok(())
    }
}

impl Drop for SocketReporter {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = std::fs::remove_file(&self.path);
    }
}
