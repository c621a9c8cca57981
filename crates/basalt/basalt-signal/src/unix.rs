use rand::Rng;
use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Directory under the user supplied root where signal sockets live.
const SOCK_DIR: &str = ".cloudtoid/interprocess/sock";

/// How often the accept loop polls for new clients and for shutdown.
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Attempts at binding a random socket name before giving up.
const BIND_ATTEMPTS: u32 = 16;

fn sock_dir(root: &Path) -> PathBuf {
    root.join(SOCK_DIR)
}

struct ServerShared {
    listener: UnixListener,
    clients: Mutex<Vec<UnixStream>>,
    shutdown: AtomicBool,
}

impl ServerShared {
    fn clients(&self) -> MutexGuard<'_, Vec<UnixStream>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The publishing side of the wake-up signal: a unix domain socket server
/// that fans a one-byte token out to every connected subscriber process.
pub struct SignalReleaser {
    shared: Arc<ServerShared>,
    accept_thread: Option<JoinHandle<()>>,
    socket_path: PathBuf,
}

impl SignalReleaser {
    /// Binds a fan-out server socket for `queue_name` under `root`.
    ///
    /// The socket file name carries a random numeric suffix so that stale
    /// files left behind by crashed processes never block a new server;
    /// collisions are retried with a fresh suffix.
    pub fn create(root: &Path, queue_name: &str) -> io::Result<Self> {
        let dir = sock_dir(root);
        fs::create_dir_all(&dir)?;

        let mut rng = rand::rng();
        let mut attempt = 0;
        let (listener, socket_path) = loop {
            let n: u32 = rng.random_range(0..100_000);
            let path = dir.join(format!("{queue_name}{n}.sock"));
            match UnixListener::bind(&path) {
                Ok(listener) => break (listener, path),
                Err(e) if e.kind() == io::ErrorKind::AddrInUse && attempt < BIND_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };
        listener.set_nonblocking(true)?;
        debug!(path = %socket_path.display(), "signal server listening");

        let shared = Arc::new(ServerShared {
            listener,
            clients: Mutex::new(Vec::new()),
            shutdown: AtomicBool::new(false),
        });

        let accept_shared = Arc::clone(&shared);
        let accept_thread = thread::Builder::new()
            .name(format!("basalt-signal-{queue_name}"))
            .spawn(move || accept_loop(&accept_shared))?;

        Ok(Self {
            shared,
            accept_thread: Some(accept_thread),
            socket_path,
        })
    }

    /// Wakes every currently connected waiter.
    ///
    /// Must not fail the caller's publish: send errors drop the offending
    /// client and are otherwise swallowed. A `WouldBlock` means the client
    /// already has unread signal bytes queued, which is as good as another
    /// wake-up (signals are coalescible by contract).
    pub fn release(&self) {
        let mut clients = self.shared.clients();
        clients.retain_mut(|stream| match stream.write(&[1u8]) {
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(e) => {
                debug!(error = %e, "dropping unreachable signal client");
                false
            }
        });
    }
}

impl Drop for SignalReleaser {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
        self.shared.clients().clear();
        if let Err(e) = fs::remove_file(&self.socket_path) {
            warn!(path = %self.socket_path.display(), error = %e, "failed to unlink signal socket");
        }
    }
}

fn accept_loop(shared: &ServerShared) {
    while !shared.shutdown.load(Ordering::Acquire) {
        match shared.listener.accept() {
            Ok((stream, _)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    warn!(error = %e, "rejecting signal client");
                    continue;
                }
                shared.clients().push(stream);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                warn!(error = %e, "signal accept failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

/// The subscribing side of the wake-up signal: connects to any discoverable
/// server for the queue and parks on a one-byte read.
pub struct SignalWaiter {
    dir: PathBuf,
    queue_name: String,
    stream: Option<UnixStream>,
}

impl SignalWaiter {
    /// Creates a waiter for `queue_name` under `root`.
    ///
    /// The connection is established lazily on the first [`wait`](Self::wait)
    /// so that subscribers can come up before any publisher exists.
    pub fn create(root: &Path, queue_name: &str) -> io::Result<Self> {
        Ok(Self {
            dir: sock_dir(root),
            queue_name: queue_name.to_owned(),
            stream: None,
        })
    }

    /// Parks until a release arrives or `timeout` elapses.
    ///
    /// Returns `true` on a wake-up. When no server is reachable this
    /// degrades to sleeping out the timeout, which keeps the caller's poll
    /// loop correct at the cost of latency.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if timeout.is_zero() {
            return false;
        }
        if self.stream.is_none() {
            self.stream = self.discover();
        }
        let Some(stream) = self.stream.as_mut() else {
            thread::sleep(timeout);
            return false;
        };

        if stream.set_read_timeout(Some(timeout)).is_err() {
            self.stream = None;
            return false;
        }
        let mut token = [0u8; 1];
        match stream.read(&mut token) {
            // 0 bytes means the server hung up; reconnect on the next wait.
            Ok(0) => {
                self.stream = None;
                false
            }
            Ok(_) => true,
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                false
            }
            Err(e) => {
                debug!(error = %e, "signal connection lost");
                self.stream = None;
                false
            }
        }
    }

    /// Scans the socket directory for a live server and connects to the
    /// first reachable one. Stale socket files from crashed servers fail the
    /// connect and are skipped.
    fn discover(&self) -> Option<UnixStream> {
        let entries = fs::read_dir(&self.dir).ok()?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(suffix) = name
                .strip_prefix(self.queue_name.as_str())
                .and_then(|rest| rest.strip_suffix(".sock"))
            else {
                continue;
            };
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            match UnixStream::connect(entry.path()) {
                Ok(stream) => {
                    debug!(path = %entry.path().display(), "connected to signal server");
                    return Some(stream);
                }
                Err(e) => debug!(path = %entry.path().display(), error = %e, "signal connect failed"),
            }
        }
        None
    }
}
