//! Exposes an in-process test server for use in integration tests.
//!
//! ```
//! use sharehealth_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/health");
//!    // use the URL in tests...
//! }
//! ```

use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};

use sharehealth_server::config::Config;
use sharehealth_server::state::{ServiceState, State};
use sharehealth_server::web::App;
use sharehealth_types::ShareConfig;
use tempfile::TempDir;

/// An in-process test server for use in integration tests.
///
/// By default, the server checks a single share named `test` backed by a temporary directory,
/// which is deleted when the server is dropped. It listens on a random available port on
/// localhost. The scheduler is not started, runs happen only on request.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    state: ServiceState,
    tempdir: TempDir,
}

impl TestServer {
    /// Starts a server with one small share in a temporary directory.
    pub async fn new() -> Self {
        Self::with_config(|root| Config {
            shares: vec![small_share("test", root)],
            ..Default::default()
        })
        .await
    }

    /// Starts a server with a custom configuration.
    ///
    /// The closure receives the root of the temporary directory, which can be used to place
    /// shares.
    pub async fn with_config(make_config: impl FnOnce(&Path) -> Config) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let tempdir = tempfile::tempdir().unwrap();
        let config = make_config(tempdir.path());

        let state = State::new(config);
        let app = App::new(state.clone());

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            app.serve(listener).await.unwrap();
        });

        Self {
            handle,
            socket,
            state,
            tempdir,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.socket.port(), path)
    }

    /// Returns the shared state of the running server.
    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    /// Returns the root of the temporary directory.
    pub fn root(&self) -> &Path {
        self.tempdir.path()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Creates a share below `root` with a 1 MB test file and a handful of small files.
///
/// The share directory is created, its health directory is left for the checks to create.
pub fn small_share(name: &str, root: &Path) -> ShareConfig {
    let path: PathBuf = root.join(name);
    std::fs::create_dir_all(&path).unwrap();
    ShareConfig {
        test_file_size_mb: 1,
        small_files_count: 10,
        ..ShareConfig::new(name, &path, path.join(".health"))
    }
}
