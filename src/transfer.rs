//! The FTP file-transfer client.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};

use crate::error::{Error, Result};
use crate::profile::ConnectionProfile;

const FTP_PORT: u16 = 21;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The credentialed login username printers accept with the access code.
const FTP_USER: &str = "bblp";

/// The directory sliced files are uploaded into by default.
pub const DEFAULT_REMOTE_DIR: &str = "/upload";

/// Outcome of an FTP upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    /// Whether the transfer completed.
    pub success: bool,
    /// Human-readable outcome, including any advisory degradations.
    pub message: String,
    /// The resolved remote path. Present only on success.
    pub remote_path: Option<String>,
    /// Error detail. Present only on failure.
    pub error: Option<String>,
}

/// The FTP upload client.
///
/// Stateless: every call opens its own control connection, uses it, and
/// closes it. Printers are LAN devices with typically one FTP session at
/// a time, so connections are never pooled or shared across calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransferClient {}

impl FileTransferClient {
    /// Create a new file-transfer client.
    pub fn new() -> Self {
        Self {}
    }

    /// Upload a local file onto the printer's storage in binary mode.
    ///
    /// The remote name defaults to the local basename and the remote
    /// directory to [`DEFAULT_REMOTE_DIR`]. The control connection is
    /// closed on every exit path.
    ///
    /// # Errors
    ///
    /// [`Error::FileTransfer`] if the local path is not a regular file
    /// (checked before any network I/O) or the transfer command is
    /// rejected; [`Error::Connection`] if the host is unreachable or the
    /// transport breaks; [`Error::Authentication`] if both login
    /// strategies are rejected.
    pub fn upload(
        &self,
        profile: &ConnectionProfile,
        local_path: &Path,
        remote_filename: Option<&str>,
        remote_dir: Option<&str>,
    ) -> Result<TransferResult> {
        if !local_path.is_file() {
            return Err(Error::FileTransfer(format!(
                "{} does not exist or is not a regular file",
                local_path.display()
            )));
        }

        let remote_dir = remote_dir.unwrap_or(DEFAULT_REMOTE_DIR);
        let remote_name = match remote_filename {
            Some(name) => name.to_string(),
            None => local_path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    Error::FileTransfer(format!("{} has no usable filename", local_path.display()))
                })?
                .to_string(),
        };

        let mut ftp = connect_and_login(profile)?;
        let outcome = store(&mut ftp, local_path, &remote_name, remote_dir);
        close(ftp);
        outcome
    }

    /// Best-effort reachability probe: connect and authenticate only, no
    /// directory change, no transfer. Never raises; diagnostics want a
    /// yes/no, not an error to unwind.
    pub fn test_connection(&self, profile: &ConnectionProfile) -> bool {
        match connect_and_login(profile) {
            Ok(ftp) => {
                close(ftp);
                true
            }
            Err(err) => {
                tracing::debug!(address = %profile.address, "connection test failed: {err}");
                false
            }
        }
    }
}

/// Open the control connection and authenticate.
///
/// Anonymous login is tried first (the common LAN-mode default); a server
/// rejection falls back to `bblp` with the access code. No further
/// strategies are attempted. The stream is closed before any error is
/// returned.
fn connect_and_login(profile: &ConnectionProfile) -> Result<FtpStream> {
    let addr = resolve(&profile.address)?;
    let mut ftp = FtpStream::connect_timeout(addr, CONNECT_TIMEOUT)
        .map_err(|err| Error::Connection(format!("cannot reach {}: {err}", profile.address)))?;

    match ftp.login("anonymous", "anonymous") {
        Ok(()) => return Ok(ftp),
        Err(FtpError::UnexpectedResponse(response)) => {
            tracing::debug!(
                status = ?response.status,
                "anonymous login rejected, retrying with access code"
            );
        }
        Err(err) => {
            close(ftp);
            return Err(Error::Connection(format!("login failed: {err}")));
        }
    }

    match ftp.login(FTP_USER, profile.access_code.as_str()) {
        Ok(()) => Ok(ftp),
        Err(FtpError::UnexpectedResponse(response)) => {
            close(ftp);
            Err(Error::Authentication(format!(
                "printer rejected both anonymous and {FTP_USER} logins ({:?})",
                response.status
            )))
        }
        Err(err) => {
            close(ftp);
            Err(Error::Connection(format!("login failed: {err}")))
        }
    }
}

/// Run the directory change, the binary store, and the advisory size
/// check on an authenticated session.
fn store(
    ftp: &mut FtpStream,
    local_path: &Path,
    remote_name: &str,
    remote_dir: &str,
) -> Result<TransferResult> {
    let in_remote_dir = enter_remote_dir(ftp, remote_dir);

    ftp.transfer_type(FileType::Binary).map_err(classify)?;

    let mut file = std::fs::File::open(local_path)
        .map_err(|err| Error::FileTransfer(format!("cannot open {}: {err}", local_path.display())))?;
    let local_len = file
        .metadata()
        .map_err(|err| Error::FileTransfer(format!("cannot stat {}: {err}", local_path.display())))?
        .len();

    ftp.put_file(remote_name, &mut file).map_err(classify)?;

    let mut message = format!("uploaded {remote_name}");
    if !in_remote_dir {
        message.push_str("; fell back to the current directory");
    }

    // The transfer command is the authority on success; a size mismatch
    // is advisory telemetry only.
    match ftp.size(remote_name) {
        Ok(remote_len) if remote_len as u64 != local_len => {
            tracing::warn!(
                remote = remote_len,
                local = local_len,
                "remote size differs from local size after upload"
            );
            message.push_str(&format!(
                "; remote reports {remote_len} bytes, local is {local_len}"
            ));
        }
        Ok(_) => {}
        Err(err) => tracing::debug!("size check unavailable: {err}"),
    }

    let remote_path = if in_remote_dir {
        format!("{}/{remote_name}", remote_dir.trim_end_matches('/'))
    } else {
        remote_name.to_string()
    };

    Ok(TransferResult {
        success: true,
        message,
        remote_path: Some(remote_path),
        error: None,
    })
}

/// Change into the target directory, creating it if needed. Returns
/// whether the session ended up inside it.
///
/// Refusal of both is tolerated: many printer firmwares land uploads in
/// an acceptable default location even when explicit directory management
/// is refused, so the upload degrades instead of aborting.
fn enter_remote_dir(ftp: &mut FtpStream, remote_dir: &str) -> bool {
    let Err(cwd_err) = ftp.cwd(remote_dir) else {
        return true;
    };
    tracing::debug!("CWD {remote_dir} refused ({cwd_err}), attempting to create it");

    if let Err(mkd_err) = ftp.mkdir(remote_dir) {
        tracing::warn!("cannot create {remote_dir} ({mkd_err}); uploading into the current directory");
        return false;
    }

    match ftp.cwd(remote_dir) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!("created {remote_dir} but cannot enter it ({err}); uploading into the current directory");
            false
        }
    }
}

/// Map an FTP failure on an established session onto the error taxonomy.
fn classify(err: FtpError) -> Error {
    match err {
        FtpError::ConnectionError(err) => {
            Error::Connection(format!("transport failed mid-transfer: {err}"))
        }
        FtpError::UnexpectedResponse(response) => {
            Error::FileTransfer(format!("transfer rejected: {:?}", response.status))
        }
        other => Error::Communication(format!("ftp failure: {other}")),
    }
}

/// Close the control connection, preferring a graceful QUIT and falling
/// back to dropping the socket. Cleanup failures are swallowed.
fn close(mut ftp: FtpStream) {
    if let Err(err) = ftp.quit() {
        tracing::debug!("QUIT failed, dropping the connection: {err}");
    }
}

/// Resolve a profile address to a socket address. A bare host gets the
/// standard FTP control port; an explicit `host:port` is honored as-is.
fn resolve(address: &str) -> Result<SocketAddr> {
    let mut addrs = if address.contains(':') {
        address.to_socket_addrs()
    } else {
        (address, FTP_PORT).to_socket_addrs()
    }
    .map_err(|err| Error::Connection(format!("cannot resolve {address}: {err}")))?;

    addrs
        .next()
        .ok_or_else(|| Error::Connection(format!("cannot resolve {address}")))
}
