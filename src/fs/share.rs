use std::io::{self, Read};
use std::path::PathBuf;

use super::local::{list_native, stat_native};
use super::{EntryMeta, FileHandle};
use crate::config::ShareConfig;
use crate::path::{CrawlPath, Scheme};

/// Network shares addressed as `smb://server/share/...`.
///
/// On Windows the share is opened through its UNC path after a session has
/// been established with the configured credentials. Elsewhere shares are
/// expected to be mounted below `mount_root/<server>/<share>`.
pub struct ShareFs {
    config: ShareConfig,
    #[cfg(windows)]
    connected: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl ShareFs {
    pub fn new(config: ShareConfig) -> Self {
        Self {
            config,
            #[cfg(windows)]
            connected: std::sync::Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Native location of a share path.
    pub fn resolve(&self, path: &CrawlPath) -> io::Result<PathBuf> {
        if path.scheme() != Scheme::Smb || path.segments().len() < 2 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a share path", path),
            ));
        }
        Ok(self.native(path.segments()))
    }

    #[cfg(windows)]
    fn native(&self, segments: &[String]) -> PathBuf {
        PathBuf::from(format!(r"\\{}", segments.join("\\")))
    }

    #[cfg(not(windows))]
    fn native(&self, segments: &[String]) -> PathBuf {
        let mut p = self.config.mount_root.clone();
        p.extend(segments);
        p
    }

    fn open(&self, path: &CrawlPath) -> io::Result<PathBuf> {
        let native = self.resolve(path)?;
        if let Some(server) = &self.config.server {
            if !path.segments()[0].eq_ignore_ascii_case(server) {
                tracing::debug!(path = %path, server = %server, "Share path on a server other than the configured one");
            }
        }
        #[cfg(windows)]
        self.connect(&path.segments()[0], &path.segments()[1])?;
        Ok(native)
    }

    #[cfg(windows)]
    fn connect(&self, server: &str, share: &str) -> io::Result<()> {
        use windows::core::{PCWSTR, PWSTR};
        use windows::Win32::Foundation::NO_ERROR;
        use windows::Win32::NetworkManagement::WNet::{
            WNetAddConnection2W, CONNECT_TEMPORARY, NETRESOURCEW, RESOURCETYPE_DISK,
        };

        let remote = format!(r"\\{}\{}", server, share);
        let key = remote.to_ascii_lowercase();
        {
            let connected = self.connected.lock().unwrap_or_else(|p| p.into_inner());
            if connected.contains(&key) {
                return Ok(());
            }
        }
        let (Some(user), Some(password)) = (&self.config.username, &self.config.password) else {
            // no credentials: rely on the service account's session
            return Ok(());
        };
        let user = match &self.config.domain {
            Some(domain) => format!(r"{}\{}", domain, user),
            None => user.clone(),
        };

        let wide = |s: &str| -> Vec<u16> { s.encode_utf16().chain(std::iter::once(0)).collect() };
        let mut remote_w = wide(&remote);
        let user_w = wide(&user);
        let password_w = wide(password);
        let resource = NETRESOURCEW {
            dwType: RESOURCETYPE_DISK,
            lpRemoteName: PWSTR(remote_w.as_mut_ptr()),
            ..Default::default()
        };

        let rc = unsafe {
            WNetAddConnection2W(
                &resource,
                PCWSTR(password_w.as_ptr()),
                PCWSTR(user_w.as_ptr()),
                CONNECT_TEMPORARY,
            )
        };
        // 1219: a session with other credentials already exists
        if rc != NO_ERROR && rc.0 != 1219 {
            tracing::warn!(share = %remote, "WNetAddConnection2W failed with code {}", rc.0);
            return Err(io::Error::from_raw_os_error(rc.0 as i32));
        }
        tracing::info!(share = %remote, "Connected to network share");
        self.connected.lock().unwrap_or_else(|p| p.into_inner()).insert(key);
        Ok(())
    }
}

impl FileHandle for ShareFs {
    fn stat(&self, path: &CrawlPath) -> io::Result<Option<EntryMeta>> {
        stat_native(&self.open(path)?, path.name())
    }

    fn list(&self, path: &CrawlPath) -> io::Result<Vec<EntryMeta>> {
        list_native(&self.open(path)?)
    }

    fn read(&self, path: &CrawlPath) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::fs::File::open(self.open(path)?)?))
    }
}
