//! Rotating egress identities loaded from a line-oriented proxy list.
//!
//! Each non-comment line is `host:port` or `host:port:user:pass`. The pool is
//! immutable after load and safe to share across concurrent runs.

use std::path::Path;

use rand::seq::IndexedRandom;
use shopscope_core::ConfigError;

/// One upstream proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyEntry {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyEntry {
    /// `http://host:port`, without credentials.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Returns `(username, password)` when the entry carries credentials.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Parses one `host:port[:user:pass]` line.
    fn parse_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split(':').map(str::trim).collect();
        let (host, port, username, password) = match parts.as_slice() {
            [host, port] => (*host, *port, None, None),
            [host, port, user, pass] => (*host, *port, Some(*user), Some(*pass)),
            _ => return None,
        };
        if host.is_empty() {
            return None;
        }
        let port = port.parse::<u16>().ok().filter(|p| *p != 0)?;
        Some(Self {
            host: host.to_owned(),
            port,
            username: username.filter(|u| !u.is_empty()).map(str::to_owned),
            password: password.filter(|p| !p.is_empty()).map(str::to_owned),
        })
    }
}

impl std::fmt::Debug for ProxyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyEntry")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Read-only set of proxies with memoryless random selection.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    entries: Vec<ProxyEntry>,
}

impl ProxyPool {
    /// An empty pool: every fetch goes out directly.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads a proxy list from disk.
    ///
    /// A missing file yields an empty pool so callers fall back to direct
    /// connections.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let pool = Self::parse(&content);
                tracing::info!(
                    path = %path.display(),
                    proxies = pool.len(),
                    "loaded proxy list"
                );
                Ok(pool)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %path.display(),
                    "proxy list not found; using direct connections"
                );
                Ok(Self::empty())
            }
            Err(e) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    /// Parses an in-memory proxy list. Blank lines and `#` comments are
    /// ignored; malformed lines are skipped.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .enumerate()
            .filter_map(|(idx, raw)| {
                let line = raw.trim();
                if line.is_empty() || line.starts_with('#') {
                    return None;
                }
                let entry = ProxyEntry::parse_line(line);
                if entry.is_none() {
                    tracing::warn!(line = idx + 1, "skipping malformed proxy entry");
                }
                entry
            })
            .collect();
        Self { entries }
    }

    /// Uniform random draw with no memory of prior picks.
    #[must_use]
    pub fn pick_random(&self) -> Option<&ProxyEntry> {
        self.entries.choose(&mut rand::rng())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_authenticated_entries() {
        let pool = ProxyPool::parse(
            "# residential pool\n\n10.0.0.1:8080\nproxy.example.net:3128:alice:s3cret\n",
        );
        assert_eq!(pool.len(), 2);
        let entries: Vec<_> = pool.iter().collect();
        assert_eq!(entries[0].host, "10.0.0.1");
        assert_eq!(entries[0].port, 8080);
        assert!(entries[0].credentials().is_none());
        assert_eq!(entries[1].credentials(), Some(("alice", "s3cret")));
        assert_eq!(entries[1].url(), "http://proxy.example.net:3128");
    }

    #[test]
    fn skips_malformed_lines() {
        let pool = ProxyPool::parse("host-only\n1.2.3.4:notaport\n1.2.3.4:0\n:8080\n5.6.7.8:9000\n");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.iter().next().unwrap().host, "5.6.7.8");
    }

    #[test]
    fn comment_only_source_is_empty() {
        let pool = ProxyPool::parse("# nothing here\n   \n#1.2.3.4:80\n");
        assert!(pool.is_empty());
        assert!(pool.pick_random().is_none());
    }

    #[test]
    fn missing_file_yields_empty_pool() {
        let path = std::env::temp_dir().join("shopscope-no-such-proxy-list.txt");
        let pool = ProxyPool::load(&path).expect("missing file is not an error");
        assert!(pool.is_empty());
        assert!(pool.pick_random().is_none());
    }

    #[test]
    fn directory_source_is_a_config_error() {
        let dir = std::env::temp_dir();
        let result = ProxyPool::load(&dir);
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!(
            "shopscope-proxies-{}.txt",
            std::process::id()
        ));
        std::fs::write(&path, "1.1.1.1:80\n# c\n2.2.2.2:81:u:p\n").unwrap();
        let pool = ProxyPool::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn pick_random_returns_member() {
        let pool = ProxyPool::parse("1.1.1.1:80\n2.2.2.2:81\n");
        for _ in 0..20 {
            let picked = pool.pick_random().expect("non-empty pool");
            assert!(pool.iter().any(|e| e == picked));
        }
    }

    #[test]
    fn debug_redacts_password() {
        let pool = ProxyPool::parse("h:1:user:topsecret\n");
        let rendered = format!("{:?}", pool.iter().next().unwrap());
        assert!(!rendered.contains("topsecret"));
    }
}
