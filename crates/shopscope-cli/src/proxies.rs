//! `proxies` command: parse a proxy list and report what a run would use.

use std::path::Path;

use shopscope_scraper::{ProxyEntry, ProxyPool};

/// Loads `path` and prints one line per usable proxy, credentials masked.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or holds no usable
/// entries.
pub(crate) fn run_proxies(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("proxy list '{}' does not exist", path.display());
    }

    let pool = ProxyPool::load(path)?;
    if pool.is_empty() {
        anyhow::bail!("proxy list '{}' has no usable entries", path.display());
    }

    for entry in pool.iter() {
        println!("{}", describe(entry));
    }
    let authenticated = pool.iter().filter(|e| e.credentials().is_some()).count();
    println!(
        "{} proxies ({authenticated} with credentials)",
        pool.len()
    );
    Ok(())
}

fn describe(entry: &ProxyEntry) -> String {
    match entry.credentials() {
        Some((user, _)) => format!("{}:{} (user {user})", entry.host, entry.port),
        None => format!("{}:{}", entry.host, entry.port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_masks_password() {
        let pool = ProxyPool::parse("10.0.0.1:8080\n10.0.0.2:3128:alice:hunter2\n");
        let lines: Vec<String> = pool.iter().map(describe).collect();
        assert_eq!(lines, vec!["10.0.0.1:8080", "10.0.0.2:3128 (user alice)"]);
        assert!(lines.iter().all(|l| !l.contains("hunter2")));
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = run_proxies(Path::new("/nonexistent/shopscope/proxies.txt"));
        assert!(result.is_err());
    }
}
