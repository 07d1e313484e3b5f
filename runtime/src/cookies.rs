// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cookie export and import as a JSON array.

use anyhow::{Context, Result};
use pagewright::{Cookie, PageContext};
use std::path::Path;

/// Write the page's cookies to `path`. Returns how many were written.
pub async fn export_cookies(page: &dyn PageContext, path: &Path) -> Result<usize> {
    let cookies = page.cookies().await.context("failed to read cookies")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&cookies)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write cookies: {}", path.display()))?;
    tracing::info!(count = cookies.len(), path = %path.display(), "cookies exported");
    Ok(cookies.len())
}

pub fn read_cookie_file(path: &Path) -> Result<Vec<Cookie>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read cookies: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid cookie file: {}", path.display()))
}

/// Load cookies from `path` into the page. Returns how many were set.
pub async fn import_cookies(page: &mut dyn PageContext, path: &Path) -> Result<usize> {
    let cookies = read_cookie_file(path)?;
    page.set_cookies(&cookies)
        .await
        .context("failed to set cookies")?;
    tracing::info!(count = cookies.len(), path = %path.display(), "cookies imported");
    Ok(cookies.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewright::testing::{PageCall, ScriptedPage};

    fn session_cookie() -> Cookie {
        Cookie {
            name: "sid".to_string(),
            value: "abc123".to_string(),
            domain: ".example.com".to_string(),
            path: "/".to_string(),
            expires: Some(1_900_000_000.0),
            http_only: true,
            secure: true,
        }
    }

    #[tokio::test]
    async fn test_export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/cookies.json");

        let source = ScriptedPage::new().with_cookies(vec![session_cookie()]);
        assert_eq!(export_cookies(&source, &path).await.unwrap(), 1);

        let mut target = ScriptedPage::new();
        let log = target.log();
        assert_eq!(import_cookies(&mut target, &path).await.unwrap(), 1);
        assert!(log.contains(&PageCall::SetCookies(1)));
        assert_eq!(target.cookies().await.unwrap(), vec![session_cookie()]);
    }

    #[test]
    fn test_minimal_cookie_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(
            &path,
            r#"[{"name": "a", "value": "1", "domain": "example.com"}]"#,
        )
        .unwrap();
        let cookies = read_cookie_file(&path).unwrap();
        assert_eq!(cookies[0].path, "/");
        assert!(cookies[0].expires.is_none());
    }

    #[test]
    fn test_invalid_cookie_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(read_cookie_file(&path).is_err());
    }
}
