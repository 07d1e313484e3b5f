// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pagewright cookies export|import`: move a browser session between runs.

use super::{output, App};
use crate::cookies::{export_cookies, import_cookies};
use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone, clap::Subcommand)]
pub enum CookiesAction {
    /// Load a page and save its cookies as JSON
    Export {
        url: String,
        /// Output file
        path: PathBuf,
    },
    /// Set cookies from a JSON file, then load a page with them
    Import {
        /// Input file
        path: PathBuf,
        url: String,
    },
}

pub async fn run(app: &App, action: &CookiesAction) -> Result<()> {
    let renderer = app.renderer().await?;
    let ctx = app.flow_context();
    let mut session = app.session(&renderer).await?;

    let result = async {
        match action {
            CookiesAction::Export { url, path } => {
                let nav = ctx.navigate(session.page_mut(), url).await?;
                let count = export_cookies(session.page_mut(), path).await?;
                Ok::<_, anyhow::Error>((count, nav.final_url))
            }
            CookiesAction::Import { path, url } => {
                let count = import_cookies(session.page_mut(), path).await?;
                let nav = ctx.navigate(session.page_mut(), url).await?;
                Ok((count, nav.final_url))
            }
        }
    }
    .await;
    let result = session.finish(result).await;
    app.release(&renderer).await;
    let (count, final_url) = result?;

    if app.json {
        output::print_json(&serde_json::json!({
            "cookies": count,
            "final_url": final_url,
        }));
    } else {
        let verb = match action {
            CookiesAction::Export { .. } => "Exported",
            CookiesAction::Import { .. } => "Imported",
        };
        println!("{verb} {count} cookie(s); page at {final_url}");
    }
    Ok(())
}
