// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Phone extraction from a live page.

use super::FlowContext;
use crate::events::RunEvent;
use anyhow::{Context, Result};
use pagewright::{
    phone_extractor, ExtractionResult, InteractionRequest, PageContext, SelectorList,
};

/// Load `url`, optionally wait for `ready` to render, and run the phone
/// heuristics over the resulting document.
///
/// A page without a phone is a normal result, not an error.
pub async fn extract_phone(
    page: &mut dyn PageContext,
    ctx: &FlowContext<'_>,
    url: &str,
    ready: Option<&SelectorList>,
    country_code: u8,
) -> Result<ExtractionResult> {
    ctx.navigate(page, url).await?;

    if let Some(selectors) = ready {
        let outcome = ctx
            .interactor
            .interact(page, &ctx.request(InteractionRequest::wait_present(selectors.clone())))
            .await?;
        if !outcome.succeeded {
            tracing::debug!(url, "ready selector never appeared, extracting anyway");
        }
    }

    let html = page.html().await.context("failed to read page HTML")?;
    let result = phone_extractor(country_code).extract_html(&html);

    tracing::info!(
        url,
        found = result.is_found(),
        method = result.selected.as_ref().map(|s| s.method.as_str()).unwrap_or("none"),
        "phone extraction finished"
    );
    ctx.bus.emit(RunEvent::FieldExtracted {
        field: result.field.clone(),
        url: url.to_string(),
        value: result.final_value.clone(),
        method: result.selected.as_ref().map(|s| s.method.clone()),
        failure: result.failure.as_ref().map(|f| f.to_string()),
    });
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::events::EventBus;
    use pagewright::testing::ScriptedPage;
    use pagewright::ExtractionFailure;

    const LISTING: &str = r#"<html><body>
        <div class="contact"><i class="fa fa-phone"></i><span>(212) 555-1234</span></div>
        <a href="tel:+13105550000">Call us</a>
        <p>Fax 415 555 9999</p>
    </body></html>"#;

    #[tokio::test(start_paused = true)]
    async fn test_extract_prefers_icon_adjacent() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let ctx = FlowContext::from_config(&RunConfig::default(), &bus);
        let mut page = ScriptedPage::new().with_document("https://biz.example/", LISTING);

        let result = extract_phone(&mut page, &ctx, "https://biz.example/", None, 1)
            .await
            .unwrap();

        assert_eq!(result.final_value.as_deref(), Some("+12125551234"));
        assert_eq!(result.selected.unwrap().method, "icon_adjacent");

        let events: Vec<RunEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(matches!(
            events.last(),
            Some(RunEvent::FieldExtracted { value: Some(v), .. }) if v == "+12125551234"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_without_phone() {
        let bus = EventBus::default();
        let ctx = FlowContext::from_config(&RunConfig::default(), &bus);
        let mut page =
            ScriptedPage::new().with_document("https://biz.example/", "<p>Open daily</p>");

        let result = extract_phone(&mut page, &ctx, "https://biz.example/", None, 1)
            .await
            .unwrap();
        assert!(!result.is_found());
        assert_eq!(result.failure, Some(ExtractionFailure::NoCandidates));
    }
}
