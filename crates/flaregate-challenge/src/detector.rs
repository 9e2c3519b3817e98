//! Challenge detection: probes a live page's DOM, in a fixed priority
//! order, to classify which anti-bot challenge (if any) it is showing.

use flaregate_core::Page;
use serde::{Deserialize, Serialize};

/// The kind of anti-bot challenge a page is currently presenting, or `None`
/// if the page looks like ordinary content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChallengeKind {
    /// Cloudflare's short-lived "checking your browser" JS computation.
    CfJs,
    /// Cloudflare's managed-challenge interstitial ("just a moment",
    /// "attention required", "one more step") — may embed a Turnstile.
    CfInterstitial,
    /// Cloudflare Turnstile widget.
    Turnstile,
    /// hCaptcha widget.
    HCaptcha,
    /// Google reCAPTCHA v2 (checkbox/image challenge).
    RecaptchaV2,
    /// Google reCAPTCHA v3 (invisible, score-based).
    RecaptchaV3,
    /// DDoS-Guard interstitial.
    DdosGuard,
    /// Some anti-bot page was detected but none of the known families
    /// matched precisely enough to classify or solve it.
    Unknown,
    /// No known challenge detected.
    None,
}

/// Everything a solver needs beyond the bare challenge kind: the widget's
/// site key and, where applicable, the reCAPTCHA v3 action and Turnstile
/// `cData` a provider task must echo back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub kind: ChallengeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdata: Option<String>,
}

impl Default for ChallengeKind {
    fn default() -> Self {
        ChallengeKind::None
    }
}

/// A single JS probe executed in the page, returning a JSON object
/// `{kind, siteKey, action, cdata}` for the first matching challenge
/// family in priority order. Kept as one round trip rather than one
/// `query_selector` per candidate.
const PROBE_SCRIPT: &str = r#"(function() {
    const title = (document.title || "").toLowerCase();
    const body = document.body ? document.body.innerHTML : "";
    const lowerBody = body.toLowerCase();

    const result = (kind, siteKey, action, cdata) => JSON.stringify({
        kind: kind, siteKey: siteKey || null, action: action || null, cdata: cdata || null,
    });

    if (title.includes("checking your browser")
        || document.querySelector("#cf-challenge-running")) {
        return result("cfJs");
    }

    if (title.includes("just a moment")
        || title.includes("attention required")
        || title.includes("one more step")
        || title.includes("verify you are human")
        || document.querySelector("#cf-browser-verification")
        || document.querySelector(".challenge-running")) {
        return result("cfInterstitial");
    }

    const turnstileEl = document.querySelector('iframe[src*="challenges.cloudflare.com"]')
        || document.querySelector(".cf-turnstile")
        || document.querySelector("[data-sitekey][data-callback]");
    if (turnstileEl) {
        return result(
            "turnstile",
            turnstileEl.getAttribute && turnstileEl.getAttribute("data-sitekey"),
            turnstileEl.getAttribute && turnstileEl.getAttribute("data-action"),
            turnstileEl.getAttribute && turnstileEl.getAttribute("data-cdata")
        );
    }

    const hcaptchaEl = document.querySelector('iframe[src*="hcaptcha.com"]')
        || document.querySelector(".h-captcha")
        || document.querySelector("[data-hcaptcha-sitekey]");
    if (hcaptchaEl) {
        return result(
            "hCaptcha",
            hcaptchaEl.getAttribute && (hcaptchaEl.getAttribute("data-sitekey") || hcaptchaEl.getAttribute("data-hcaptcha-sitekey"))
        );
    }

    const recaptchaEl = document.querySelector(".g-recaptcha") || document.querySelector('iframe[src*="recaptcha"]');
    if (recaptchaEl) {
        const siteKey = recaptchaEl.getAttribute && recaptchaEl.getAttribute("data-sitekey");
        return result("recaptchaV2", siteKey);
    }

    if (window.grecaptcha && typeof window.grecaptcha.execute === "function") {
        const script = document.querySelector('script[src*="recaptcha/api.js"][src*="render="]');
        let siteKey = null;
        if (script) {
            const match = script.src.match(/render=([^&]+)/);
            siteKey = match ? match[1] : null;
        }
        return result("recaptchaV3", siteKey, "submit");
    }

    if (title.includes("ddos-guard")
        || document.querySelector('meta[name="ddos-guard"]')
        || body.includes("DDoS-Guard")) {
        return result("ddosGuard");
    }

    if (title.includes("access denied")
        || lowerBody.includes("captcha")
        || lowerBody.includes("bot detection")) {
        return result("unknown");
    }

    return result("none");
})()"#;

#[derive(Deserialize)]
struct RawDetection {
    kind: String,
    site_key: Option<String>,
    action: Option<String>,
    cdata: Option<String>,
}

/// Probes the page and classifies the current challenge, with whatever
/// widget metadata (site key, action, cdata) the probe could read out of
/// the DOM.
pub async fn detect(page: &Page) -> flaregate_core::Result<Detection> {
    let raw: String = page.evaluate(PROBE_SCRIPT).await?;
    let parsed: RawDetection = serde_json::from_str(&raw).unwrap_or(RawDetection {
        kind: "none".to_string(),
        site_key: None,
        action: None,
        cdata: None,
    });

    let kind = match parsed.kind.as_str() {
        "cfJs" => ChallengeKind::CfJs,
        "cfInterstitial" => ChallengeKind::CfInterstitial,
        "turnstile" => ChallengeKind::Turnstile,
        "hCaptcha" => ChallengeKind::HCaptcha,
        "recaptchaV2" => ChallengeKind::RecaptchaV2,
        "recaptchaV3" => ChallengeKind::RecaptchaV3,
        "ddosGuard" => ChallengeKind::DdosGuard,
        "unknown" => ChallengeKind::Unknown,
        _ => ChallengeKind::None,
    };

    Ok(Detection {
        kind,
        site_key: parsed.site_key,
        action: parsed.action,
        cdata: parsed.cdata,
    })
}

/// Polls `detect` until a challenge resolves to `None` or the timeout
/// elapses, returning the last observed kind.
pub async fn wait_for_resolution(
    page: &Page,
    timeout: std::time::Duration,
) -> flaregate_core::Result<ChallengeKind> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut last = detect(page).await?.kind;

    while last != ChallengeKind::None && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        last = detect(page).await?.kind;
    }

    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn challenge_kind_roundtrips_through_serde() {
        let json = serde_json::to_string(&ChallengeKind::Turnstile).unwrap();
        assert_eq!(json, "\"turnstile\"");
        let parsed: ChallengeKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ChallengeKind::Turnstile);
    }

    #[test]
    fn recaptcha_v2_and_v3_are_distinct_variants() {
        assert_ne!(ChallengeKind::RecaptchaV2, ChallengeKind::RecaptchaV3);
        let json = serde_json::to_string(&ChallengeKind::RecaptchaV3).unwrap();
        assert_eq!(json, "\"recaptchaV3\"");
    }

    #[test]
    fn detection_omits_absent_metadata_fields() {
        let detection = Detection { kind: ChallengeKind::CfJs, site_key: None, action: None, cdata: None };
        let json = serde_json::to_value(&detection).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "cfJs" }));
    }
}
