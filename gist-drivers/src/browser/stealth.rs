use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Levels of stealth applied to the browser session.
pub enum StealthProfile {
    Lightweight,
    #[default]
    Balanced,
    Maximum,
}

const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

/// Pick one plausible desktop user agent for the session.
pub fn pick_user_agent() -> &'static str {
    DESKTOP_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

/// Construct Chrome command-line arguments for a given stealth profile.
pub fn build_stealth_arguments(profile: &StealthProfile, user_agent: &str) -> Vec<String> {
    let mut args = vec![
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        "--window-size=1366,900".to_string(),
        "--lang=en-US".to_string(),
    ];
    if *profile != StealthProfile::Lightweight {
        args.push("--disable-blink-features=AutomationControlled".to_string());
        args.push("--disable-infobars".to_string());
        args.push(format!("--user-agent={user_agent}"));
    }
    args
}

/// JavaScript evasions applied after each navigation to reduce automation signals.
pub struct StealthScripts;

impl StealthScripts {
    pub fn core_evasions() -> &'static str {
        r#"
            Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
            Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
            if (!window.chrome) window.chrome = { runtime: {} };
        "#
    }
    pub fn webgl_evasions() -> &'static str {
        r#"
            const getParameter = WebGLRenderingContext.prototype.getParameter;
            WebGLRenderingContext.prototype.getParameter = function(parameter) {
                if (parameter === 37445) return 'Intel Inc.';
                if (parameter === 37446) return 'Intel Iris OpenGL Engine';
                return getParameter.call(this, parameter);
            };
        "#
    }
    pub fn canvas_evasions() -> &'static str {
        r#"
            const toDataURL = HTMLCanvasElement.prototype.toDataURL;
            HTMLCanvasElement.prototype.toDataURL = function(...args) {
                const ctx = this.getContext('2d');
                if (ctx && this.width && this.height) {
                    const img = ctx.getImageData(0, 0, 1, 1);
                    img.data[0] = img.data[0] ^ 1;
                    ctx.putImageData(img, 0, 0);
                }
                return toDataURL.apply(this, args);
            };
        "#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lightweight_profile_keeps_default_user_agent() {
        let args = build_stealth_arguments(&StealthProfile::Lightweight, "UA");
        assert!(!args.iter().any(|a| a.starts_with("--user-agent")));
    }

    #[test]
    fn balanced_profile_sets_user_agent() {
        let ua = pick_user_agent();
        let args = build_stealth_arguments(&StealthProfile::Balanced, ua);
        assert!(args.contains(&format!("--user-agent={ua}")));
        assert!(args.iter().any(|a| a.contains("AutomationControlled")));
    }
}
