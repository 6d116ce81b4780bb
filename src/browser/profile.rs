use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;

pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

pub const BASE_VIEWPORT_WIDTH: u32 = 1366;
pub const BASE_VIEWPORT_HEIGHT: u32 = 768;
/// Width and height each get up to this many extra pixels.
pub const VIEWPORT_JITTER: u32 = 100;

pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,fr;q=0.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Fingerprint applied to a freshly opened page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageProfile {
    pub user_agent: String,
    pub viewport: Viewport,
    pub headers: Vec<(&'static str, String)>,
}

impl PageProfile {
    pub fn random() -> Self {
        Self::random_with(&mut rand::rng())
    }

    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let user_agent = USER_AGENTS
            .choose(rng)
            .copied()
            .unwrap_or(USER_AGENTS[0])
            .to_string();

        let viewport = Viewport {
            width: BASE_VIEWPORT_WIDTH + rng.random_range(0..VIEWPORT_JITTER),
            height: BASE_VIEWPORT_HEIGHT + rng.random_range(0..VIEWPORT_JITTER),
        };

        PageProfile {
            user_agent,
            viewport,
            headers: default_headers(),
        }
    }
}

/// Headers a desktop browser sends on a top-level navigation.
pub fn default_headers() -> Vec<(&'static str, String)> {
    [
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
        ("Accept-Language", ACCEPT_LANGUAGE),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("DNT", "1"),
        ("Connection", "keep-alive"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Cache-Control", "max-age=0"),
    ]
    .into_iter()
    .map(|(name, value)| (name, value.to_string()))
    .collect()
}
