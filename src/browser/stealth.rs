//! Patches evaluated before any page script runs, hiding the usual
//! automation tells from bot-detection code.

pub const STEALTH_SCRIPTS: &[&str] = &[
    // navigator.webdriver
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Plugins list of a stock desktop Chrome
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en', 'fr'],
        configurable: true
    });
    "#,
    r#"
    window.chrome = window.chrome || {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    r#"
    if (window.navigator.permissions && window.navigator.permissions.query) {
        const originalQuery = window.navigator.permissions.query;
        window.navigator.permissions.query = (parameters) => (
            parameters.name === 'notifications' ?
                Promise.resolve({ state: Notification.permission }) :
                originalQuery(parameters)
        );
    }
    "#,
];

/// All patches joined into one script for a single CDP call.
pub fn stealth_script() -> String {
    STEALTH_SCRIPTS
        .iter()
        .map(|s| format!("try {{ {} }} catch (e) {{}}", s.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}
