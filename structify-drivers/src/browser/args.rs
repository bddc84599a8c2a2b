/// Construct Chrome command-line arguments for a call-scoped session.
///
/// The user agent is pinned so the rendered fetch presents the same identity
/// as the static one.
pub fn build_browser_arguments(headless: bool, user_agent: &str) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        format!("--user-agent={user_agent}"),
        "--window-size=1920,1080".to_string(),
        "--lang=en-US,en".to_string(),
    ];
    if headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_flags_only_when_requested() {
        let visible = build_browser_arguments(false, "ua");
        assert!(!visible.iter().any(|a| a.starts_with("--headless")));

        let headless = build_browser_arguments(true, "ua");
        assert!(headless.contains(&"--headless=new".to_string()));
        assert!(headless.contains(&"--disable-gpu".to_string()));
    }

    #[test]
    fn user_agent_is_pinned() {
        let args = build_browser_arguments(true, "Mozilla/5.0 test");
        assert!(args.contains(&"--user-agent=Mozilla/5.0 test".to_string()));
    }
}
