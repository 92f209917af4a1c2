use url::Url;

const COMPONENT_LIMIT: usize = 100;
const FINGERPRINT_LIMIT: usize = 200;
const ROOT_FINGERPRINT: &str = "root";
const PLACEHOLDER_ORIGIN: &str = "http://placeholder.invalid/";

/// Strip trailing slashes; an empty result becomes `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Path plus fragment of `url`. Relative URLs resolve against a placeholder
/// origin; a missing or unparseable URL yields `/`.
pub fn relative_path(url: Option<&str>) -> String {
    let Some(raw) = url.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return "/".to_string();
    };
    let parsed = Url::parse(raw)
        .or_else(|_| Url::parse(PLACEHOLDER_ORIGIN).and_then(|base| base.join(raw)));
    match parsed {
        Ok(url) => {
            let mut path = normalize_path(url.path());
            if let Some(fragment) = url.fragment().filter(|f| !f.is_empty()) {
                path.push('#');
                path.push_str(fragment);
            }
            normalize_path(&path)
        }
        Err(_) => "/".to_string(),
    }
}

/// Canonical identity key for a relative path and its top two headings.
///
/// Structural content is deliberately not part of the key, so pages that
/// share a path and both headings collide.
pub fn fingerprint(relative_path: &str, h1: Option<&str>, h2: Option<&str>) -> String {
    let mut parts = vec![truncate(relative_path, COMPONENT_LIMIT)];
    for heading in [h1, h2].into_iter().flatten() {
        let heading = heading.trim();
        if !heading.is_empty() {
            parts.push(truncate(heading, COMPONENT_LIMIT));
        }
    }

    let joined = parts.join("_").to_lowercase();
    let mut sanitized = String::with_capacity(joined.len());
    for ch in joined.chars() {
        let ch = if ch.is_ascii_alphanumeric() || ch == '_' {
            ch
        } else {
            '_'
        };
        if ch == '_' && sanitized.ends_with('_') {
            continue;
        }
        sanitized.push(ch);
    }

    let mut capped = truncate(sanitized.trim_matches('_'), FINGERPRINT_LIMIT);
    while capped.ends_with('_') {
        capped.pop();
    }
    if capped.is_empty() {
        ROOT_FINGERPRINT.to_string()
    } else {
        capped
    }
}

fn truncate(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Observation;

    #[test]
    fn login_page_fingerprint() {
        let obs = Observation::new("https://x.example/login")
            .with_h1("Sign In")
            .with_html("<main><p>Promo: 50% off today only!</p></main>");
        let fp = obs.fingerprint();
        assert_eq!(fp, "login_sign_in");
        assert!(fp.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        assert!(!fp.contains("promo"));
    }

    #[test]
    fn ignores_structural_content() {
        let a = Observation::new("https://x.example/cart")
            .with_h1("Cart")
            .with_html("<div>token=abc</div>");
        let b = Observation::new("https://x.example/cart")
            .with_h1("Cart")
            .with_html("<div>token=xyz</div><aside>ad</aside>")
            .with_aria_snapshot("- link \"Checkout\"");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a.fingerprint());
    }

    #[test]
    fn sensitive_to_path_and_top_headings() {
        let base = Observation::new("https://x.example/cart").with_h1("Cart");
        let other_path = Observation::new("https://x.example/checkout").with_h1("Cart");
        let other_h1 = Observation::new("https://x.example/cart").with_h1("Basket");
        let with_h2 = Observation::new("https://x.example/cart")
            .with_h1("Cart")
            .with_h2("Empty");
        assert_ne!(base.fingerprint(), other_path.fingerprint());
        assert_ne!(base.fingerprint(), other_h1.fingerprint());
        assert_ne!(base.fingerprint(), with_h2.fingerprint());
    }

    #[test]
    fn lower_headings_do_not_participate() {
        let mut a = Observation::new("https://x.example/cart").with_h1("Cart");
        let b = a.clone();
        a.headings.h3 = Some("Recommended".into());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn components_and_total_are_capped() {
        let long_path = format!("/{}", "a".repeat(150));
        let long_heading = "b".repeat(150);
        let fp = fingerprint(&long_path, Some(&long_heading), Some(&long_heading));
        assert!(fp.len() <= FINGERPRINT_LIMIT);
        assert!(!fp.ends_with('_'));
        assert!(fp.starts_with(&"a".repeat(99)));
    }

    #[test]
    fn truncation_does_not_leave_trailing_underscore() {
        let path = format!("/{}", "x".repeat(99));
        let heading = "z".repeat(99);
        // sanitized form is 99x_99z_q, so the cap lands right after an underscore
        let fp = fingerprint(&path, Some(&heading), Some("q"));
        assert!(!fp.ends_with('_'));
        assert_eq!(fp.len(), 199);
    }

    #[test]
    fn collapses_and_trims_underscores() {
        assert_eq!(
            fingerprint("/a//b", Some("  Hello -- World!! "), None),
            "a_b_hello_world"
        );
        assert_eq!(fingerprint("/", None, Some("   ")), "root");
    }

    #[test]
    fn relative_paths() {
        assert_eq!(relative_path(None), "/");
        assert_eq!(relative_path(Some("")), "/");
        assert_eq!(relative_path(Some("/login/")), "/login");
        assert_eq!(relative_path(Some("https://x.example/#/inbox/")), "/#/inbox");
        assert_eq!(relative_path(Some("https://x.example/a?b=1")), "/a");
        assert_eq!(normalize_path("/settings///"), "/settings");
        assert_eq!(normalize_path(""), "/");
    }
}
