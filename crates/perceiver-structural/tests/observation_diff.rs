//! Observation identity and diffing across realistic page captures.

use perceiver_structural::{ChangeKind, Diff, Observation};

const SETTINGS_BEFORE: &str = r#"
<html><head><title>Settings</title><script>track()</script></head>
<body>
  <nav><a href="/home">Home</a><a href="/settings">Settings</a></nav>
  <main>
    <h1>Settings</h1>
    <form id="profile">
      <label>Name <input name="name" value=""></label>
      <button type="submit">Save</button>
    </form>
  </main>
</body></html>"#;

const SETTINGS_AFTER: &str = r#"
<html><head><title>Settings</title><script>track(2)</script></head>
<body>
  <nav><a href="/home">Home</a><a href="/settings">Settings</a></nav>
  <main>
    <h1>Settings</h1>
    <form id="profile">
      <label>Name <input name="name" value=""></label>
      <p class="error">Name is required</p>
      <button type="submit">Save</button>
    </form>
  </main>
</body></html>"#;

fn settings(html: &str, aria: &str) -> Observation {
    Observation::new("https://app.example/settings/")
        .with_title("Settings")
        .with_h1("Settings")
        .with_html(html)
        .with_aria_snapshot(aria)
}

#[tokio::test]
async fn validation_message_shows_up_as_form_change() {
    let previous = settings(SETTINGS_BEFORE, "- heading \"Settings\"\n- button \"Save\"\n");
    let current = settings(
        SETTINGS_AFTER,
        "- heading \"Settings\"\n- text \"Name is required\"\n- button \"Save\"\n",
    );
    assert_eq!(previous.fingerprint(), current.fingerprint());

    let mut diff = Diff::new(current, Some(previous));
    diff.calculate().await.unwrap();

    let changes = diff.structural_changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Added);
    assert_eq!(
        diff.structural_subtree(),
        Some(r#"<p class="error">Name is required</p>"#)
    );
    assert_eq!(
        diff.accessibility_delta().added,
        vec!["- text \"Name is required\"".to_string()]
    );
    assert!(diff.summary().starts_with("1 structural change(s)"));
}

#[tokio::test]
async fn script_changes_are_ignored() {
    let previous = settings(SETTINGS_BEFORE, "");
    let current = settings(&SETTINGS_BEFORE.replace("track()", "track(3)"), "");
    let mut diff = Diff::new(current, Some(previous));
    diff.calculate().await.unwrap();
    assert!(!diff.has_changes());
}

#[tokio::test]
async fn recalculating_is_a_no_op() {
    let mut diff = Diff::new(
        settings(SETTINGS_AFTER, ""),
        Some(settings(SETTINGS_BEFORE, "")),
    );
    diff.calculate().await.unwrap();
    let first = diff.structural_delta().clone();
    diff.calculate().await.unwrap();
    assert_eq!(diff.structural_delta().total(), first.total());
}

#[test]
fn query_strings_do_not_split_states() {
    let plain = Observation::new("https://app.example/search").with_h1("Results");
    let queried = Observation::new("https://app.example/search?q=shoes").with_h1("Results");
    assert_eq!(plain.fingerprint(), queried.fingerprint());

    let tab = Observation::new("https://app.example/search#filters").with_h1("Results");
    assert_ne!(plain.fingerprint(), tab.fingerprint());
}

#[tokio::test]
async fn deeply_nested_page_diff_completes() {
    let page = |inner: &str| {
        Observation::new("https://app.example/a").with_html(format!(
            "<html><body>{}{inner}{}</body></html>",
            "<div>".repeat(20_000),
            "</div>".repeat(20_000)
        ))
    };

    let mut diff = Diff::new(page("new"), Some(page("old")));
    diff.calculate().await.unwrap();
    assert!(diff.has_changes());
    let kinds: Vec<ChangeKind> = diff.structural_changes().iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Removed, ChangeKind::Added]);
}
