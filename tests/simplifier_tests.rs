use smart_locator::browser::dom::DomElement;
use smart_locator::simplify::simplifier::{MAX_TEXT_CHARS, render_digest, simplify};

mod common;
use common::{FakePage, login_page_elements};

#[test]
fn login_page_digest() {
    let digest = render_digest(&login_page_elements());
    assert_eq!(
        digest,
        "<h1>Welcome back</h1>\n\
         <input id=\"email\" type=\"email\">\n\
         <button data-testid=\"login-submit\">Sign in</button>"
    );
}

#[test]
fn text_less_containers_are_dropped() {
    let elements = vec![
        DomElement::new("div").with_class("wrapper"),
        DomElement::new("span").with_text("   "),
        DomElement::new("p").with_text("Forgot your password?"),
    ];
    assert_eq!(render_digest(&elements), "<p>Forgot your password?</p>");
}

#[test]
fn unknown_tags_are_dropped() {
    let elements = vec![
        DomElement::new("script").with_text("var x = 1;"),
        DomElement::new("svg").with_attr("aria-label", "logo"),
        DomElement::new("a").with_attr("href", "/help").with_text("Help"),
    ];
    assert_eq!(render_digest(&elements), "<a href=\"/help\">Help</a>");
}

#[test]
fn attributes_follow_fixed_order_and_skip_blanks() {
    let element = DomElement::new("INPUT")
        .with_attr("type", "password")
        .with_attr("name", "password")
        .with_attr("placeholder", "Password")
        .with_attr("role", "")
        .with_id("pw");

    assert_eq!(
        render_digest(&[element]),
        "<input id=\"pw\" name=\"password\" placeholder=\"Password\" type=\"password\">"
    );
}

#[test]
fn quotes_are_escaped_and_whitespace_collapsed() {
    let element = DomElement::new("button")
        .with_attr("aria-label", "Say \"hi\"")
        .with_text("  Say\n   hi  ");
    assert_eq!(
        render_digest(&[element]),
        "<button aria-label=\"Say &quot;hi&quot;\">Say hi</button>"
    );
}

#[test]
fn long_text_is_truncated() {
    let long = "x".repeat(MAX_TEXT_CHARS + 50);
    let digest = render_digest(&[DomElement::new("label").with_text(&long)]);

    let expected = format!("<label>{}…</label>", "x".repeat(MAX_TEXT_CHARS));
    assert_eq!(digest, expected);
}

#[test]
fn simplify_reads_live_page() {
    let mut page = FakePage::new().with_elements(login_page_elements());
    assert_eq!(simplify(&mut page).lines().count(), 3);
}

#[test]
fn failed_extraction_yields_empty_digest() {
    let mut page = FakePage::new().with_broken_extract();
    assert_eq!(simplify(&mut page), "");
}
