//! Integration tests: mount → scan → regenerate → mount → scan.
//!
//! At every settled state the source, once mounted, must scan to the layer
//! tree that produced it.

use pretty_assertions::assert_eq;
use pw_core::generator::{GeneratorConfig, regenerate};
use pw_core::id::ElementTag;
use pw_core::render::mount;
use pw_core::scanner::{LayerTree, scan};

// ─── Helpers ─────────────────────────────────────────────────────────────

fn layers(source: &str) -> LayerTree {
    let dom = mount(source).expect("mount failed");
    scan(&dom).into_layers().expect("no layers").snapshot()
}

fn regenerate_from(source: &str) -> String {
    let dom = mount(source).expect("mount failed");
    regenerate(&dom, &GeneratorConfig::from_source(source)).expect("regenerate failed")
}

/// Regenerated source scans to the same layers and is a fixpoint.
fn assert_roundtrip(source: &str) {
    let generated = regenerate_from(source);
    assert_eq!(
        layers(source),
        layers(&generated),
        "layer tree changed after regeneration.\nGenerated:\n{generated}"
    );
    assert_eq!(generated, regenerate_from(&generated), "regeneration is not a fixpoint");
}

// ─── Fixture-based tests ─────────────────────────────────────────────────

#[test]
fn roundtrip_landing_fixture() {
    assert_roundtrip(include_str!("fixtures/landing.jsx"));
}

#[test]
fn roundtrip_minimal_fixture() {
    assert_roundtrip(include_str!("fixtures/minimal.jsx"));
}

#[test]
fn roundtrip_no_container_fixture() {
    assert_roundtrip(include_str!("fixtures/no_container.jsx"));
}

// ─── Details that must survive ───────────────────────────────────────────

#[test]
fn boilerplate_is_preserved() {
    let generated = regenerate_from(include_str!("fixtures/landing.jsx"));
    assert!(generated.starts_with("import React from 'react';\nimport './landing.css';\n\nexport default function Landing() {\n"));
}

#[test]
fn landing_regenerates_canonically() {
    let generated = regenerate_from(include_str!("fixtures/landing.jsx"));
    let expected = r#"import React from 'react';
import './landing.css';

export default function Landing() {
  return (
    <div data-tag="root" className="page">
      <header data-tag="header" className="site-header">
        <img data-tag="logo" src="/logo.svg" alt="Acme" />
        <nav data-tag="nav">
          <a data-tag="nav-home" href="/">Home</a>
          <a data-tag="nav-pricing" href="/pricing">Pricing</a>
        </nav>
      </header>
      <section data-tag="hero" style={{ padding: '48px 24px', backgroundColor: '#0f172a' }}>
        <h1 data-tag="hero-title" style={{ color: 'white', fontSize: '48px' }}>Build pages visually &amp; fast</h1>
        <p data-tag="hero-copy">Ship &lt;landing pages&gt; without touching code.</p>
        <button data-tag="hero-cta" type="button">Get started</button>
      </section>
      <div data-tag="container" className="content">
        <article data-tag="card-1" className="card">
          <h2 data-tag="card-1-title">Fast</h2>
          <p data-tag="card-1-body">Edits land in source instantly.</p>
        </article>
        <article data-tag="card-2" className="card" data-locked>
          <h2 data-tag="card-2-title">Safe</h2>
          <input data-tag="signup-email" type="email" placeholder="you@example.com" />
        </article>
      </div>
      <footer data-tag="footer">© 2026 Acme</footer>
    </div>
  );
}
"#;
    assert_eq!(generated, expected);
}

#[test]
fn layer_flags_survive() {
    let tree = layers(include_str!("fixtures/landing.jsx"));
    let card = tree.get(ElementTag::intern("card-2")).unwrap();
    assert!(card.locked);
    assert_eq!(card.name, "card-2");
    let title = tree.get(ElementTag::intern("hero-title")).unwrap();
    assert_eq!(title.parent, Some(ElementTag::intern("hero")));
    assert_eq!(title.depth, 2);
}

#[test]
fn text_with_braces_roundtrips() {
    let src = "export default function App() {\n  return (\n    <div data-tag=\"root\">\n      <code data-tag=\"snippet\">{'{ a: 1 }'}</code>\n    </div>\n  );\n}\n";
    let generated = regenerate_from(src);
    assert!(generated.contains("<code data-tag=\"snippet\">&#123; a: 1 &#125;</code>"));
    let dom = mount(&generated).unwrap();
    let snippet = dom.find_by_tag("snippet").unwrap();
    assert_eq!(dom.text_content(snippet), "{ a: 1 }");
}
