use super::support::*;
use crate::*;
use std::sync::Arc;

const FLOW: &str = "graph TD\n  A-->B";

async fn materialize(html: &str) -> (Arc<FakeRenderer>, Materializer, PassReport) {
    let renderer = Arc::new(FakeRenderer::new());
    let m = Materializer::with_renderer(MaterializerConfig::default(), renderer.clone(), html);
    let report = m.ready().await.last().cloned().unwrap();
    (renderer, m, report)
}

#[tokio::test]
async fn renders_each_block_after_its_wrapper_and_hides_the_source() {
    let html = page_of(&[FLOW]);
    let (renderer, m, report) = materialize(&html).await;

    assert!(report.is_applied());
    assert_eq!(
        (report.attempted(), report.succeeded(), report.failed()),
        (1, 1, 0)
    );
    assert_eq!(report.blocks[0].source, Some(ExtractionSource::RawAttribute));
    assert_eq!(renderer.sources(), vec![FLOW.to_string()]);

    let out = m.html();
    let calls = renderer.calls();
    let (id, _) = &calls[0];
    assert!(id.starts_with("diagram-"), "{id}");
    assert!(id.ends_with("-1-0"), "{id}");
    assert!(out.contains(
        "<div class=\"expressive-code\" hidden=\"\" data-diagram-state=\"hidden\">"
    ));
    let wrapper_end = out.find("</figure></div>").unwrap();
    let graphic = out.find(&format!("<div id=\"{id}\"")).unwrap();
    assert!(graphic > wrapper_end, "{out}");
    assert_eq!(graphics(&out), 1);
}

#[tokio::test]
async fn repeated_passes_keep_one_graphic_per_block() {
    let html = page_of(&[FLOW, "pie\n  \"a\" : 1"]);
    let (renderer, m, _) = materialize(&html).await;
    let second = m.rerender().await;
    let third = m.rerender().await;

    assert!(second.last().unwrap().is_applied());
    assert!(third.last().unwrap().is_applied());
    let out = m.html();
    assert_eq!(graphics(&out), 2);
    assert_eq!(count(&out, "data-diagram-state=\"hidden\""), 2);
    assert_eq!(cleanup(&out).unwrap(), html);
    assert_eq!(renderer.calls().len(), 6);
}

#[tokio::test]
async fn blocks_render_in_document_order() {
    let html = page_of(&["graph TD\n  A", "graph TD\n  B", "graph TD\n  C"]);
    let (renderer, m, report) = materialize(&html).await;

    let indexes: Vec<usize> = report.blocks.iter().map(|b| b.index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
    assert_eq!(
        renderer.sources(),
        vec!["graph TD\n  A", "graph TD\n  B", "graph TD\n  C"]
    );

    let out = m.html();
    let positions: Vec<usize> = (0..3)
        .map(|i| out.find(&format!("data-diagram-index=\"{i}\"")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
}

#[tokio::test]
async fn failed_block_is_isolated_and_annotated() {
    let html = page_of(&[FLOW, "graph TD\n  INVALID -->", "sequenceDiagram\n  A->>B: hi"]);
    let (renderer, m, report) = materialize(&html).await;

    assert_eq!(renderer.calls().len(), 3);
    assert_eq!(
        (report.attempted(), report.succeeded(), report.failed()),
        (3, 2, 1)
    );
    assert_eq!(
        report.blocks[1].outcome,
        BlockOutcome::Failed {
            message: "Parse error on line 2".to_string()
        }
    );

    let out = m.html();
    assert_eq!(graphics(&out), 2);
    assert_eq!(annotations(&out), 1);
    assert_eq!(count(&out, "data-diagram-state=\"hidden\""), 2);
    assert_eq!(count(&out, "data-diagram-state=\"error\""), 1);
    assert!(out.contains("Diagram 2 could not be rendered: Parse error on line 2"));
    assert!(out.contains("INVALID --&gt;"), "{out}");
}

#[tokio::test]
async fn shared_wrapper_stays_visible_when_one_of_its_blocks_fails() {
    let body = concat!(
        "<div class=\"expressive-code\">",
        "<pre data-language=\"mermaid\"><code>graph TD\n  A--&gt;B</code></pre>",
        "<pre data-language=\"mermaid\"><code>graph TD\n  INVALID</code></pre>",
        "</div>",
    );
    let html = page("light", body);
    let (_, m, report) = materialize(&html).await;
    assert_eq!((report.succeeded(), report.failed()), (1, 1));

    let out = m.html();
    assert!(out.contains("<div class=\"expressive-code\"><pre"), "{out}");
    assert!(
        out.contains("<pre data-language=\"mermaid\" hidden=\"\" data-diagram-state=\"hidden\"><code>graph TD"),
        "{out}"
    );
    assert!(
        out.contains("<pre data-language=\"mermaid\" data-diagram-state=\"error\"><code>graph TD\n  INVALID"),
        "{out}"
    );
    let wrapper_end = out.find("</pre></div>").unwrap();
    assert!(out.find("data-diagram-output=\"graphic\"").unwrap() > wrapper_end, "{out}");
    assert!(out.find("data-diagram-output=\"error\"").unwrap() > wrapper_end, "{out}");
    assert_eq!(cleanup(&out).unwrap(), html);
}

#[tokio::test]
async fn empty_blocks_are_skipped_silently() {
    let html = page_of(&["\u{200b}\n   ", FLOW]);
    let (renderer, m, report) = materialize(&html).await;

    assert_eq!(renderer.sources(), vec![FLOW.to_string()]);
    assert_eq!(report.blocks[0].outcome, BlockOutcome::Skipped);
    assert_eq!((report.attempted(), report.skipped()), (1, 1));

    let out = m.html();
    assert_eq!(graphics(&out), 1);
    assert_eq!(annotations(&out), 0);
    assert_eq!(count(&out, "data-diagram-state"), 1);
}

#[tokio::test]
async fn line_markup_is_used_without_a_copy_button() {
    let body = concat!(
        "<div class=\"expressive-code\"><figure><pre data-language=\"mermaid\"><code>",
        "<div class=\"ec-line\"><div class=\"code\"><span>graph</span><span> LR</span></div></div>",
        "<div class=\"ec-line\"><div class=\"code\"><span class=\"indent\">  </span><span>A --&gt; B</span></div></div>",
        "</code></pre></figure></div>",
    );
    let (renderer, _, report) = materialize(&page("light", body)).await;

    assert_eq!(report.blocks[0].source, Some(ExtractionSource::LineMarkup));
    assert_eq!(renderer.sources(), vec!["graph LR\n  A --> B".to_string()]);
}

#[tokio::test]
async fn plain_code_blocks_use_their_text() {
    let body = "<pre><code class=\"language-mermaid\">graph TD\r\n  A[&quot;x&quot;] --&gt; B\u{a0}\r\n</code></pre>";
    let (renderer, m, report) = materialize(&page("light", body)).await;

    assert_eq!(report.blocks[0].source, Some(ExtractionSource::CodeText));
    assert_eq!(
        renderer.sources(),
        vec!["graph TD\n  A[\"x\"] --> B".to_string()]
    );
    let out = m.html();
    assert!(out.contains("<pre hidden=\"\" data-diagram-state=\"hidden\"><code"), "{out}");
}

#[tokio::test]
async fn legacy_subgraphs_are_repaired_across_blocks() {
    let html = page_of(&[
        "flowchart TD\n  subgraph one (First \"group\")\n    A\n  end",
        "flowchart TD\n  subgraph [\"Anon\"]\n    B\n  end",
        "flowchart TD\n  subgraph \"Other\"\n    C\n  end",
    ]);
    let (renderer, _, _) = materialize(&html).await;

    let sources = renderer.sources();
    assert!(
        sources[0].contains("subgraph one[\"First #quot;group#quot;\"]"),
        "{}",
        sources[0]
    );
    assert!(sources[1].contains("subgraph SG_AUTO_1[\"Anon\"]"), "{}", sources[1]);
    assert!(sources[2].contains("subgraph SG_AUTO_2[\"Other\"]"), "{}", sources[2]);
}

#[tokio::test]
async fn markup_outside_the_pipeline_is_untouched() {
    let body = format!(
        "<p hidden>note &amp; more</p><pre data-language=\"rust\"><code>fn main() {{}}</code></pre>{}",
        ec_block(FLOW)
    );
    let html = format!(
        "<html data-theme=\"light\"><body><aside><pre data-language=\"mermaid\">graph TD</pre></aside><main class=\"sl-markdown-content\">{body}</main></body></html>"
    );
    let (renderer, m, report) = materialize(&html).await;

    assert_eq!(report.blocks.len(), 1);
    assert_eq!(renderer.calls().len(), 1);
    assert_eq!(cleanup(&m.html()).unwrap(), html);
}

#[tokio::test]
async fn display_mode_selects_the_renderer_theme() {
    let (renderer, _, report) = materialize(&page("dark", &ec_block(FLOW))).await;
    assert_eq!(report.display_mode, Some(DisplayMode::Dark));
    assert_eq!(
        renderer.configs(),
        vec![RenderConfig {
            theme: "dark".to_string(),
            security_level: "loose".to_string(),
            suppress_error_rendering: true,
            start_on_load: false,
        }]
    );

    let bare = format!("<main class=\"sl-markdown-content\">{}</main>", ec_block(FLOW));
    let (renderer, _, report) = materialize(&bare).await;
    assert_eq!(report.display_mode, Some(DisplayMode::Light));
    assert_eq!(renderer.configs()[0].theme, "default");
}

#[tokio::test]
async fn binding_runs_against_the_container() {
    struct Zoomable;

    #[async_trait::async_trait]
    impl DiagramRenderer for Zoomable {
        async fn initialize(&self, _: &RenderConfig) -> Result<()> {
            Ok(())
        }

        async fn render(
            &self,
            _id: &str,
            _source: &str,
        ) -> std::result::Result<RenderedDiagram, RenderFailure> {
            Ok(RenderedDiagram::new("<svg></svg>").with_binding(|container| {
                container.classes.push("zoomable".to_string());
                container.set_attribute("data-bound", "true");
            }))
        }
    }

    let m = Materializer::with_renderer(
        MaterializerConfig::default(),
        Arc::new(Zoomable),
        page_of(&[FLOW]),
    );
    m.ready().await;
    let out = m.html();
    assert!(out.contains("class=\"diagram-rendered zoomable\""), "{out}");
    assert!(out.contains("data-bound=\"true\"><svg></svg></div>"), "{out}");
}

#[test]
fn inspect_reports_normalized_sources() {
    let html = page_of(&["graph TD\u{200b}\n  A-->B   ", "  "]);
    let blocks = inspect(&html, &MaterializerConfig::default()).unwrap();
    assert_eq!(
        blocks,
        vec![
            InspectedBlock {
                index: 0,
                source: Some(ExtractionSource::RawAttribute),
                text: FLOW.to_string(),
            },
            InspectedBlock {
                index: 1,
                source: None,
                text: String::new(),
            },
        ]
    );
}

#[test]
fn invalid_selector_is_a_configuration_error() {
    let config = MaterializerConfig {
        content_selector: "main[".to_string(),
        ..MaterializerConfig::default()
    };
    let err = inspect("<main></main>", &config).unwrap_err();
    assert!(matches!(err, Error::Config { .. }), "{err}");
}
