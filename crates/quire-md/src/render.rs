//! Markdown to HTML rendering.

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::highlight::Highlighter;

/// Markdown extensions enabled for every page.
fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// Render a document body to HTML.
///
/// Code blocks and inline code are passed through `highlighter`; everything
/// else is plain pulldown-cmark output.
pub fn render_markdown(body: &str, highlighter: &Highlighter) -> String {
    let parser = Parser::new_ext(body, markdown_options());

    let mut events: Vec<Event> = Vec::new();
    let mut code_block: Option<(Option<String>, String)> = None; // (hint, source)

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let hint = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().map(str::to_string)
                    }
                    CodeBlockKind::Indented => None,
                };
                code_block = Some((hint, String::new()));
            }

            Event::Text(text) if code_block.is_some() => {
                if let Some((_, source)) = code_block.as_mut() {
                    source.push_str(&text);
                }
            }

            Event::End(TagEnd::CodeBlock) => {
                if let Some((hint, source)) = code_block.take() {
                    let html = highlighter.render_block(&source, hint.as_deref());
                    events.push(Event::Html(CowStr::from(html)));
                }
            }

            Event::Code(code) => match highlighter.render_inline(&code) {
                Some(html) => events.push(Event::InlineHtml(CowStr::from(html))),
                None => events.push(Event::Code(code)),
            },

            other => events.push(other),
        }
    }

    let mut html_output = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut html_output, events.into_iter());

    html_output
}
