//! Text renderers used by presenters.

use pulldown_cmark::{Event, Options, Parser, html};

pub trait TextRenderer {
    fn render(&self, text: &str) -> String;
}

/// Passes text through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainText;

impl TextRenderer for PlainText {
    fn render(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Markdown to HTML. Raw HTML in the source is dropped, not passed through.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownHtml;

impl TextRenderer for MarkdownHtml {
    fn render(&self, text: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let parser = Parser::new_ext(text, options).filter_map(|event| match event {
            Event::Html(_) | Event::InlineHtml(_) => None,
            other => Some(other),
        });

        let mut out = String::new();
        html::push_html(&mut out, parser);
        out
    }
}
