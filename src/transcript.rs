//! Standalone HTML export of a chat session.

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::history::{ConversationHistory, Message, Role};
use crate::render::TextRenderer;

const STYLE: &str = "
body { font-family: system-ui, sans-serif; background: #f5f3ef; margin: 0; }
main { max-width: 720px; margin: 0 auto; padding: 32px 16px 60px; }
header h1 { font-size: 22px; margin: 0 0 4px; }
header p { color: #6b645c; font-size: 12px; margin: 0 0 24px; }
.row { display: flex; margin: 8px 0; }
.row.user { justify-content: flex-end; }
.row.assistant { justify-content: flex-start; }
.bubble { max-width: 80%; padding: 10px 14px; border-radius: 14px; line-height: 1.5; }
.bubble.user { background: #2f6fed; color: #fff; white-space: pre-wrap; }
.bubble.assistant { background: #fff; border: 1px solid #e4ded6; }
.bubble p:first-child { margin-top: 0; }
.bubble p:last-child { margin-bottom: 0; }
";

fn bubble(message: &Message, renderer: &impl TextRenderer) -> Markup {
    let role = message.role.as_str();
    html! {
        div class={"row " (role)} {
            div class={"bubble " (role)} {
                @if message.role == Role::Assistant {
                    (PreEscaped(renderer.render(&message.content)))
                } @else {
                    (message.content)
                }
            }
        }
    }
}

/// User text is escaped verbatim; assistant text goes through `renderer`.
pub fn render_html(
    organization: &str,
    history: &ConversationHistory,
    renderer: &impl TextRenderer,
    exported_at: OffsetDateTime,
) -> String {
    let exported = exported_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| exported_at.unix_timestamp().to_string());

    html! {
        (DOCTYPE)
        html lang="hi" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (organization) " AI" }
                style { (PreEscaped(STYLE)) }
            }
            body {
                main {
                    header {
                        h1 { (organization) " AI" }
                        p { (history.len()) " messages · " (exported) }
                    }
                    section {
                        @for message in history {
                            @if message.role != Role::System {
                                (bubble(message, renderer))
                            }
                        }
                    }
                }
            }
        }
    }
    .into_string()
}

pub fn write_html(
    path: &Path,
    organization: &str,
    history: &ConversationHistory,
    renderer: &impl TextRenderer,
) -> Result<()> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let page = render_html(organization, history, renderer, now);
    fs::write(path, page).with_context(|| format!("failed to write {}", path.display()))
}
