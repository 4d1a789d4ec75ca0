//! Markdown rendering with syntax highlighting

use std::collections::HashSet;

use lazy_static::lazy_static;
use pulldown_cmark::{
    html, CodeBlockKind, CowStr, Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd,
};
use regex::Regex;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::error::{Error, Result};

lazy_static! {
    static ref BARE_URL: Regex = Regex::new(r"\bhttps?://[^\s<>]+").unwrap();
}

/// Which Markdown dialect to render with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// CommonMark only; used for the index listing
    Plain,
    /// GFM extensions, highlighted code, heading anchors and bare-URL links;
    /// used for single posts
    Rich,
}

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
    line_numbers: bool,
}

impl MarkdownRenderer {
    /// Create a new markdown renderer
    pub fn new() -> Self {
        Self::with_options("base16-ocean.dark", false)
    }

    /// Create with custom settings
    pub fn with_options(theme: &str, line_numbers: bool) -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            theme_name: theme.to_string(),
            line_numbers,
        }
    }

    /// Render markdown to HTML.
    ///
    /// Raw HTML in the source is emitted as escaped text and script-capable
    /// link targets are dropped, so the output can be embedded unescaped.
    pub fn render(&self, markdown: &str, profile: Profile) -> Result<String> {
        match profile {
            Profile::Plain => {
                let parser = Parser::new_ext(markdown, Options::empty()).map(neutralize);
                let mut html_output = String::new();
                html::push_html(&mut html_output, parser);
                Ok(html_output)
            }
            Profile::Rich => self.render_rich(markdown),
        }
    }

    fn render_rich(&self, markdown: &str) -> Result<String> {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_GFM;
        let parser = Parser::new_ext(markdown, options).map(neutralize);

        let mut events: Vec<Event> = Vec::new();
        let mut heading: Option<PendingHeading> = None;
        let mut anchors = AnchorIds::default();

        let mut in_code_block = false;
        let mut code_block_lang: Option<String> = None;
        let mut code_block_content = String::new();
        let mut link_depth = 0usize;

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_block_lang = fence_language(&kind);
                    code_block_content.clear();
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    let highlighted = self.highlight_code(
                        &code_block_content,
                        code_block_lang.take().as_deref(),
                    )?;
                    emit(&mut heading, &mut events, Event::Html(CowStr::from(highlighted)));
                }
                Event::Text(text) if in_code_block => {
                    code_block_content.push_str(&text);
                }
                Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }) => {
                    heading = Some(PendingHeading {
                        level,
                        id,
                        classes,
                        attrs,
                        inner: Vec::new(),
                    });
                }
                Event::End(TagEnd::Heading(level)) => {
                    if let Some(pending) = heading.take() {
                        let id = match pending.id {
                            Some(id) => anchors.reserve(id.to_string()),
                            None => anchors.assign(&plain_text(&pending.inner)),
                        };
                        events.push(Event::Start(Tag::Heading {
                            level: pending.level,
                            id: Some(CowStr::from(id)),
                            classes: pending.classes,
                            attrs: pending.attrs,
                        }));
                        events.extend(pending.inner);
                    }
                    events.push(Event::End(TagEnd::Heading(level)));
                }
                Event::Start(Tag::Link { .. }) | Event::Start(Tag::Image { .. }) => {
                    link_depth += 1;
                    emit(&mut heading, &mut events, event);
                }
                Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {
                    link_depth = link_depth.saturating_sub(1);
                    emit(&mut heading, &mut events, event);
                }
                Event::Text(text) if link_depth == 0 => {
                    for linked in autolink(text) {
                        emit(&mut heading, &mut events, linked);
                    }
                }
                other => emit(&mut heading, &mut events, other),
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());

        Ok(html_output)
    }

    fn theme(&self) -> Result<&Theme> {
        self.theme_set
            .themes
            .get(&self.theme_name)
            .or_else(|| self.theme_set.themes.values().next())
            .ok_or_else(|| Error::Render("no highlighting themes available".to_string()))
    }

    /// Highlight a code block
    fn highlight_code(&self, code: &str, lang: Option<&str>) -> Result<String> {
        let lang = lang.unwrap_or("text");

        // Try to find syntax for the language
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());
        let theme = self.theme()?;

        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut lines = Vec::new();
        for line in LinesWithEndings::from(code) {
            let regions = highlighter
                .highlight_line(line, &self.syntax_set)
                .map_err(|e| Error::Render(e.to_string()))?;
            let html = styled_line_to_highlighted_html(&regions[..], IncludeBackground::No)
                .map_err(|e| Error::Render(e.to_string()))?;
            lines.push(html);
        }

        let style = theme
            .settings
            .background
            .map(|c| format!("background-color:#{:02x}{:02x}{:02x};", c.r, c.g, c.b))
            .unwrap_or_default();

        if self.line_numbers {
            Ok(self.add_line_numbers(&lines, lang, &style))
        } else {
            Ok(format!(
                r#"<pre class="highlight language-{}" style="{}"><code class="language-{}">{}</code></pre>"#,
                lang,
                style,
                lang,
                lines.concat()
            ))
        }
    }

    /// Add line numbers to highlighted code
    fn add_line_numbers(&self, lines: &[String], lang: &str, style: &str) -> String {
        let gutter = (1..=lines.len())
            .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code"><pre style="{}"><code class="language-{}">{}</code></pre></td></tr></table></figure>"#,
            lang,
            gutter,
            style,
            lang,
            lines.concat()
        )
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Heading whose inner events are buffered until its id is known
struct PendingHeading<'a> {
    level: HeadingLevel,
    id: Option<CowStr<'a>>,
    classes: Vec<CowStr<'a>>,
    attrs: Vec<(CowStr<'a>, Option<CowStr<'a>>)>,
    inner: Vec<Event<'a>>,
}

fn emit<'a>(
    heading: &mut Option<PendingHeading<'a>>,
    events: &mut Vec<Event<'a>>,
    event: Event<'a>,
) {
    match heading {
        Some(pending) => pending.inner.push(event),
        None => events.push(event),
    }
}

/// Unique heading ids within one document
#[derive(Default)]
struct AnchorIds {
    used: HashSet<String>,
}

impl AnchorIds {
    fn assign(&mut self, text: &str) -> String {
        let mut base = slug::slugify(text);
        if base.is_empty() {
            base = "section".to_string();
        }
        let mut candidate = base.clone();
        let mut n = 1;
        while self.used.contains(&candidate) {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }

    fn reserve(&mut self, id: String) -> String {
        self.used.insert(id.clone());
        id
    }
}

fn plain_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        if let Event::Text(t) | Event::Code(t) = event {
            text.push_str(t);
        }
    }
    text
}

/// Language token from a fence info string, if it is safe to use in a class
fn fence_language(kind: &CodeBlockKind) -> Option<String> {
    let CodeBlockKind::Fenced(info) = kind else {
        return None;
    };
    let token = info.split(|c: char| c.is_whitespace() || c == ',').next()?;
    let valid = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '#' | '.'));
    valid.then(|| token.to_string())
}

/// Turn bare `http(s)://` URLs in a text run into links
fn autolink(text: CowStr<'_>) -> Vec<Event<'_>> {
    if !BARE_URL.is_match(&text) {
        return vec![Event::Text(text)];
    }

    let mut out = Vec::new();
    let mut last = 0;
    for found in BARE_URL.find_iter(&text) {
        let url = found
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '\'', '"']);
        if url.len() <= "https://".len() {
            continue;
        }
        if found.start() > last {
            out.push(Event::Text(CowStr::from(text[last..found.start()].to_string())));
        }
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(url.to_string()),
            title: CowStr::from(""),
            id: CowStr::from(""),
        }));
        out.push(Event::Text(CowStr::from(url.to_string())));
        out.push(Event::End(TagEnd::Link));
        last = found.start() + url.len();
    }
    if last < text.len() {
        out.push(Event::Text(CowStr::from(text[last..].to_string())));
    }
    out
}

/// Escape raw HTML and drop script-capable link targets
fn neutralize(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    if is_dangerous_url(&url) {
        CowStr::from("")
    } else {
        url
    }
}

fn is_dangerous_url(url: &str) -> bool {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if let Some(data) = normalized.strip_prefix("data:") {
        return !["image/png", "image/gif", "image/jpeg", "image/webp"]
            .iter()
            .any(|allowed| data.starts_with(allowed));
    }
    ["javascript:", "vbscript:", "file:"]
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}
