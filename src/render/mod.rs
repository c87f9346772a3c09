mod blocks;
mod inline;
mod linkify;

/// Chat message renderer.
///
/// Turns untrusted assistant text into an HTML fragment built from a small
/// vocabulary: `<p>`, `<br>`, `<strong>`, `<em>`, `<ul>`, `<li>` and `<a>`.
/// The input is escaped first and every later stage only ever sees escaped
/// text, so raw `<`, `>` and `&` from the input can never reach the output.
///
/// Rendering is a fixed sequence of [`Stage`]s, each a total `&str -> String`
/// rewrite. The order in [`Stage::PIPELINE`] is the precedence contract:
/// escape before everything, strong before emphasis, list items before list
/// wrapping before paragraphs, URLs before emails before phone numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// `&`, `<`, `>` to entities, in that order.
    Escape,
    /// `**text**` to `<strong>`.
    Strong,
    /// `*text*` to `<em>`, ignoring asterisks that touch another asterisk.
    Emphasis,
    /// Bullet and numbered lines to `<li>`.
    ListItems,
    /// Runs of adjacent `<li>` into one `<ul>`.
    ListWrap,
    /// Blank-line separated chunks to `<p>`, single newlines to `<br>`.
    Paragraphs,
    /// `http(s)://` URLs to anchors opening in a new browsing context.
    LinkUrls,
    /// Email addresses to `mailto:` anchors.
    LinkEmails,
    /// Phone numbers to `tel:` anchors.
    LinkPhones,
}

impl Stage {
    /// Every stage, in the order [`render`] applies them.
    pub const PIPELINE: [Stage; 9] = [
        Stage::Escape,
        Stage::Strong,
        Stage::Emphasis,
        Stage::ListItems,
        Stage::ListWrap,
        Stage::Paragraphs,
        Stage::LinkUrls,
        Stage::LinkEmails,
        Stage::LinkPhones,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Escape => "escape",
            Stage::Strong => "strong",
            Stage::Emphasis => "emphasis",
            Stage::ListItems => "list_items",
            Stage::ListWrap => "list_wrap",
            Stage::Paragraphs => "paragraphs",
            Stage::LinkUrls => "link_urls",
            Stage::LinkEmails => "link_emails",
            Stage::LinkPhones => "link_phones",
        }
    }

    /// Apply this stage alone.
    ///
    /// Stages after [`Stage::Escape`] assume their input is already escaped;
    /// calling them on raw text gives no safety guarantee.
    pub fn apply(self, input: &str) -> String {
        match self {
            Stage::Escape => inline::escape(input),
            Stage::Strong => inline::strong(input),
            Stage::Emphasis => inline::emphasis(input),
            Stage::ListItems => blocks::list_items(input),
            Stage::ListWrap => blocks::wrap_lists(input),
            Stage::Paragraphs => blocks::paragraphs(input),
            Stage::LinkUrls => linkify::urls(input),
            Stage::LinkEmails => linkify::emails(input),
            Stage::LinkPhones => linkify::phones(input),
        }
    }
}

/// Render one chat message to safe HTML.
///
/// Total over all strings. Empty and whitespace-only input render to an
/// empty string.
pub fn render(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    Stage::PIPELINE
        .iter()
        .fold(raw.to_owned(), |text, stage| stage.apply(&text))
}

/// [`render`] for a message that may be absent.
pub fn render_opt(raw: Option<&str>) -> String {
    raw.map(render).unwrap_or_default()
}
