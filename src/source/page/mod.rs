
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A page returned by the Notion database query endpoint.
///
/// Properties arrive as raw JSON (order-preserving) and are interpreted
/// through the closed [`PropertyValue`] union; anything the pipeline does not
/// recognize surfaces explicitly as [`PropertyValue::Unrecognized`] instead of
/// silently passing through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub last_edited_time: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
}

impl Page {
    /// Iterate properties in source order as typed values.
    pub fn typed_properties(&self) -> impl Iterator<Item = (&str, PropertyValue)> {
        self.properties.iter().map(|(name, raw)| {
            let value = serde_json::from_value(raw.clone())
                .unwrap_or(PropertyValue::Unrecognized);
            (name.as_str(), value)
        })
    }

    /// The page title, from the first title-typed property.
    pub fn title(&self) -> Option<String> {
        self.typed_properties().find_map(|(_, value)| match value {
            PropertyValue::Title { title } => {
                let text = join_rich_text(&title);
                (!text.is_empty()).then_some(text)
            }
            _ => None,
        })
    }
}

/// One span of Notion rich text; only the plain rendering matters here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RichTextSpan {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectOption {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DateValue {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// Closed union over the Notion property kinds the pipeline understands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title {
        title: Vec<RichTextSpan>,
    },
    RichText {
        rich_text: Vec<RichTextSpan>,
    },
    Select {
        select: Option<SelectOption>,
    },
    MultiSelect {
        multi_select: Vec<SelectOption>,
    },
    Number {
        number: Option<f64>,
    },
    Date {
        date: Option<DateValue>,
    },
    Checkbox {
        checkbox: bool,
    },
    Url {
        url: Option<String>,
    },
    Email {
        email: Option<String>,
    },
    PhoneNumber {
        phone_number: Option<String>,
    },
    CreatedTime {
        created_time: String,
    },
    LastEditedTime {
        last_edited_time: String,
    },
    #[serde(other)]
    Unrecognized,
}

impl PropertyValue {
    pub fn is_title(&self) -> bool {
        matches!(self, PropertyValue::Title { .. })
    }

    /// Plain-text rendering of text-bearing property kinds, used when
    /// flattening a page for indexing. Non-text kinds yield `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            PropertyValue::Title { title } => {
                let text = join_rich_text(title);
                (!text.is_empty()).then_some(text)
            }
            PropertyValue::RichText { rich_text } => {
                let text = join_rich_text(rich_text);
                (!text.is_empty()).then_some(text)
            }
            PropertyValue::Select { select } => select
                .as_ref()
                .map(|option| option.name.clone())
                .filter(|name| !name.is_empty()),
            PropertyValue::MultiSelect { multi_select } => {
                if multi_select.is_empty() {
                    None
                } else {
                    Some(
                        multi_select
                            .iter()
                            .map(|option| option.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    )
                }
            }
            PropertyValue::Number { .. }
            | PropertyValue::Date { .. }
            | PropertyValue::Checkbox { .. }
            | PropertyValue::Url { .. }
            | PropertyValue::Email { .. }
            | PropertyValue::PhoneNumber { .. }
            | PropertyValue::CreatedTime { .. }
            | PropertyValue::LastEditedTime { .. }
            | PropertyValue::Unrecognized => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RichTextContent {
    #[serde(default)]
    pub rich_text: Vec<RichTextSpan>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToDoContent {
    #[serde(default)]
    pub rich_text: Vec<RichTextSpan>,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CodeContent {
    #[serde(default)]
    pub rich_text: Vec<RichTextSpan>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookmarkContent {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub caption: Vec<RichTextSpan>,
}

/// Closed union over the Notion block kinds the pipeline extracts text from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph {
        paragraph: RichTextContent,
    },
    #[serde(rename = "heading_1")]
    Heading1 {
        heading_1: RichTextContent,
    },
    #[serde(rename = "heading_2")]
    Heading2 {
        heading_2: RichTextContent,
    },
    #[serde(rename = "heading_3")]
    Heading3 {
        heading_3: RichTextContent,
    },
    BulletedListItem {
        bulleted_list_item: RichTextContent,
    },
    NumberedListItem {
        numbered_list_item: RichTextContent,
    },
    ToDo {
        to_do: ToDoContent,
    },
    Toggle {
        toggle: RichTextContent,
    },
    Quote {
        quote: RichTextContent,
    },
    Code {
        code: CodeContent,
    },
    Callout {
        callout: RichTextContent,
    },
    Bookmark {
        bookmark: BookmarkContent,
    },
    #[serde(other)]
    Unrecognized,
}

impl Block {
    /// Plain text carried by this block, `None` when the kind has no text or
    /// is unrecognized.
    pub fn plain_text(&self) -> Option<String> {
        let text = match self {
            Block::Paragraph { paragraph } => join_rich_text(&paragraph.rich_text),
            Block::Heading1 { heading_1 } => join_rich_text(&heading_1.rich_text),
            Block::Heading2 { heading_2 } => join_rich_text(&heading_2.rich_text),
            Block::Heading3 { heading_3 } => join_rich_text(&heading_3.rich_text),
            Block::BulletedListItem { bulleted_list_item } => {
                join_rich_text(&bulleted_list_item.rich_text)
            }
            Block::NumberedListItem { numbered_list_item } => {
                join_rich_text(&numbered_list_item.rich_text)
            }
            Block::ToDo { to_do } => join_rich_text(&to_do.rich_text),
            Block::Toggle { toggle } => join_rich_text(&toggle.rich_text),
            Block::Quote { quote } => join_rich_text(&quote.rich_text),
            Block::Code { code } => join_rich_text(&code.rich_text),
            Block::Callout { callout } => join_rich_text(&callout.rich_text),
            Block::Bookmark { bookmark } => join_rich_text(&bookmark.caption),
            Block::Unrecognized => return None,
        };

        (!text.is_empty()).then_some(text)
    }
}

/// Flatten a page and its blocks into the plain text used for chunking.
///
/// Concatenation order: title property, then other text-bearing properties in
/// source property order, then block texts in block order.
pub fn extract_page_text(page: &Page, blocks: &[Block]) -> String {
    let mut parts = Vec::new();

    if let Some(title) = page.title() {
        parts.push(format!("Title: {title}"));
    }

    for (name, value) in page.typed_properties() {
        if value.is_title() {
            continue;
        }
        if let Some(text) = value.as_text() {
            parts.push(format!("{name}: {text}"));
        }
    }

    for block in blocks {
        if let Some(text) = block.plain_text() {
            parts.push(text);
        }
    }

    parts.join("\n")
}

fn join_rich_text(spans: &[RichTextSpan]) -> String {
    spans.iter().map(|span| span.plain_text.as_str()).collect()
}
