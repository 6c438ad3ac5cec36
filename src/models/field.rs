//! Field specifications: the static description of what we extract.
//!
//! The built-in set mirrors the four metadata fields the pipeline was built
//! around (title, date, description, volume/issue). Specs are immutable and
//! shared across runs.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Expected value shape for an extracted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text (titles, summaries).
    Text,
    /// A calendar date, canonicalized to ISO 8601 where possible.
    Date,
    /// Structured short values with internal syntax (e.g. "Volume 3, Issue 1").
    Structured,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::Structured => "structured",
        }
    }
}

/// A worked example paired with a field, used for few-shot prompting.
#[derive(Debug, Clone, Copy)]
pub struct FieldExample {
    pub text: &'static str,
    pub result: &'static str,
}

/// Static description of one extractable field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name as it appears in reports ("title", "date", ...).
    pub name: &'static str,
    /// Expected value shape.
    pub kind: FieldKind,
    /// Instruction line prepended to every prompt for this field.
    pub instruction: &'static str,
    /// Generation token budget for this field.
    pub max_tokens: u32,
    /// Few-shot examples included in prompts.
    pub examples: &'static [FieldExample],
}

impl FieldSpec {
    /// Look up a built-in spec by name.
    pub fn by_name(name: &str) -> Option<&'static FieldSpec> {
        BUILTIN_FIELDS.iter().find(|f| f.name == name)
    }
}

/// The built-in field set, in report order.
pub static BUILTIN_FIELDS: LazyLock<Vec<FieldSpec>> = LazyLock::new(|| {
    vec![
        FieldSpec {
            name: "title",
            kind: FieldKind::Text,
            instruction: "Extract the main title or subject. Return only the title.",
            max_tokens: 64,
            examples: &[
                FieldExample {
                    text: "Central American Task Force Newsletter",
                    result: "Central American Task Force Newsletter",
                },
                FieldExample {
                    text: "Dear Members, Re: Annual General Meeting",
                    result: "Annual General Meeting Notice",
                },
            ],
        },
        FieldSpec {
            name: "date",
            kind: FieldKind::Date,
            instruction: "Extract the date. Return YYYY-MM-DD or YYYY only.",
            max_tokens: 32,
            examples: &[
                FieldExample {
                    text: "6 January 1986. Dear Friends,",
                    result: "1986-01-06",
                },
                FieldExample {
                    text: "Published in 1984",
                    result: "1984",
                },
            ],
        },
        FieldSpec {
            name: "description",
            kind: FieldKind::Text,
            instruction: "Write a brief 2-3 sentence summary of the document.",
            max_tokens: 256,
            examples: &[FieldExample {
                text: "The Annual General Meeting took place...",
                result: "Summary of Annual General Meeting proceedings and decisions",
            }],
        },
        FieldSpec {
            name: "volume_issue",
            kind: FieldKind::Structured,
            instruction: "Extract volume and issue numbers. Return them verbatim.",
            max_tokens: 64,
            examples: &[
                FieldExample {
                    text: "Vol. 2 No. 4",
                    result: "Volume 2, Issue 4",
                },
                FieldExample {
                    text: "Newsletter #12",
                    result: "Issue 12",
                },
            ],
        },
    ]
});
