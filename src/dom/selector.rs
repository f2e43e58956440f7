//! Element patterns.
//!
//! Supports the subset of CSS selectors the page integration needs: a comma
//! separated list of compound selectors made of an optional tag name, an
//! optional `#id` and any number of `.class` parts.

use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::SelectorError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn matches(&self, tag: &str, id: Option<&str>, classes: &[String]) -> bool {
        if let Some(expected) = &self.tag {
            if !expected.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(expected) = &self.id {
            if id != Some(expected.as_str()) {
                return false;
            }
        }
        self.classes
            .iter()
            .all(|class| classes.iter().any(|c| c == class))
    }
}

/// A parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Compound>,
}

impl Selector {
    /// Parse a selector list such as `ytd-video-renderer, a#thumbnail`
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let source = input.trim().to_string();
        if source.is_empty() {
            return Err(SelectorError::Empty(input.to_string()));
        }

        let alternatives = source
            .split(',')
            .map(|part| parse_compound(part, &source))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source,
            alternatives,
        })
    }

    /// Whether an element with the given identity matches any alternative
    pub fn matches(&self, tag: &str, id: Option<&str>, classes: &[String]) -> bool {
        self.alternatives
            .iter()
            .any(|compound| compound.matches(tag, id, classes))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn parse_compound(part: &str, source: &str) -> Result<Compound, SelectorError> {
    let part = part.trim();
    if part.is_empty() {
        return Err(SelectorError::Empty(source.to_string()));
    }

    let mut compound = Compound::default();
    let mut chars = part.chars().peekable();

    let tag = take_name(&mut chars);
    if !tag.is_empty() {
        compound.tag = Some(tag.to_ascii_lowercase());
    } else if chars.peek() == Some(&'*') {
        chars.next();
    }

    while let Some(c) = chars.next() {
        match c {
            '#' | '.' => {
                let name = take_name(&mut chars);
                if name.is_empty() {
                    return Err(SelectorError::MissingName {
                        selector: source.to_string(),
                        marker: c,
                    });
                }
                if c == '#' {
                    compound.id = Some(name);
                } else {
                    compound.classes.push(name);
                }
            }
            other => {
                return Err(SelectorError::Unsupported {
                    selector: source.to_string(),
                    character: other,
                });
            }
        }
    }

    Ok(compound)
}

fn take_name(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Selector::parse(&raw).map_err(serde::de::Error::custom)
    }
}
