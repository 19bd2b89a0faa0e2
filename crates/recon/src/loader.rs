//! Upstream element intake.
//!
//! The engine consumes elements through `SourceLoader`, an opaque pull
//! interface. Malformed entries are skipped and reported, never fatal.

use log::warn;

use crate::model::{
    Element, ElementKind, FloatKind, FloatingElement, Issue, IssueKind, RawElement, RawFloating,
};

/// Why an upstream entry could not become an `Element`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedElement {
    pub position: usize,
    pub native_id: Option<String>,
    pub reason: String,
}

impl MalformedElement {
    pub fn into_issue(self, scope: &str) -> Issue {
        let subject = match self.native_id {
            Some(id) => format!("{scope}/{id}"),
            None => format!("{scope}/#{}", self.position),
        };
        Issue::new(IssueKind::MalformedElement, subject, self.reason)
    }
}

/// Pull-style element source. `None` is end of stream.
pub trait SourceLoader {
    type Item;

    fn next_element(&mut self) -> Option<Result<Self::Item, MalformedElement>>;
}

/// Drain a loader, keeping good elements and turning bad ones into issues.
pub fn drain<L: SourceLoader>(loader: &mut L, scope: &str) -> (Vec<L::Item>, Vec<Issue>) {
    let mut items = Vec::new();
    let mut issues = Vec::new();
    while let Some(next) = loader.next_element() {
        match next {
            Ok(item) => items.push(item),
            Err(bad) => {
                warn!("{scope}: skipping element #{}: {}", bad.position, bad.reason);
                issues.push(bad.into_issue(scope));
            }
        }
    }
    (items, issues)
}

// ---------------------------------------------------------------------------
// Raw element decoding
// ---------------------------------------------------------------------------

/// Loader over already-deserialized `RawElement`s.
pub struct RawElementLoader<'a> {
    raw: std::iter::Enumerate<std::slice::Iter<'a, RawElement>>,
}

impl<'a> RawElementLoader<'a> {
    pub fn new(raw: &'a [RawElement]) -> Self {
        Self {
            raw: raw.iter().enumerate(),
        }
    }
}

impl SourceLoader for RawElementLoader<'_> {
    type Item = Element;

    fn next_element(&mut self) -> Option<Result<Element, MalformedElement>> {
        let (position, raw) = self.raw.next()?;
        Some(decode_element(position, raw))
    }
}

/// Loader over `RawFloating` entries.
pub struct RawFloatingLoader<'a> {
    raw: std::iter::Enumerate<std::slice::Iter<'a, RawFloating>>,
}

impl<'a> RawFloatingLoader<'a> {
    pub fn new(raw: &'a [RawFloating]) -> Self {
        Self {
            raw: raw.iter().enumerate(),
        }
    }
}

impl SourceLoader for RawFloatingLoader<'_> {
    type Item = FloatingElement;

    fn next_element(&mut self) -> Option<Result<FloatingElement, MalformedElement>> {
        let (position, raw) = self.raw.next()?;
        Some(decode_floating(position, raw))
    }
}

pub fn decode_element(position: usize, raw: &RawElement) -> Result<Element, MalformedElement> {
    let malformed = |reason: String| MalformedElement {
        position,
        native_id: raw.native_id.clone(),
        reason,
    };

    let kind_name = raw
        .kind
        .as_deref()
        .ok_or_else(|| malformed("missing kind".into()))?;
    let kind = ElementKind::parse(kind_name)
        .ok_or_else(|| malformed(format!("unknown kind '{kind_name}'")))?;

    Ok(Element {
        kind,
        native_id: raw.native_id.clone().filter(|id| !id.trim().is_empty()),
        title: raw.title.clone().unwrap_or_default(),
        content_sample: raw.content_sample.clone().unwrap_or_default(),
        cells: raw.cells.clone(),
        shape: raw.shape,
        order_index: raw.order_index.unwrap_or(position),
    })
}

pub fn decode_floating(position: usize, raw: &RawFloating) -> Result<FloatingElement, MalformedElement> {
    let malformed = |reason: String| MalformedElement {
        position,
        native_id: raw.element.native_id.clone(),
        reason,
    };

    let float_kind = match raw.label.as_deref() {
        Some(label) => {
            FloatKind::parse(label).ok_or_else(|| malformed(format!("unknown label '{label}'")))?
        }
        None => FloatKind::Table,
    };

    let mut element_raw = raw.element.clone();
    if element_raw.kind.is_none() {
        element_raw.kind = Some(float_kind.element_kind().to_string());
    }
    let element = decode_element(position, &element_raw)?;
    let number = raw
        .number
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| malformed("missing reference number".into()))?;

    Ok(FloatingElement::new(element, float_kind, number))
}
