//! YAML loader
//!
//! Composes `saphyr-parser` events into a [`Value`] tree. Tagged scalars are
//! handed to the constructor registered for their tag; untagged plain
//! scalars may be routed to a constructor by implicit detection, and
//! everything else is typed with the YAML 1.2 core schema.
//!
//! Registrations live on the [`Loader`] instance. Two loaders never share
//! constructors, so independent parse calls cannot see each other's hooks.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use saphyr_parser::{Event, Parser, ScalarStyle};

use crate::constructor::{ConstructorRegistry, ScalarConstructor};
use crate::error::{Error, Result, SourceLocation};
use crate::scalar::{construct_core, resolve_plain, CORE_TAG_PREFIX};
use crate::value::{TaggedValue, Value};

/// Trust level of a loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoaderKind {
    /// Unknown tags are an error
    #[default]
    Safe,
    /// Unknown tags are kept as [`Value::Tagged`] nodes
    Unsafe,
}

/// A YAML loader with its own set of tag constructors
#[derive(Clone, Default)]
pub struct Loader {
    kind: LoaderKind,
    constructors: ConstructorRegistry,
    implicit: Vec<String>,
    fallback: Option<Arc<dyn ScalarConstructor>>,
    source_name: Option<String>,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("kind", &self.kind)
            .field("constructors", &self.constructors)
            .field("implicit", &self.implicit)
            .field("fallback", &self.fallback.is_some())
            .field("source_name", &self.source_name)
            .finish()
    }
}

impl Loader {
    /// Create a loader with no constructors registered
    pub fn new(kind: LoaderKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Name reported in error locations (usually the file path)
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// The loader's trust level
    pub fn kind(&self) -> LoaderKind {
        self.kind
    }

    /// Register a constructor for a tag, returning the one it replaced
    pub fn add_constructor(
        &mut self,
        tag: impl Into<String>,
        constructor: Arc<dyn ScalarConstructor>,
    ) -> Option<Arc<dyn ScalarConstructor>> {
        self.constructors.register(tag, constructor)
    }

    /// Route untagged plain scalars to `tag`'s constructor when it detects them
    pub fn add_implicit_resolver(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.implicit.contains(&tag) {
            self.implicit.push(tag);
        }
    }

    /// Constructor consulted for untagged scalars and scalars with unknown tags
    pub fn set_fallback(
        &mut self,
        constructor: Arc<dyn ScalarConstructor>,
    ) -> Option<Arc<dyn ScalarConstructor>> {
        self.fallback.replace(constructor)
    }

    /// Load a single YAML document
    pub fn load_str(&self, text: &str) -> Result<Value> {
        let events = self.read_events(text)?;
        Composer {
            loader: self,
            events: events.into_iter(),
            anchors: HashMap::new(),
            path: Vec::new(),
        }
        .compose_stream()
    }

    fn read_events(&self, text: &str) -> Result<Vec<(Ev, Mark)>> {
        let mut events = Vec::new();
        for item in Parser::new_from_str(text) {
            let (event, span) = item.map_err(|e| {
                let marker = e.marker();
                let mark = Mark {
                    line: marker.line(),
                    column: marker.col() + 1,
                };
                self.locate(Error::parse(e.to_string()), mark)
            })?;
            let mark = Mark {
                line: span.start.line(),
                column: span.start.col() + 1,
            };

            let ev = match event {
                Event::StreamStart => Ev::StreamStart,
                Event::StreamEnd => Ev::StreamEnd,
                Event::DocumentStart(..) => Ev::DocumentStart,
                Event::DocumentEnd => Ev::DocumentEnd,
                Event::Alias(id) => Ev::Alias(id),
                Event::Scalar(value, style, anchor, tag) => Ev::Scalar {
                    value: value.to_string(),
                    plain: matches!(style, ScalarStyle::Plain),
                    anchor,
                    tag: tag.as_ref().map(|t| tag_name(&t.handle, &t.suffix)),
                },
                Event::SequenceStart(anchor, tag) => Ev::SequenceStart {
                    anchor,
                    tag: tag.as_ref().map(|t| tag_name(&t.handle, &t.suffix)),
                },
                Event::SequenceEnd => Ev::SequenceEnd,
                Event::MappingStart(anchor, tag) => Ev::MappingStart {
                    anchor,
                    tag: tag.as_ref().map(|t| tag_name(&t.handle, &t.suffix)),
                },
                Event::MappingEnd => Ev::MappingEnd,
                _ => continue,
            };
            events.push((ev, mark));
        }
        Ok(events)
    }

    fn construct_scalar(&self, text: &str, plain: bool, tag: Option<&str>) -> Result<Value> {
        let Some(tag) = tag else {
            if plain {
                if let Some(value) = self.detect_implicit(text)? {
                    return Ok(value);
                }
            }
            if let Some(fallback) = self.fallback.as_ref().filter(|c| c.detects(text)) {
                return fallback.construct(text);
            }
            return Ok(if plain {
                resolve_plain(text)
            } else {
                Value::String(text.to_string())
            });
        };

        if let Some(constructor) = self.constructors.get(tag) {
            return constructor.construct(text);
        }

        // Non-specific tag: always a string
        if tag == "!" {
            return Ok(Value::String(text.to_string()));
        }

        if let Some(name) = tag.strip_prefix(CORE_TAG_PREFIX) {
            let substituted = self.substitute(text)?;
            if let Some(value) = construct_core(name, substituted.as_deref().unwrap_or(text)) {
                return value;
            }
        }

        if let Some(fallback) = &self.fallback {
            return fallback.construct(text);
        }

        match self.kind {
            LoaderKind::Safe => Err(Error::unknown_tag(tag)),
            LoaderKind::Unsafe => Ok(Value::Tagged(Box::new(TaggedValue {
                tag: tag.to_string(),
                value: if plain {
                    resolve_plain(text)
                } else {
                    Value::String(text.to_string())
                },
            }))),
        }
    }

    /// Run implicit detection on an untagged plain scalar
    fn detect_implicit(&self, text: &str) -> Result<Option<Value>> {
        for tag in &self.implicit {
            if let Some(constructor) = self.constructors.get(tag) {
                if constructor.detects(text) {
                    log::trace!("Implicitly resolved a plain scalar as {}", tag);
                    return constructor.construct(text).map(Some);
                }
            }
        }
        Ok(None)
    }

    /// Substitute a scalar carrying a core type tag, if any hook is eligible
    fn substitute(&self, text: &str) -> Result<Option<String>> {
        let value = match self.fallback.as_ref().filter(|c| c.detects(text)) {
            Some(fallback) => Some(fallback.construct(text)?),
            None => self.detect_implicit(text)?,
        };
        Ok(value.map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        }))
    }

    fn tag_collection(&self, value: Value, tag: Option<String>) -> Result<Value> {
        let Some(tag) = tag else {
            return Ok(value);
        };

        if self.constructors.contains(&tag) {
            return Err(Error::construct(format!(
                "Tag '{}' can only be applied to scalars, found a {}",
                tag,
                value.type_name()
            )));
        }
        if tag == "!" {
            return Ok(value);
        }
        if let Some(name) = tag.strip_prefix(CORE_TAG_PREFIX) {
            return match (name, &value) {
                ("map" | "omap" | "pairs" | "set", Value::Mapping(_))
                | ("seq" | "omap" | "pairs", Value::Sequence(_)) => Ok(value),
                _ => Err(Error::construct(format!(
                    "Cannot apply !!{} to a {}",
                    name,
                    value.type_name()
                ))),
            };
        }

        match self.kind {
            LoaderKind::Safe => Err(Error::unknown_tag(tag)),
            LoaderKind::Unsafe => Ok(Value::Tagged(Box::new(TaggedValue { tag, value }))),
        }
    }

    fn locate(&self, err: Error, mark: Mark) -> Error {
        if err.source_location.is_some() {
            return err;
        }
        let file = self
            .source_name
            .clone()
            .unwrap_or_else(|| "<data>".to_string());
        err.with_source_location(SourceLocation {
            file,
            line: Some(mark.line),
            column: Some(mark.column),
        })
    }
}

/// `!!` shorthand expands to the core tag prefix
fn tag_name(handle: &str, suffix: &str) -> String {
    if handle == "!!" {
        format!("{}{}", CORE_TAG_PREFIX, suffix)
    } else {
        format!("{}{}", handle, suffix)
    }
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    line: usize,
    column: usize,
}

/// Owned parser event
#[derive(Debug)]
enum Ev {
    StreamStart,
    StreamEnd,
    DocumentStart,
    DocumentEnd,
    Alias(usize),
    Scalar {
        value: String,
        plain: bool,
        anchor: usize,
        tag: Option<String>,
    },
    SequenceStart {
        anchor: usize,
        tag: Option<String>,
    },
    SequenceEnd,
    MappingStart {
        anchor: usize,
        tag: Option<String>,
    },
    MappingEnd,
}

struct Composer<'a> {
    loader: &'a Loader,
    events: std::vec::IntoIter<(Ev, Mark)>,
    anchors: HashMap<usize, Value>,
    path: Vec<String>,
}

impl Composer<'_> {
    fn next(&mut self) -> Result<(Ev, Mark)> {
        self.events
            .next()
            .ok_or_else(|| Error::parse("Unexpected end of YAML stream"))
    }

    fn fail(&self, mut err: Error, mark: Mark) -> Error {
        if err.path.is_none() && !self.path.is_empty() {
            err.path = Some(self.current_path());
        }
        self.loader.locate(err, mark)
    }

    fn current_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            if !out.is_empty() && !segment.starts_with('[') {
                out.push('.');
            }
            out.push_str(segment);
        }
        out
    }

    fn compose_stream(mut self) -> Result<Value> {
        let mut document = None;
        loop {
            let (ev, mark) = self.next()?;
            match ev {
                Ev::StreamStart => continue,
                Ev::StreamEnd => break,
                Ev::DocumentStart => {
                    if document.is_some() {
                        return Err(self.fail(
                            Error::parse(
                                "Expected a single document in the stream but found another document",
                            ),
                            mark,
                        ));
                    }
                    let (ev, mark) = self.next()?;
                    document = Some(self.compose_node(ev, mark)?);
                    match self.next()? {
                        (Ev::DocumentEnd, _) => {}
                        (_, mark) => {
                            return Err(self.fail(Error::internal("Document did not end"), mark))
                        }
                    }
                    self.anchors.clear();
                }
                other => {
                    return Err(self.fail(
                        Error::internal(format!("Unexpected event outside a document: {:?}", other)),
                        mark,
                    ))
                }
            }
        }
        Ok(document.unwrap_or(Value::Null))
    }

    fn compose_node(&mut self, ev: Ev, mark: Mark) -> Result<Value> {
        let (value, anchor) = match ev {
            Ev::Alias(id) => {
                return self.anchors.get(&id).cloned().ok_or_else(|| {
                    self.fail(Error::parse(format!("Unknown anchor (id {})", id)), mark)
                })
            }
            Ev::Scalar {
                value,
                plain,
                anchor,
                tag,
            } => {
                let value = self
                    .loader
                    .construct_scalar(&value, plain, tag.as_deref())
                    .map_err(|e| self.fail(e, mark))?;
                (value, anchor)
            }
            Ev::SequenceStart { anchor, tag } => {
                let value = self.compose_sequence()?;
                let value = self
                    .loader
                    .tag_collection(value, tag)
                    .map_err(|e| self.fail(e, mark))?;
                (value, anchor)
            }
            Ev::MappingStart { anchor, tag } => {
                let value = self.compose_mapping()?;
                let value = self
                    .loader
                    .tag_collection(value, tag)
                    .map_err(|e| self.fail(e, mark))?;
                (value, anchor)
            }
            other => {
                return Err(self.fail(
                    Error::internal(format!("Unexpected event: {:?}", other)),
                    mark,
                ))
            }
        };

        if anchor != 0 {
            self.anchors.insert(anchor, value.clone());
        }
        Ok(value)
    }

    fn compose_sequence(&mut self) -> Result<Value> {
        let mut items = Vec::new();
        loop {
            let (ev, mark) = self.next()?;
            if matches!(ev, Ev::SequenceEnd) {
                break;
            }
            self.path.push(format!("[{}]", items.len()));
            let item = self.compose_node(ev, mark);
            self.path.pop();
            items.push(item?);
        }
        Ok(Value::Sequence(items))
    }

    fn compose_mapping(&mut self) -> Result<Value> {
        let mut map = IndexMap::new();
        let mut merged = Vec::new();
        loop {
            let (key_ev, key_mark) = self.next()?;
            if matches!(key_ev, Ev::MappingEnd) {
                break;
            }
            let is_merge = matches!(
                &key_ev,
                Ev::Scalar { value, plain: true, tag: None, .. } if value == "<<"
            );

            if is_merge {
                let (ev, mark) = self.next()?;
                let source = self.compose_node(ev, mark)?;
                self.collect_merge(source, &mut merged, mark)?;
                continue;
            }

            let key = self.compose_node(key_ev, key_mark)?;
            let key = self.key_string(key, key_mark)?;

            let (ev, mark) = self.next()?;
            self.path.push(key.clone());
            let value = self.compose_node(ev, mark);
            self.path.pop();
            map.insert(key, value?);
        }

        // Explicit keys win, then earlier merge sources over later ones
        for source in merged {
            for (key, value) in source {
                map.entry(key).or_insert(value);
            }
        }
        Ok(Value::Mapping(map))
    }

    fn collect_merge(
        &self,
        source: Value,
        merged: &mut Vec<IndexMap<String, Value>>,
        mark: Mark,
    ) -> Result<()> {
        match source {
            Value::Mapping(map) => merged.push(map),
            Value::Sequence(items) => {
                for item in items {
                    match item {
                        Value::Mapping(map) => merged.push(map),
                        other => {
                            return Err(self.fail(
                                Error::construct(format!(
                                    "Merge key '<<' expects mappings, found a {}",
                                    other.type_name()
                                )),
                                mark,
                            ))
                        }
                    }
                }
            }
            other => {
                return Err(self.fail(
                    Error::construct(format!(
                        "Merge key '<<' expects a mapping or a list of mappings, found a {}",
                        other.type_name()
                    )),
                    mark,
                ))
            }
        }
        Ok(())
    }

    fn key_string(&self, key: Value, mark: Mark) -> Result<String> {
        match key {
            Value::String(s) => Ok(s),
            Value::Null | Value::Bool(_) | Value::Integer(_) | Value::Float(_) => Ok(key.to_string()),
            other => Err(self.fail(
                Error::construct(format!(
                    "Mapping keys must be scalars, found a {}",
                    other.type_name()
                )),
                mark,
            )),
        }
    }
}
