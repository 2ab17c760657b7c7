use crate::{
    config::{DEFAULT_COMPONENT_WIDTH, StackConfig},
    cursor::Slice,
    error::{ErrorOrigin, InternalError},
    index::{IndexEntry, Indexer, PathBound, invalid_bounds},
    lex::{encode_value, invert, resize},
    range::Chunk,
    value::{FieldValues, Value, ValueKind},
};
use std::{collections::BTreeSet, marker::PhantomData, ops::Bound};

///
/// Component
///
/// One field of a concatenated index key.
///
/// A null or missing field encodes as all-zero bytes. For untyped numeric
/// components that image is shared with the kind's minimum (`i64::MIN`,
/// `0u64`), so an equality lookup on the minimum also matches nulls. Use
/// [`Component::typed`] to keep them apart: null carries its own tag byte.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Component {
    path: String,
    kind: ValueKind,
    descending: bool,
    width: Option<usize>,
    typed: bool,
    numeric: bool,
}

impl Component {
    #[must_use]
    pub fn new(path: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            path: path.into(),
            kind,
            descending: false,
            width: None,
            typed: false,
            numeric: false,
        }
    }

    /// Sort this component in descending order (inverted bytes).
    #[must_use]
    pub const fn desc(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Pad or truncate the encoded value to `width` bytes.
    #[must_use]
    pub const fn fixed(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    /// Prefix the value with its kind tag so mixed kinds sort into buckets.
    #[must_use]
    pub const fn typed(mut self) -> Self {
        self.typed = true;
        self
    }

    /// Coerce numeric values of another kind into this component's kind.
    #[must_use]
    pub const fn numeric(mut self) -> Self {
        self.numeric = true;
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    fn value_width(&self, default_width: usize) -> usize {
        self.width
            .or_else(|| self.kind.fixed_width())
            .unwrap_or(default_width)
    }

    fn encoded_width(&self, default_width: usize) -> usize {
        self.value_width(default_width) + usize::from(self.typed)
    }

    fn normalize(&self, value: &Value) -> Result<Value, InternalError> {
        if value.is_null() || value.kind() == self.kind || self.typed {
            return Ok(value.clone());
        }
        if self.numeric
            && let Some(coerced) = value.coerce(self.kind)
        {
            return Ok(coerced);
        }

        Err(InternalError::codec(
            ErrorOrigin::Index,
            format!(
                "component '{}' expects {}, found {}",
                self.path,
                self.kind.label(),
                value.kind().label()
            ),
        ))
    }

    fn encode(&self, value: &Value, default_width: usize) -> Result<Vec<u8>, InternalError> {
        let value = self.normalize(value)?;
        let mut body = resize(&encode_value(&value)?, self.value_width(default_width));
        if self.descending {
            invert(&mut body);
        }

        if self.typed {
            let mut out = Vec::with_capacity(body.len() + 1);
            out.push(value.kind().tag());
            out.extend_from_slice(&body);
            Ok(out)
        } else {
            Ok(body)
        }
    }

    fn encode_bound(
        &self,
        bound: &Bound<Value>,
        default_width: usize,
    ) -> Result<Bound<Vec<u8>>, InternalError> {
        Ok(match bound {
            Bound::Unbounded => Bound::Unbounded,
            Bound::Included(v) => Bound::Included(self.encode(v, default_width)?),
            Bound::Excluded(v) => Bound::Excluded(self.encode(v, default_width)?),
        })
    }
}

///
/// ConcatIndexer
///
/// B-tree style index: the key is the concatenation of each component's
/// fixed-width encoding, so prefix order follows component order.
///

pub struct ConcatIndexer<T> {
    components: Vec<Component>,
    default_width: usize,
    _marker: PhantomData<fn(&T)>,
}

impl<T: FieldValues> ConcatIndexer<T> {
    pub fn new(components: Vec<Component>) -> Result<Self, InternalError> {
        if components.is_empty() {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Index,
                "concat index needs at least one component",
            ));
        }

        let mut seen = BTreeSet::new();
        for component in &components {
            if !seen.insert(component.path.as_str()) {
                return Err(InternalError::invalid_argument(
                    ErrorOrigin::Index,
                    format!("duplicate component path '{}'", component.path),
                ));
            }
        }

        Ok(Self {
            components,
            default_width: DEFAULT_COMPONENT_WIDTH,
            _marker: PhantomData,
        })
    }

    pub fn with_config(
        components: Vec<Component>,
        config: &StackConfig,
    ) -> Result<Self, InternalError> {
        Ok(Self::new(components)?.with_default_width(config.default_component_width))
    }

    /// Width used for text and bytes components without an explicit width.
    #[must_use]
    pub const fn with_default_width(mut self, width: usize) -> Self {
        self.default_width = width;
        self
    }

    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Index key of one value per component.
    pub fn key_for(&self, values: &[Value]) -> Result<Vec<u8>, InternalError> {
        if values.len() != self.components.len() {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Index,
                format!(
                    "expected {} component values, got {}",
                    self.components.len(),
                    values.len()
                ),
            ));
        }

        let mut key = Vec::new();
        for (component, value) in self.components.iter().zip(values) {
            key.extend(component.encode(value, self.default_width)?);
        }

        Ok(key)
    }

    fn rest_width(&self, from: usize) -> usize {
        self.components[from..]
            .iter()
            .map(|c| c.encoded_width(self.default_width))
            .sum()
    }

    fn filled(&self, prefix: &[u8], part: &[u8], from: usize, fill: u8) -> Vec<u8> {
        let mut out = [prefix, part].concat();
        out.resize(out.len() + self.rest_width(from), fill);
        out
    }

    fn check_paths(&self, bounds: &[PathBound]) -> Result<(), InternalError> {
        let mut seen = BTreeSet::new();
        for bound in bounds {
            if !self.components.iter().any(|c| c.path == bound.path) {
                return Err(invalid_bounds(format!("unknown path '{}'", bound.path)));
            }
            if !seen.insert(bound.path.as_str()) {
                return Err(invalid_bounds(format!("duplicate path '{}'", bound.path)));
            }
        }

        Ok(())
    }

    /// Fail when a bound targets a component after position `index`.
    fn check_trailing(&self, bounds: &[PathBound], index: usize) -> Result<(), InternalError> {
        match self.components[index + 1..]
            .iter()
            .find(|c| bounds.iter().any(|b| b.path == c.path))
        {
            Some(c) => Err(invalid_bounds(format!(
                "bound on '{}' follows an open or ranged component",
                c.path
            ))),
            None => Ok(()),
        }
    }
}

impl<T: FieldValues> Indexer<T> for ConcatIndexer<T> {
    fn index(&self, record: &T, _is_set: bool) -> Result<Vec<IndexEntry>, InternalError> {
        let mut keys = vec![Vec::new()];

        for component in &self.components {
            let value = record.get_value(&component.path).unwrap_or(Value::Null);
            let parts = value
                .elements()
                .into_iter()
                .map(|v| component.encode(v, self.default_width))
                .collect::<Result<Vec<_>, _>>()?;

            keys = keys
                .iter()
                .flat_map(|key| {
                    parts
                        .iter()
                        .map(move |part| [key.as_slice(), part.as_slice()].concat())
                })
                .collect();
        }

        Ok(keys.into_iter().map(IndexEntry::new).collect())
    }

    fn lookup(&self, bounds: &[PathBound]) -> Result<Slice<Chunk>, InternalError> {
        self.check_paths(bounds)?;
        let mut prefix = Vec::new();

        for (index, component) in self.components.iter().enumerate() {
            let Some(bound) = bounds.iter().find(|b| b.path == component.path) else {
                self.check_trailing(bounds, index)?;
                let chunk = Chunk::new(
                    Bound::Included(self.filled(&prefix, &[], index, 0x00)),
                    Bound::Included(self.filled(&prefix, &[], index, 0xFF)),
                );
                return Ok(Slice::new(vec![chunk]));
            };

            if let Some(value) = bound.point() {
                prefix.extend(component.encode(value, self.default_width)?);
                continue;
            }

            self.check_trailing(bounds, index)?;
            let low = component.encode_bound(&bound.low, self.default_width)?;
            let high = component.encode_bound(&bound.high, self.default_width)?;
            let (low, high) = if component.descending {
                (high, low)
            } else {
                (low, high)
            };

            let low = match low {
                Bound::Unbounded => Bound::Included(self.filled(&prefix, &[], index, 0x00)),
                Bound::Included(part) => {
                    Bound::Included(self.filled(&prefix, &part, index + 1, 0x00))
                }
                Bound::Excluded(part) => {
                    Bound::Excluded([prefix.as_slice(), part.as_slice()].concat())
                }
            };
            let high = match high {
                Bound::Unbounded => Bound::Included(self.filled(&prefix, &[], index, 0xFF)),
                Bound::Included(part) => {
                    Bound::Included(self.filled(&prefix, &part, index + 1, 0xFF))
                }
                Bound::Excluded(part) => {
                    Bound::Excluded([prefix.as_slice(), part.as_slice()].concat())
                }
            };

            return Ok(Slice::new(vec![Chunk::new(low, high)]));
        }

        Ok(Slice::new(vec![Chunk::point(prefix)]))
    }
}
