use std::{any::Any, fmt, rc::Rc};

///
/// Initializing
///
/// Marker present in the options of every backfill `on_set`. Extensions use
/// it to skip cross-checks that bulk backfill cannot satisfy.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Initializing;

#[derive(Clone)]
struct ScopedOption {
    scope: Option<String>,
    payload: Rc<dyn Any>,
}

///
/// SetOptions
///
/// Ordered, heterogeneous option list routed to extensions. Unscoped entries
/// reach every extension; scoped entries reach only the extension with the
/// matching name. Payloads are looked up by type.
///

#[derive(Clone, Default)]
pub struct SetOptions {
    entries: Vec<ScopedOption>,
}

impl SetOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carrying only the initialization marker.
    #[must_use]
    pub fn initializing() -> Self {
        Self::new().with(Initializing)
    }

    /// Append an option every extension sees.
    #[must_use]
    pub fn with<P: Any>(mut self, payload: P) -> Self {
        self.push(None, payload);
        self
    }

    /// Append an option only the extension named `name` sees.
    #[must_use]
    pub fn with_ext<P: Any>(mut self, name: impl Into<String>, payload: P) -> Self {
        self.push(Some(name.into()), payload);
        self
    }

    fn push<P: Any>(&mut self, scope: Option<String>, payload: P) {
        self.entries.push(ScopedOption {
            scope,
            payload: Rc::new(payload),
        });
    }

    /// View for one extension: unscoped entries plus those scoped to `name`,
    /// in the original order, with scopes removed.
    #[must_use]
    pub fn filtered(&self, name: &str) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|e| e.scope.as_deref().is_none_or(|scope| scope == name))
            .map(|e| ScopedOption {
                scope: None,
                payload: Rc::clone(&e.payload),
            })
            .collect();

        Self { entries }
    }

    /// First payload of type `P`.
    #[must_use]
    pub fn find<P: Any>(&self) -> Option<&P> {
        self.find_all().next()
    }

    pub fn find_all<P: Any>(&self) -> impl Iterator<Item = &P> {
        self.entries
            .iter()
            .filter_map(|e| e.payload.downcast_ref::<P>())
    }

    #[must_use]
    pub fn is_initializing(&self) -> bool {
        self.find::<Initializing>().is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.scope.as_deref().unwrap_or("*")))
            .finish()
    }
}
