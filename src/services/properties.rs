use crate::controller::{CapabilityFactory, OperationRequest};
use crate::error::CapabilityError;
use crate::models::OperationKind;
use crate::operation::{BlockingCall, CallError, Capability, Notifier};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How far a property change reaches below the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropertyDepth {
    #[default]
    Empty,
    Files,
    Immediates,
    Infinity,
}

impl PropertyDepth {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyDepth::Empty => "empty",
            PropertyDepth::Files => "files",
            PropertyDepth::Immediates => "immediates",
            PropertyDepth::Infinity => "infinity",
        }
    }
}

impl fmt::Display for PropertyDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "empty" => Ok(PropertyDepth::Empty),
            "files" => Ok(PropertyDepth::Files),
            "immediates" => Ok(PropertyDepth::Immediates),
            "infinity" => Ok(PropertyDepth::Infinity),
            other => Err(format!(
                "unknown depth '{other}' (expected empty, files, immediates or infinity)"
            )),
        }
    }
}

/// Versioned property access. Calls block until the store answers.
#[cfg_attr(test, mockall::automock)]
pub trait PropertyStore: Send + Sync {
    /// Apply `edit` to `path`; an edit without a value deletes the key.
    fn set_property(&self, path: &Utf8Path, edit: &PropertyEdit) -> Result<(), CapabilityError>;

    /// Properties of `path` in store order.
    fn list_properties(&self, path: &Utf8Path) -> Result<Vec<(String, String)>, CapabilityError>;
}

/// A property change requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEdit {
    pub key: String,
    /// `None` deletes the property.
    pub value: Option<String>,
    pub depth: PropertyDepth,
}

impl PropertyEdit {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            depth: PropertyDepth::default(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            depth: PropertyDepth::default(),
        }
    }

    pub fn with_depth(mut self, depth: PropertyDepth) -> Self {
        self.depth = depth;
        self
    }
}

/// Apply an optional edit, then list the target's properties.
pub struct PropertiesCall {
    store: Arc<dyn PropertyStore>,
    target: Utf8PathBuf,
    edit: Option<PropertyEdit>,
}

impl PropertiesCall {
    pub fn new(store: Arc<dyn PropertyStore>, target: Utf8PathBuf, edit: Option<PropertyEdit>) -> Self {
        Self { store, target, edit }
    }
}

impl BlockingCall for PropertiesCall {
    fn run(self: Box<Self>, notifier: &Notifier) -> Result<(), CallError> {
        if let Some(edit) = &self.edit {
            // A pending cancel suppresses further property changes.
            if notifier.is_cancel_requested() {
                tracing::info!("Skipping property edit of '{}' after cancel", edit.key);
            } else if let Err(e) = self.store.set_property(&self.target, edit) {
                tracing::error!("Set property '{}' on {} failed: {}", edit.key, self.target, e);
                notifier.warn(format!("Set property failed: {e}"));
            }
        }

        let properties = self
            .store
            .list_properties(&self.target)
            .map_err(|e| CallError::Failed(format!("Properties failed: {e}")))?;

        for (key, value) in &properties {
            for line in format_property(key, value) {
                notifier.emit(line)?;
            }
        }
        Ok(())
    }
}

/// `key = value`, continuation lines of multi-line values indented.
pub fn format_property(key: &str, value: &str) -> Vec<String> {
    let mut lines = value.lines();
    let first = lines.next().unwrap_or_default();
    let mut formatted = vec![format!("{key} = {first}")];
    formatted.extend(lines.map(|line| format!("    {line}")));
    formatted
}

/// Builds properties operations for the first target.
#[derive(Clone)]
pub struct PropertiesFactory {
    store: Arc<dyn PropertyStore>,
}

impl PropertiesFactory {
    pub fn new(store: Arc<dyn PropertyStore>) -> Self {
        Self { store }
    }
}

impl CapabilityFactory for PropertiesFactory {
    fn kind(&self) -> OperationKind {
        OperationKind::Properties
    }

    fn build(&self, request: &OperationRequest) -> Result<Capability, CapabilityError> {
        let target = request
            .targets
            .first()
            .cloned()
            .unwrap_or_else(|| Utf8PathBuf::from("."));

        Ok(Capability::Blocking(Box::new(PropertiesCall::new(
            Arc::clone(&self.store),
            target,
            request.edit.clone(),
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_parse_and_display() {
        assert_eq!("infinity".parse::<PropertyDepth>(), Ok(PropertyDepth::Infinity));
        assert_eq!("Files".parse::<PropertyDepth>(), Ok(PropertyDepth::Files));
        assert!("sideways".parse::<PropertyDepth>().is_err());
        assert_eq!(PropertyDepth::Immediates.to_string(), "immediates");
        assert_eq!(PropertyDepth::default(), PropertyDepth::Empty);
    }

    #[test]
    fn test_edit_constructors() {
        let set = PropertyEdit::set("svn:eol-style", "native").with_depth(PropertyDepth::Infinity);
        assert_eq!(set.value.as_deref(), Some("native"));
        assert_eq!(set.depth, PropertyDepth::Infinity);

        let delete = PropertyEdit::delete("custom");
        assert_eq!(delete.value, None);
        assert_eq!(delete.depth, PropertyDepth::Empty);
    }

    #[test]
    fn test_format_property() {
        assert_eq!(format_property("a", "b"), vec!["a = b"]);
        assert_eq!(format_property("empty", ""), vec!["empty = "]);
        assert_eq!(
            format_property("svn:ignore", "target\n*.o"),
            vec!["svn:ignore = target", "    *.o"]
        );
    }

    #[test]
    fn test_factory_uses_first_target_and_edit() {
        let mut store = MockPropertyStore::new();
        store
            .expect_set_property()
            .withf(|path, edit| {
                path.as_str() == "first.c" && *edit == PropertyEdit::set("custom", "value")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_list_properties()
            .times(1)
            .returning(|_| Ok(vec![("custom".into(), "value".into())]));

        let factory = PropertiesFactory::new(Arc::new(store));
        let request = OperationRequest::new(vec!["first.c".into(), "second.c".into()])
            .with_edit(PropertyEdit::set("custom", "value"));

        assert_eq!(factory.kind(), OperationKind::Properties);
        let Capability::Blocking(call) = factory.build(&request).unwrap() else {
            panic!("properties must be a blocking call");
        };

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let metrics = Arc::new(crate::metrics::Metrics::new());
        let bridge = crate::ui::bridge::EventLoopBridge::new(16, Arc::clone(&metrics));
        let sink = crate::sink::ResultSink::new();
        let handle = crate::operation::AsyncOperation::new(
            runtime.handle().clone(),
            sink.clone(),
            crate::cancel::CancellationToken::new(),
            bridge.clone_handle(),
            metrics,
        )
        .start(Capability::Blocking(call))
        .unwrap();

        let outcome = runtime.block_on(handle.outcome());
        assert_eq!(outcome, crate::operation::Outcome::Succeeded);
        assert_eq!(sink.snapshot(0)[0].text(), "custom = value");
    }
}
