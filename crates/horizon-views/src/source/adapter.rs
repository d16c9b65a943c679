//! Binds a view to a source's notification streams.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use horizon_views_core::logging::targets;
use horizon_views_core::{AffinityViolation, ConnectionId, ThreadAffinity};

use super::{ItemSource, PropertyChange, SourceChange, SourceKind};
use crate::item::ViewItem;

/// Receiver of normalized source events.
pub(crate) trait ChangeSink<T>: Send + Sync {
    fn source_changed(&self, change: SourceChange<T>);
    fn property_changed(&self, change: PropertyChange<T>);
    fn access_violation(&self, violation: AffinityViolation);
}

/// Subscription state between one source and one view.
///
/// Structural changes are normalized by [`SourceKind`]: a plain source's
/// notifications are always treated as resets. Every callback first checks
/// that it runs on the owning thread unless synchronization was enabled.
pub(crate) struct SourceAdapter<T: ViewItem> {
    source: Arc<dyn ItemSource<T>>,
    kind: SourceKind,
    affinity: ThreadAffinity,
    synchronized: Arc<AtomicBool>,
    change_connection: Option<ConnectionId>,
    property_connection: Option<ConnectionId>,
}

impl<T: ViewItem> SourceAdapter<T> {
    pub fn new(source: Arc<dyn ItemSource<T>>, affinity: ThreadAffinity) -> Self {
        let kind = source.kind();
        tracing::debug!(target: targets::SOURCE, ?kind, len = source.len(), "binding source");
        Self {
            source,
            kind,
            affinity,
            synchronized: Arc::new(AtomicBool::new(false)),
            change_connection: None,
            property_connection: None,
        }
    }

    pub fn set_synchronized(&self, synchronized: bool) {
        self.synchronized.store(synchronized, Ordering::SeqCst);
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized.load(Ordering::SeqCst)
    }

    /// Starts forwarding structural changes to `sink`.
    pub fn subscribe(&mut self, sink: Weak<dyn ChangeSink<T>>) {
        if self.change_connection.is_some() {
            return;
        }
        let kind = self.kind;
        let affinity = self.affinity;
        let synchronized = self.synchronized.clone();
        let id = self.source.changes().connect(move |change: &SourceChange<T>| {
            let Some(sink) = sink.upgrade() else {
                return;
            };
            if !synchronized.load(Ordering::SeqCst) {
                if let Err(violation) = affinity.check() {
                    sink.access_violation(violation);
                    return;
                }
            }
            let change = match kind {
                SourceKind::PlainSequence => SourceChange::Reset,
                SourceKind::NotifyingSequence | SourceKind::SortAssistedSequence => change.clone(),
            };
            sink.source_changed(change);
        });
        self.change_connection = Some(id);
    }

    /// Starts or stops forwarding item property changes.
    ///
    /// Returns `false` if the source does not relay property changes.
    pub fn watch_properties(&mut self, sink: Option<Weak<dyn ChangeSink<T>>>) -> bool {
        let Some(signal) = self.source.property_changes() else {
            return false;
        };
        match (sink, self.property_connection) {
            (Some(sink), None) => {
                let affinity = self.affinity;
                let synchronized = self.synchronized.clone();
                let id = signal.connect(move |change: &PropertyChange<T>| {
                    let Some(sink) = sink.upgrade() else {
                        return;
                    };
                    if !synchronized.load(Ordering::SeqCst) {
                        if let Err(violation) = affinity.check() {
                            sink.access_violation(violation);
                            return;
                        }
                    }
                    sink.property_changed(change.clone());
                });
                self.property_connection = Some(id);
                tracing::debug!(target: targets::SOURCE, "watching item properties");
            }
            (None, Some(id)) => {
                signal.disconnect(id);
                self.property_connection = None;
                tracing::debug!(target: targets::SOURCE, "stopped watching item properties");
            }
            _ => {}
        }
        true
    }

    /// Disconnects every subscription.
    pub fn unsubscribe(&mut self) {
        if let Some(id) = self.change_connection.take() {
            self.source.changes().disconnect(id);
        }
        if let Some(id) = self.property_connection.take() {
            if let Some(signal) = self.source.property_changes() {
                signal.disconnect(id);
            }
        }
    }
}

impl<T: ViewItem> Drop for SourceAdapter<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
