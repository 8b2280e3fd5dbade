//! `notify`-based watch backend

use super::{EventSink, OsWatch, WatchBackend};
use crate::error::WatchFailure;
use notify::event::{MetadataKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tracing::{debug, trace};
use trigger_core::{ChangeKind, ResolvedWatchTarget, TriggerError};

/// Watches directories with the platform's recommended `notify` watcher
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyBackend;

impl OsWatch for RecommendedWatcher {}

impl WatchBackend for NotifyBackend {
    fn watch(
        &self,
        target: &ResolvedWatchTarget,
        sink: EventSink,
    ) -> Result<Box<dyn OsWatch>, TriggerError> {
        let directory = target.directory.clone();
        let setup_error = |e: notify::Error| TriggerError::WatchSetup {
            directory: target.directory.clone(),
            reason: e.to_string(),
        };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => route(&sink, &directory, event),
                Err(e) => sink.failed(WatchFailure::Inaccessible(e.to_string())),
            }
        })
        .map_err(setup_error)?;

        watcher
            .watch(&target.directory, RecursiveMode::NonRecursive)
            .map_err(setup_error)?;

        debug!("Watching {}", target.path().display());
        Ok(Box::new(watcher))
    }
}

/// Forward one OS event to the sink
fn route(sink: &EventSink, directory: &Path, event: Event) {
    trace!("notify event: {:?}", event);

    if event.need_rescan() {
        sink.failed(WatchFailure::Overflow);
        return;
    }

    if matches!(event.kind, EventKind::Remove(_)) && event.paths.iter().any(|p| p == directory) {
        sink.failed(WatchFailure::Inaccessible(format!(
            "{} was removed",
            directory.display()
        )));
        return;
    }

    let Some(change) = change_kind(&event.kind) else {
        return;
    };
    for path in event.paths {
        if sink.changed(path, change) {
            break;
        }
    }
}

/// Map a notify event kind to a last-write style change
fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Renamed),
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime | MetadataKind::Any)) => {
            Some(ChangeKind::Changed)
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Changed),
        _ => None,
    }
}
