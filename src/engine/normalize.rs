use crate::domain::{EventMeta, SharedEvent, SyntheticEvent};

/// Stamp `meta` onto the event a trigger received.
///
/// Without a candidate a fresh plain event is created. Otherwise the same
/// handle is returned after its metadata fields are overwritten in place,
/// so anyone holding an earlier clone observes the update. Native events
/// only ever gain the metadata fields.
pub fn normalize_synthetic_event(meta: &EventMeta, candidate: Option<SharedEvent>) -> SharedEvent {
    let event = candidate.unwrap_or_else(|| SyntheticEvent::plain().into_shared());
    event.lock().apply_meta(meta);
    event
}
