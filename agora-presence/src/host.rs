//! Host election

use agora_core::models::{Participant, ParticipantId};

/// Pick the next host among the remaining participants
///
/// The earliest joiner wins; equal join positions fall back to the smaller
/// participant ID, so the result never depends on map iteration order.
#[must_use]
pub fn elect_host<'a>(remaining: impl IntoIterator<Item = &'a Participant>) -> Option<ParticipantId> {
    remaining
        .into_iter()
        .min_by(|a, b| a.join_order.cmp(&b.join_order).then_with(|| a.id.cmp(&b.id)))
        .map(|p| p.id.clone())
}
