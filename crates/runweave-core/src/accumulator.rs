// Streaming tool-call reassembly
//
// Providers deliver tool calls as sparse fragments keyed by `index`:
// `id` and `function.name` may arrive on any fragment (or late), and
// `function.arguments` is a string-append stream. Some providers resend a
// complete snapshot of the call after streaming it piecemeal; appending that
// snapshot's arguments would corrupt the call, so a fragment that repeats an
// already-known id is treated as the terminal snapshot and argument appends
// for that index are suppressed from then on.

use runweave_contracts::{ToolCall, ToolCallFragment};

#[derive(Debug, Default)]
struct Slot {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    finalized: bool,
}

/// Per-step accumulator that reassembles streamed tool-call fragments into
/// complete calls, keyed by fragment index.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    slots: Vec<Slot>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, index: usize) -> &mut Slot {
        while self.slots.len() <= index {
            self.slots.push(Slot::default());
        }
        &mut self.slots[index]
    }

    /// Merge one fragment. Fragments for different indices may interleave
    /// arbitrarily; fragments for one index arrive in argument order.
    pub fn merge(&mut self, fragment: &ToolCallFragment) {
        let slot = self.slot(fragment.index);

        if let Some(id) = &fragment.id {
            match &slot.id {
                // Repeated id with arguments attached: the provider resent
                // the finished call. Suppress further argument appends.
                Some(existing) if existing == id => {
                    if fragment.function.arguments.is_some() {
                        slot.finalized = true;
                    }
                }
                Some(_) => {}
                None => slot.id = Some(id.clone()),
            }
        }

        if let Some(name) = &fragment.function.name {
            slot.name = Some(name.clone());
        }

        if let Some(arguments) = &fragment.function.arguments {
            if !slot.finalized {
                slot.arguments.push_str(arguments);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Return the dense list of complete tool calls. Slots without an id
    /// get a synthetic one so downstream linkage stays intact.
    pub fn finalize(self) -> Vec<ToolCall> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| ToolCall {
                id: slot.id.unwrap_or_else(|| format!("call_{index}")),
                name: slot.name.unwrap_or_default(),
                arguments: slot.arguments,
            })
            .collect()
    }
}
