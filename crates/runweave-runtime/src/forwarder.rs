// Wire forwarder
//
// Nested runnables run on a dedicated child wire; a forwarder task re-emits
// their events onto the parent wire so the transport sees one ordered
// stream per root run. Parallel workflow branches stamp a branch id on the
// way through.

use tokio::task::JoinHandle;

use runweave_core::{Wire, WireReader};

/// Forward every event from `reader` to `parent` until the child wire
/// closes. The task ends when the child closes its wire or the parent
/// reader goes away.
pub fn forward_events(
    mut reader: WireReader,
    parent: Wire,
    branch_id: Option<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(mut event) = reader.recv().await {
            if let Some(branch) = &branch_id {
                if event.branch_id.is_none() {
                    event.branch_id = Some(branch.clone());
                }
            }
            if parent.write(event).await.is_err() {
                break;
            }
        }
    })
}
