use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vendorwatch_digest::{extract_subject, PageReply, PageRequest, PageResponder};

/// Serves subject requests from an HTML snapshot of the open mail page. The
/// file is re-read for every request so it can be replaced while running.
pub fn spawn_snapshot_worker(
    path: PathBuf,
    responder: PageResponder,
    mut requests: mpsc::Receiver<PageRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(req) = requests.recv().await {
            let subject = match tokio::fs::read_to_string(&path).await {
                Ok(html) => extract_subject(&html),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "page snapshot unreadable");
                    None
                }
            };
            match &subject {
                Some(s) => debug!(id = req.id, subject = %s, "page subject found"),
                None => warn!(id = req.id, "subject not found on page"),
            }
            responder.reply(PageReply {
                id: req.id,
                subject,
            });
        }
        debug!("page worker stopped");
    })
}
