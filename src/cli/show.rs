use std::path::Path;

use tracing::instrument;
use uuid::Uuid;
use workorder::Status;

use super::{open_tracker, parse_uuid, resolve_actor, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Show {
    /// The id of the work order to show
    #[clap(value_parser = parse_uuid)]
    id: Uuid,
}

impl Show {
    #[instrument]
    pub(super) fn run(self, root: &Path, user: &str) -> anyhow::Result<()> {
        let actor = resolve_actor(root, user)?;
        let tracker = open_tracker(root)?;

        let order = tracker.get(self.id, &actor)?;
        let history = tracker.history(self.id, &actor)?;

        println!("{}  {}", order.id(), colored_status(order.status()));
        println!();
        println!("  {}  {}", "Title:".dim(), order.title());
        println!("  {}  {}", "Priority:".dim(), order.priority());
        println!("  {}  {}", "Requester:".dim(), order.requester());
        if let Some(location) = order.location() {
            println!("  {}  {location}", "Location:".dim());
        }
        if let Some(approver) = order.approver() {
            println!("  {}  {approver}", "Approver:".dim());
        }
        if let Some(executor) = order.executor() {
            println!("  {}  {executor}", "Executor:".dim());
        }
        println!("  {}  {}", "Created:".dim(), order.created_at());
        println!("  {}  {}", "Updated:".dim(), order.updated_at());
        if let Some(approved_at) = order.approved_at() {
            println!("  {}  {approved_at}", "Approved:".dim());
        }
        if let Some(completed_at) = order.completed_at() {
            println!("  {}  {completed_at}", "Completed:".dim());
        }

        println!();
        println!("  {}", "Description:".dim());
        for line in order.description().lines() {
            println!("    {line}");
        }
        if let Some(notes) = order.notes() {
            println!();
            println!("  {}", "Notes:".dim());
            for line in notes.lines() {
                println!("    {line}");
            }
        }
        if let Some(attachment) = order.attachment() {
            println!();
            println!("  {}  {attachment}", "Attachment:".dim());
        }

        println!();
        if history.is_empty() {
            println!("  {}", "No status changes recorded.".dim());
        } else {
            println!("  {}", "History:".dim());
            for entry in &history {
                let actor = entry.actor.as_deref().unwrap_or("(unknown)");
                print!(
                    "    {}  {} → {}  by {actor}",
                    entry.created_at, entry.previous, entry.new
                );
                match &entry.note {
                    Some(note) => println!("  ({note})"),
                    None => println!(),
                }
            }
        }

        Ok(())
    }
}

fn colored_status(status: Status) -> String {
    let text = status.to_string();
    match status {
        Status::Pending => text.warning(),
        Status::InProgress => text.info(),
        Status::Completed => text.success(),
        Status::Cancelled => text.dim(),
    }
}
