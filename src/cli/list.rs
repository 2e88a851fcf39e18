use std::path::Path;

use tracing::instrument;
use workorder::WorkOrder;

use super::{open_tracker, resolve_actor, terminal::Colorize};

#[derive(Debug, Default, clap::Parser)]
pub struct List {
    /// Only orders still awaiting approval
    #[arg(long)]
    pending: bool,

    /// Only orders you requested
    #[arg(long)]
    mine: bool,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    format: Format,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum Format {
    #[default]
    Table,
    Json,
}

impl List {
    #[instrument]
    pub(super) fn run(self, root: &Path, user: &str) -> anyhow::Result<()> {
        let actor = resolve_actor(root, user)?;
        let tracker = open_tracker(root)?;

        let orders = match (self.pending, self.mine) {
            (true, true) => {
                let mut orders = tracker.list_pending(&actor)?;
                orders.retain(|order| order.requester() == actor.id);
                orders
            }
            (true, false) => tracker.list_pending(&actor)?,
            (false, true) => tracker.list_mine(&actor)?,
            (false, false) => tracker.list_visible(&actor)?,
        };

        if orders.is_empty() {
            println!("No work orders.");
            return Ok(());
        }

        match self.format {
            Format::Json => Self::output_json(&orders)?,
            Format::Table => Self::output_table(&orders),
        }

        Ok(())
    }

    fn output_json(orders: &[WorkOrder]) -> anyhow::Result<()> {
        use serde_json::json;

        let items: Vec<_> = orders
            .iter()
            .map(|order| {
                json!({
                    "id": order.id(),
                    "title": order.title(),
                    "status": order.status().to_string(),
                    "priority": order.priority().to_string(),
                    "requester": order.requester(),
                    "location": order.location(),
                    "created_at": order.created_at(),
                    "updated_at": order.updated_at(),
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&items)?);
        Ok(())
    }

    fn output_table(orders: &[WorkOrder]) {
        println!(
            "{}",
            format!(
                "{:<36}  {:<11}  {:<8}  {:<12}  TITLE",
                "ID", "STATUS", "PRIORITY", "REQUESTER"
            )
            .dim()
        );
        println!("{}", "─".repeat(90).dim());

        for order in orders {
            println!(
                "{:<36}  {:<11}  {:<8}  {:<12}  {}",
                order.id().to_string(),
                order.status().to_string(),
                order.priority().to_string(),
                order.requester(),
                order.title()
            );
        }

        println!();
        println!("{}", format!("{} work order(s)", orders.len()).dim());
    }
}
