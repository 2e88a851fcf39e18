use std::path::{Path, PathBuf};

mod list;
mod show;
mod terminal;

use clap::ArgAction;
use list::List;
use show::Show;
use tracing::instrument;
use uuid::Uuid;
use workorder::{
    Actor, Config, DirectoryStore, IdentityProvider, OrderDraft, OrderUpdate, Priority, Role,
    Status, Tracker,
};

const CONFIG_FILE: &str = "wo.toml";
const ORDERS_DIR: &str = "orders";

/// Parse a work-order id from a string.
///
/// This is a CLI boundary function; the library only deals in parsed UUIDs.
fn parse_uuid(s: &str) -> Result<Uuid, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the work-order store
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Act as this user (defaults to $USER)
    #[arg(long = "as", value_name = "USER", global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let user = self
            .user
            .or_else(|| std::env::var("USER").ok())
            .ok_or_else(|| anyhow::anyhow!("No user identity: pass --as <user> or set $USER"))?;

        self.command
            .unwrap_or_else(|| Command::List(List::default()))
            .run(self.root, &user)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

/// Load the configuration from the store root, or defaults if absent.
fn load_config(root: &Path) -> anyhow::Result<Config> {
    let path = root.join(CONFIG_FILE);
    if path.exists() {
        Config::load(&path).map_err(|e| anyhow::anyhow!("{e}"))
    } else {
        Ok(Config::default())
    }
}

/// Resolve the acting user against the store's user registry.
fn resolve_actor(root: &Path, user: &str) -> anyhow::Result<Actor> {
    Ok(load_config(root)?.resolve(user))
}

/// Open the tracker over the store's orders directory.
fn open_tracker(root: &Path) -> anyhow::Result<Tracker<DirectoryStore>> {
    let store = DirectoryStore::open(root.join(ORDERS_DIR))?;
    Ok(Tracker::new(store))
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Initialize a new work-order store
    Init,

    /// Create a new work order
    Create(Create),

    /// List work orders visible to you (default)
    List(List),

    /// Show a work order and its history
    Show(Show),

    /// Update a work order's details
    ///
    /// Status is not a detail: use `wo set-status`.
    Update(Update),

    /// Request a status transition
    ///
    /// The transition is checked against your role and the order's
    /// current status, and recorded in the order's history.
    SetStatus(SetStatus),

    /// Delete a work order and its history
    Delete(Delete),

    /// Show or modify the user registry
    User(User),
}

impl Command {
    fn run(self, root: PathBuf, user: &str) -> anyhow::Result<()> {
        match self {
            Self::Init => Init::run(&root)?,
            Self::Create(command) => command.run(&root, user)?,
            Self::List(command) => command.run(&root, user)?,
            Self::Show(command) => command.run(&root, user)?,
            Self::Update(command) => command.run(&root, user)?,
            Self::SetStatus(command) => command.run(&root, user)?,
            Self::Delete(command) => command.run(&root, user)?,
            Self::User(command) => command.run(&root)?,
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Init {}

impl Init {
    #[instrument]
    fn run(root: &Path) -> anyhow::Result<()> {
        use std::fs;

        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            anyhow::bail!("Store already initialized (found existing {CONFIG_FILE})");
        }

        fs::create_dir_all(root.join(ORDERS_DIR))
            .map_err(|e| anyhow::anyhow!("Failed to create orders directory: {e}"))?;

        Config::default()
            .save(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to create {CONFIG_FILE}: {e}"))?;

        println!("Initialized work-order store in {}", root.display());
        println!("  Created: {CONFIG_FILE}");
        println!("  Created: {ORDERS_DIR}/");
        println!();
        println!("Next steps:");
        println!("  wo user set <name> <requester|approver|executor>");
        println!("  wo create --title \"...\" --description \"...\"");

        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Create {
    /// Short summary of the problem (at least 5 characters)
    #[clap(long, short)]
    title: String,

    /// Detailed description of the problem (at least 10 characters)
    #[clap(long, short)]
    description: String,

    /// Urgency of the order
    #[clap(long, short)]
    priority: Option<Priority>,

    /// Where the maintenance is needed
    #[clap(long, short)]
    location: Option<String>,

    /// Additional free-form notes
    #[clap(long, short)]
    notes: Option<String>,

    /// Reference to externally stored attachment content
    #[clap(long)]
    attach: Option<String>,
}

impl Create {
    #[instrument]
    fn run(self, root: &Path, user: &str) -> anyhow::Result<()> {
        let actor = resolve_actor(root, user)?;
        let tracker = open_tracker(root)?;

        let draft = OrderDraft {
            title: self.title,
            description: self.description,
            priority: self.priority.unwrap_or_default(),
            location: self.location,
            notes: self.notes,
            attachment: self.attach,
        };

        let order = tracker.create(draft, &actor)?;

        println!("Created work order {}", order.id());
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Update {
    /// The id of the work order to update
    #[clap(value_parser = parse_uuid)]
    id: Uuid,

    /// Replacement title
    #[clap(long, short)]
    title: Option<String>,

    /// Replacement description
    #[clap(long, short)]
    description: Option<String>,

    /// Replacement priority
    #[clap(long, short)]
    priority: Option<Priority>,

    /// Replacement location
    #[clap(long, short)]
    location: Option<String>,

    /// Replacement notes
    #[clap(long, short)]
    notes: Option<String>,

    /// Replacement attachment reference
    #[clap(long)]
    attach: Option<String>,

    /// Clear the location
    #[arg(long, conflicts_with = "location")]
    clear_location: bool,

    /// Clear the notes
    #[arg(long, conflicts_with = "notes")]
    clear_notes: bool,

    /// Clear the attachment reference
    #[arg(long, conflicts_with = "attach")]
    clear_attachment: bool,
}

impl Update {
    #[instrument]
    fn run(self, root: &Path, user: &str) -> anyhow::Result<()> {
        let actor = resolve_actor(root, user)?;
        let tracker = open_tracker(root)?;

        let update = OrderUpdate {
            title: self.title,
            description: self.description,
            priority: self.priority,
            location: if self.clear_location {
                Some(None)
            } else {
                self.location.map(Some)
            },
            notes: if self.clear_notes {
                Some(None)
            } else {
                self.notes.map(Some)
            },
            attachment: if self.clear_attachment {
                Some(None)
            } else {
                self.attach.map(Some)
            },
        };

        let order = tracker.update(self.id, update, &actor)?;

        println!("Updated work order {}", order.id());
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct SetStatus {
    /// The id of the work order
    #[clap(value_parser = parse_uuid)]
    id: Uuid,

    /// The status to move the order to
    status: Status,

    /// A note to record alongside the transition
    #[clap(long, short)]
    note: Option<String>,
}

impl SetStatus {
    #[instrument]
    fn run(self, root: &Path, user: &str) -> anyhow::Result<()> {
        use terminal::Colorize;

        let actor = resolve_actor(root, user)?;
        let tracker = open_tracker(root)?;

        let order = tracker.transition(self.id, self.status, self.note, &actor)?;

        println!(
            "{}",
            format!("Work order {} is now {}", order.id(), order.status()).success()
        );
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Delete {
    /// The id of the work order to delete
    #[clap(value_parser = parse_uuid)]
    id: Uuid,

    /// Skip confirmation prompts
    #[arg(long, short)]
    yes: bool,
}

impl Delete {
    #[instrument]
    fn run(self, root: &Path, user: &str) -> anyhow::Result<()> {
        use terminal::Colorize;

        let actor = resolve_actor(root, user)?;
        let tracker = open_tracker(root)?;

        let order = tracker.get(self.id, &actor)?;

        if !self.yes {
            println!("Will delete work order {} ({})", order.id(), order.title());
            println!("Its history will be deleted with it.");

            eprint!("\nProceed? (y/N) ");
            use std::io::{self, BufRead};
            let stdin = io::stdin();
            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            if !line.trim().eq_ignore_ascii_case("y") {
                println!("Cancelled");
                std::process::exit(130);
            }
        }

        tracker.remove(self.id, &actor)?;

        println!("{}", format!("Deleted work order {}", self.id).success());
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Debug, clap::Parser)]
enum UserCommand {
    /// List registered users and their roles
    List,

    /// Register a user with a role, replacing any previous assignment
    Set {
        /// The user identifier
        name: String,

        /// The role to assign
        role: Role,
    },

    /// Remove a user from the registry
    Remove {
        /// The user identifier
        name: String,
    },
}

impl User {
    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let config_path = root.join(CONFIG_FILE);

        match self.command {
            UserCommand::List => {
                let config = load_config(root)?;
                let mut any = false;
                for (name, role) in config.users() {
                    println!("{name}  {role}");
                    any = true;
                }
                if !any {
                    println!("No registered users.");
                }
            }
            UserCommand::Set { name, role } => {
                let mut config = load_config(root)?;
                config.set_role(name.clone(), role);
                config
                    .save(&config_path)
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                println!("Registered {name} as {role}");
            }
            UserCommand::Remove { name } => {
                let mut config = load_config(root)?;
                if !config.remove_user(&name) {
                    anyhow::bail!("User {name} is not registered");
                }
                config
                    .save(&config_path)
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                println!("Removed {name}");
            }
        }

        Ok(())
    }
}
