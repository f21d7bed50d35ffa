use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[zbus::proxy(
    interface = "dev.homesight.Homesight1",
    default_service = "dev.homesight.Homesight1",
    default_path = "/dev/homesight/Homesight1"
)]
trait Homesight {
    async fn register_image(&self, name: &str, image: Vec<u8>) -> zbus::Result<bool>;
    async fn remove_user(&self, name: &str) -> zbus::Result<bool>;
    async fn list_users(&self) -> zbus::Result<Vec<String>>;
    async fn list_devices(&self) -> zbus::Result<String>;
    async fn add_device(
        &self,
        id: &str,
        name: &str,
        on_gesture: &str,
        off_gesture: &str,
        icon: &str,
    ) -> zbus::Result<bool>;
    async fn remove_device(&self, id: &str) -> zbus::Result<bool>;
    async fn toggle_device(&self, id: &str, on: bool) -> zbus::Result<bool>;
    async fn set_user_pref(
        &self,
        user: &str,
        device_id: &str,
        on_gesture: &str,
        off_gesture: &str,
    ) -> zbus::Result<()>;
    async fn get_user_pref(&self, user: &str) -> zbus::Result<String>;
    async fn analytics(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "homesight", about = "Homesight smart-home control CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a face from a photo (PNG or JPEG)
    Register {
        /// User name to register
        name: String,
        /// Path to the photo
        #[arg(short, long)]
        image: PathBuf,
    },
    /// List registered users
    Users,
    /// Remove a registered user and their gesture overrides
    Remove {
        name: String,
    },
    /// List devices with status and gesture bindings
    Devices,
    /// Add a device
    AddDevice {
        /// Unique device id (e.g., "light")
        id: String,
        /// Display name
        name: String,
        /// Gesture that switches it on
        #[arg(long, default_value = "OPEN_HAND")]
        on: String,
        /// Gesture that switches it off
        #[arg(long, default_value = "FIST")]
        off: String,
        /// Dashboard icon class
        #[arg(long, default_value = "fa-plug")]
        icon: String,
    },
    /// Remove a device
    RemoveDevice {
        id: String,
    },
    /// Switch a device on (default) or off
    Toggle {
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Set a user's personal gesture bindings for one device
    SetPref {
        user: String,
        device: String,
        /// Gesture that switches it on (omit to leave unbound)
        #[arg(long, default_value = "")]
        on: String,
        /// Gesture that switches it off (omit to leave unbound)
        #[arg(long, default_value = "")]
        off: String,
    },
    /// Show a user's personal gesture bindings
    GetPref {
        user: String,
    },
    /// Show per-user and per-hour usage counts
    Analytics,
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let connection = zbus::Connection::session()
        .await
        .context("connecting to the session bus (is homesightd running?)")?;
    let proxy = HomesightProxy::new(&connection).await?;

    match cli.command {
        Commands::Register { name, image } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            if proxy.register_image(&name, bytes).await? {
                println!("Registered: {name}");
            } else {
                println!("Registration failed: no usable face in the photo");
            }
        }
        Commands::Users => {
            let users = proxy.list_users().await?;
            if users.is_empty() {
                println!("No users registered");
            } else {
                for user in users {
                    println!("{user}");
                }
            }
        }
        Commands::Remove { name } => {
            if proxy.remove_user(&name).await? {
                println!("Removed: {name}");
            } else {
                println!("No such user: {name}");
            }
        }
        Commands::Devices => {
            print_json(&proxy.list_devices().await?)?;
        }
        Commands::AddDevice {
            id,
            name,
            on,
            off,
            icon,
        } => {
            if proxy.add_device(&id, &name, &on, &off, &icon).await? {
                println!("Added device: {id}");
            } else {
                println!("Device id already exists: {id}");
            }
        }
        Commands::RemoveDevice { id } => {
            if proxy.remove_device(&id).await? {
                println!("Removed device: {id}");
            } else {
                println!("No such device: {id}");
            }
        }
        Commands::Toggle { id, off } => {
            if proxy.toggle_device(&id, !off).await? {
                println!("{id} switched {}", if off { "OFF" } else { "ON" });
            } else {
                println!("{id}: no change");
            }
        }
        Commands::SetPref {
            user,
            device,
            on,
            off,
        } => {
            proxy.set_user_pref(&user, &device, &on, &off).await?;
            println!("Saved bindings for {user} on {device}");
        }
        Commands::GetPref { user } => {
            print_json(&proxy.get_user_pref(&user).await?)?;
        }
        Commands::Analytics => {
            print_json(&proxy.analytics().await?)?;
        }
        Commands::Status => {
            print_json(&proxy.status().await?)?;
        }
    }

    Ok(())
}

fn print_json(raw: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
