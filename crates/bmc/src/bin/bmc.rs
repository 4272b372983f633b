//! BMC CLI - boot configuration and firmware management over Redfish.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use bmc::boot_order::{parse_comma_list, read_boot_order_file};
use bmc::error::{EXIT_GENERAL_ERROR, EXIT_INVALID_ARGUMENTS, EXIT_SUCCESS};
use bmc::session::DEFAULT_TIMEOUT_SECS;
use bmc::{
    BmcError, BootOptionKind, BootSourceTarget, Manufacturer, PxeProtocol, PxeSetupOptions,
    Redfish, RedfishConfig, ResetType, TpmState,
};

/// BMC CLI - manage server boot order, PXE and firmware through Redfish.
#[derive(Parser)]
#[command(name = "bmc", version)]
#[command(about = "Manage server boot configuration and firmware over Redfish")]
struct Cli {
    /// BMC address or URL (or set `BMC_HOST` env var).
    #[arg(long, env = "BMC_HOST")]
    host: String,

    /// BMC username (or set `BMC_USERNAME` env var).
    #[arg(short, long, env = "BMC_USERNAME")]
    username: String,

    /// BMC password (or set `BMC_PASSWORD` env var).
    #[arg(short, long, env = "BMC_PASSWORD", hide_env_values = true)]
    password: String,

    /// Skip detection and assume this manufacturer (dell, asus, supermicro).
    #[arg(long, env = "BMC_MANUFACTURER")]
    manufacturer: Option<Manufacturer>,

    /// Accept self-signed TLS certificates.
    #[arg(long, env = "BMC_INSECURE")]
    insecure: bool,

    /// Per-request timeout in seconds.
    #[arg(long, env = "BMC_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Show manufacturer, model and supported capabilities.
    Info,

    /// Boot order and boot options.
    #[command(subcommand)]
    Boot(BootCommand),

    /// Firmware inventory and updates.
    #[command(subcommand)]
    Firmware(FirmwareCommand),

    /// Power control.
    #[command(subcommand)]
    System(SystemCommand),

    /// TPM control.
    #[command(subcommand)]
    Tpm(TpmCommand),

    /// Network boot enablement.
    #[command(subcommand)]
    Pxe(PxeCommand),

    /// Dell iDRAC operations.
    #[command(subcommand)]
    Dell(DellCommand),
}

#[derive(Subcommand)]
enum BootCommand {
    /// Show the boot order.
    GetOrder {
        /// Show the order staged for the next boot instead.
        #[arg(long, conflicts_with = "save")]
        staged: bool,

        /// Also write the order to this file, one reference per line.
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Replace the boot order (must list every boot option).
    SetOrder {
        /// Comma-separated boot option references.
        #[arg(long, conflicts_with = "order_file", required_unless_present = "order_file")]
        order: Option<String>,

        /// File with one boot option reference per line.
        #[arg(long)]
        order_file: Option<PathBuf>,
    },

    /// List boot options.
    ListOptions {
        /// Fetch again even if cached.
        #[arg(long)]
        no_cache: bool,
    },

    /// Find the boot option of a NIC.
    FindByMac {
        mac: String,

        /// Only consider options of this type (pxe, http, hdd, cd, usb, other).
        #[arg(long = "type")]
        kind: Option<BootOptionKind>,

        #[arg(long)]
        no_cache: bool,
    },

    /// Find a boot option by display name.
    FindByAlias {
        alias: String,

        #[arg(long)]
        no_cache: bool,
    },

    /// Move the boot option of a NIC to the front of the boot order.
    FirstByMac { mac: String },

    /// Boot a target once on the next restart.
    Once {
        /// Pxe, Cd, Usb, Hdd, BiosSetup, UefiShell, UefiHttp or None.
        target: BootSourceTarget,
    },
}

#[derive(Subcommand)]
enum FirmwareCommand {
    /// List installed firmware.
    Inventory,

    /// Show update service status.
    Status,

    /// Upload a BIOS image.
    UpdateBios { file: PathBuf },

    /// Upload a BMC image.
    UpdateBmc {
        file: PathBuf,

        /// Do not preserve BMC configuration.
        #[arg(long)]
        no_preserve_config: bool,
    },
}

#[derive(Subcommand)]
enum SystemCommand {
    /// Reset the system.
    Reset {
        /// Reset type (defaults to a graceful restart when supported).
        #[arg(long = "type")]
        reset_type: Option<ResetType>,
    },

    /// List supported reset types.
    ResetTypes,
}

#[derive(Subcommand)]
enum TpmCommand {
    /// Show the TPM state.
    GetState,

    /// Stage a TPM state for the next boot.
    SetState { state: TpmState },
}

#[derive(Subcommand)]
enum PxeCommand {
    /// Enable network boot on a NIC and reboot if needed.
    Setup {
        mac: String,

        /// Stage the change without resetting the system.
        #[arg(long)]
        no_reboot: bool,

        /// IP stack to boot over (ipv4, ipv6, ipv4andipv6).
        #[arg(long, default_value = "ipv4")]
        protocol: PxeProtocol,
    },

    /// Show whether network boot is enabled on a NIC.
    Check { mac: String },
}

#[derive(Subcommand)]
enum DellCommand {
    /// Set the next one-time boot source.
    OnetimeBoot { target: BootSourceTarget },

    /// Create a custom iDRAC role.
    CreateRole {
        name: String,

        /// Privilege bitmask.
        #[arg(long)]
        privileges: u32,
    },

    /// Block or allow local iDRAC configuration.
    LocalAccess {
        #[arg(long, conflicts_with = "enable", required_unless_present = "enable")]
        disable: bool,

        #[arg(long)]
        enable: bool,
    },

    /// Show OEM network attributes of a NIC.
    NicAttrs { mac: String },

    /// List network interfaces.
    Nics,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                EXIT_INVALID_ARGUMENTS
            } else {
                EXIT_SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("{} {err:#}", "Error:".red().bold());
        std::process::exit(exit_code(&err));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<BmcError>()
        .map_or(EXIT_GENERAL_ERROR, BmcError::exit_code)
}

async fn run(cli: Cli) -> Result<()> {
    check_input_files(&cli.command)?;

    let config = RedfishConfig::new(&cli.host, &cli.username, &cli.password)
        .with_insecure(cli.insecure)
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_manufacturer(cli.manufacturer);

    let client = Redfish::connect(config)
        .await
        .with_context(|| format!("Failed to connect to BMC at {}", cli.host))?;

    let result = execute(&client, cli.command).await;
    if let Err(e) = client.close().await {
        warn!(error = %e, "Failed to close Redfish session");
    }

    print_output(cli.output, &result?);
    Ok(())
}

/// Fail on missing input files before any request is made.
fn check_input_files(command: &Commands) -> std::result::Result<(), BmcError> {
    let path: Option<&Path> = match command {
        Commands::Boot(BootCommand::SetOrder {
            order_file: Some(path),
            ..
        })
        | Commands::Firmware(
            FirmwareCommand::UpdateBios { file: path }
            | FirmwareCommand::UpdateBmc { file: path, .. },
        ) => Some(path.as_path()),
        _ => None,
    };

    match path {
        Some(path) if !path.exists() => Err(BmcError::FileNotFound(path.to_path_buf())),
        _ => Ok(()),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to serialize output")
}

#[allow(clippy::too_many_lines)]
async fn execute(client: &Redfish, command: Commands) -> Result<Value> {
    let value = match command {
        Commands::Info => to_value(&client.system_info().await?)?,

        Commands::Boot(command) => match command {
            BootCommand::GetOrder { staged, save } => {
                let order = match (staged, save) {
                    (true, _) => client.pending_boot_order().await?,
                    (false, Some(path)) => client.save_boot_order(&path).await?,
                    (false, None) => client.boot_order(true).await?,
                };
                json!({ "boot_order": order, "staged": staged })
            }
            BootCommand::SetOrder { order, order_file } => {
                let order = match (order, order_file) {
                    (Some(list), _) => parse_comma_list(&list)?,
                    (None, Some(path)) => read_boot_order_file(&path).await?,
                    (None, None) => {
                        return Err(BmcError::InvalidArgument(
                            "either --order or --order-file is required".to_string(),
                        )
                        .into())
                    }
                };
                client.set_boot_order(&order).await?;
                json!({ "boot_order": order, "applied": true })
            }
            BootCommand::ListOptions { no_cache } => to_value(&client.boot_options(no_cache).await?)?,
            BootCommand::FindByMac {
                mac,
                kind,
                no_cache,
            } => to_value(&client.boot_option_by_mac(&mac, kind, no_cache).await?)?,
            BootCommand::FindByAlias { alias, no_cache } => {
                to_value(&client.boot_option_by_alias(&alias, no_cache).await?)?
            }
            BootCommand::FirstByMac { mac } => {
                let order = client.boot_first_by_mac(&mac).await?;
                json!({ "boot_order": order })
            }
            BootCommand::Once { target } => {
                client.set_one_time_boot(target).await?;
                json!({ "one_time_boot": target })
            }
        },

        Commands::Firmware(command) => match command {
            FirmwareCommand::Inventory => to_value(&client.firmware_inventory().await?)?,
            FirmwareCommand::Status => to_value(&client.update_service_status().await?)?,
            FirmwareCommand::UpdateBios { file } => to_value(&client.update_bios(&file).await?)?,
            FirmwareCommand::UpdateBmc {
                file,
                no_preserve_config,
            } => to_value(&client.update_bmc(&file, !no_preserve_config).await?)?,
        },

        Commands::System(command) => match command {
            SystemCommand::Reset { reset_type } => {
                let used = client.reset_system(reset_type).await?;
                json!({ "reset_type": used })
            }
            SystemCommand::ResetTypes => {
                json!({ "reset_types": client.reset_types().await? })
            }
        },

        Commands::Tpm(command) => match command {
            TpmCommand::GetState => json!({ "tpm_state": client.tpm_state().await? }),
            TpmCommand::SetState { state } => {
                client.set_tpm_state(state).await?;
                json!({ "tpm_state": state, "staged": true })
            }
        },

        Commands::Pxe(command) => match command {
            PxeCommand::Setup {
                mac,
                no_reboot,
                protocol,
            } => {
                let options = PxeSetupOptions {
                    protocol,
                    reboot: !no_reboot,
                };
                let report = client.setup_pxe(&mac, options).await?;
                if report.result.needs_followup() {
                    eprintln!(
                        "{} run `bmc boot first-by-mac {mac}` once the system has rebooted",
                        "Next:".yellow().bold()
                    );
                }
                to_value(&report)?
            }
            PxeCommand::Check { mac } => to_value(&client.check_pxe(&mac).await?)?,
        },

        Commands::Dell(command) => {
            let dell = client.vendor().as_dell()?;
            match command {
                DellCommand::OnetimeBoot { target } => {
                    client.set_one_time_boot(target).await?;
                    json!({ "one_time_boot": target })
                }
                DellCommand::CreateRole { name, privileges } => {
                    to_value(&dell.create_role(&name, privileges).await?)?
                }
                DellCommand::LocalAccess { disable, .. } => {
                    to_value(&dell.set_local_access(disable).await?)?
                }
                DellCommand::NicAttrs { mac } => client.nic_attributes(&mac).await?,
                DellCommand::Nics => to_value(&client.network_interfaces().await?)?,
            }
        }
    };

    Ok(value)
}

fn print_output(format: OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            );
        }
        OutputFormat::Text => print_text(value, 0),
    }
}

fn print_text(value: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::Object(_) | Value::Array(_) => {
                        println!("{pad}{}:", key.bold());
                        print_text(value, indent + 1);
                    }
                    _ => println!("{pad}{}: {}", key.bold(), scalar(value)),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        print_text(item, indent);
                        println!();
                    }
                    _ => println!("{pad}{}", scalar(item)),
                }
            }
        }
        _ => println!("{pad}{}", scalar(value)),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
