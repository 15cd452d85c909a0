//! VibroBox operator console
//!
//! Runs the tactile test suite against the motor array and writes results
//! and patient summaries to disk.
//!
//! # Usage
//!
//! ```bash
//! # List serial ports
//! vibrobox ports
//!
//! # Threshold test on the auto-detected controller
//! vibrobox --surname Ivanov threshold
//!
//! # Spatial test on a simulated array, with a training demo first
//! vibrobox --device simulate --surname Ivanov spatial --demo
//!
//! # Discrimination with a custom profile
//! vibrobox --profile profile.json --surname Ivanov discrimination
//!
//! # Patient summary from the latest saved results
//! vibrobox --surname Ivanov summary
//! ```

mod console;
mod storage;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use vibrobox_core::{
    DiscriminationResult, SpatialResult, Summary, TestProfile, ThresholdResult,
};
use vibrobox_native::{
    CancelReason, DemoPlayback, DiscriminationQueue, ProcedureEvent, RunOutcome, SimulatedPort,
    Supervisor,
};

use crate::console::{parse_category, parse_felt, Console, Interruption};
use crate::storage::{read_json, timestamp, ResultStore, TestKind};

/// Settle time between the start blink and the first stimulus
const START_DELAY: Duration = Duration::from_millis(1500);

/// VibroBox tactile diagnostics
#[derive(Parser, Debug)]
#[command(name = "vibrobox")]
#[command(author, version, about = "Vibration-motor tactile diagnostics", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Motor array connection
    #[arg(short, long, value_enum, default_value_t = DeviceKind::Usb)]
    device: DeviceKind,

    /// Serial port path (e.g., /dev/ttyACM0 or COM3); auto-detected if omitted
    #[arg(long)]
    port: Option<String>,

    /// Profile JSON file; built-in defaults if omitted
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Patient surname
    #[arg(short, long, default_value = "")]
    surname: String,

    /// Root directory for results
    #[arg(short, long, default_value = "outputs")]
    output: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DeviceKind {
    /// USB serial controller
    Usb,
    /// In-memory array, nothing is actuated
    Simulate,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    Ports,

    /// Print the effective profile as JSON
    Profile,

    /// Staircase threshold test (answer y/n)
    Threshold,

    /// Spatial localization test (answer the region number)
    Spatial {
        /// Play every region once before the test
        #[arg(long)]
        demo: bool,
    },

    /// Intensity discrimination test (answer the level number)
    Discrimination {
        /// Play every level once before the test
        #[arg(long)]
        demo: bool,
    },

    /// Build the patient summary from saved results
    Summary {
        /// Threshold result file; latest saved if omitted
        #[arg(long)]
        threshold: Option<PathBuf>,

        /// Spatial result file; latest saved if omitted
        #[arg(long)]
        spatial: Option<PathBuf>,

        /// Discrimination result file; latest saved if omitted
        #[arg(long)]
        discrimination: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("VibroBox v{}", env!("CARGO_PKG_VERSION"));

    let profile = load_profile(&cli)?;
    let store = ResultStore::new(&cli.output, &profile.surname);

    match cli.command {
        Commands::Ports => list_ports(),
        Commands::Profile => {
            println!("{}", serde_json::to_string_pretty(&profile)?);
            Ok(())
        }
        Commands::Summary {
            ref threshold,
            ref spatial,
            ref discrimination,
        } => write_summary(
            &store,
            &profile.surname,
            threshold.as_deref(),
            spatial.as_deref(),
            discrimination.as_deref(),
        ),
        Commands::Threshold => block_on(run_threshold(&cli, &profile, &store)),
        Commands::Spatial { demo } => block_on(run_spatial(&cli, &profile, &store, demo)),
        Commands::Discrimination { demo } => {
            block_on(run_discrimination(&cli, &profile, &store, demo))
        }
    }
}

fn block_on(task: impl std::future::Future<Output = anyhow::Result<()>>) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(task)
}

/// Profile from file (or defaults) with the command-line surname applied.
fn load_profile(cli: &Cli) -> anyhow::Result<TestProfile> {
    let mut profile = match &cli.profile {
        Some(path) => read_json::<TestProfile>(path)
            .with_context(|| format!("Invalid profile {}", path.display()))?,
        None => TestProfile::default(),
    };
    if !cli.surname.is_empty() {
        profile.surname.clone_from(&cli.surname);
    }
    Ok(profile)
}

// ============================================================================
// Hardware
// ============================================================================

fn list_ports() -> anyhow::Result<()> {
    #[cfg(feature = "usb")]
    {
        let ports = vibrobox_native::SerialActuator::list_ports();
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            match (port.description, port.vid) {
                (Some(description), Some(vid)) => {
                    println!("{}  {description} (VID {vid:04X})", port.name);
                }
                _ => println!("{}", port.name),
            }
        }
    }

    #[cfg(not(feature = "usb"))]
    {
        anyhow::bail!(
            "USB support not enabled. Rebuild with --features usb:\n\
             cargo run -p vibrobox-app --features usb"
        );
    }

    Ok(())
}

fn connect(cli: &Cli, profile: &TestProfile) -> anyhow::Result<Supervisor> {
    match cli.device {
        DeviceKind::Simulate => {
            warn!("Simulated motor array: nothing will be actuated");
            Ok(Supervisor::new(SimulatedPort::new(profile.motor_count)))
        }
        DeviceKind::Usb => connect_usb(cli.port.as_deref(), profile.motor_count),
    }
}

#[cfg(feature = "usb")]
fn connect_usb(port: Option<&str>, motor_count: usize) -> anyhow::Result<Supervisor> {
    use vibrobox_native::bridge::{SerialActuator, DEFAULT_BAUD_RATE};

    let actuator = match port {
        Some(port) => SerialActuator::open(port, DEFAULT_BAUD_RATE, motor_count)
            .with_context(|| format!("Failed to open {port}"))?,
        None => SerialActuator::connect_auto(None, DEFAULT_BAUD_RATE, motor_count)
            .context("Motor controller not found; pass --port or use --device simulate")?,
    };
    info!("Using {}", actuator.port_name());
    Ok(Supervisor::new(actuator))
}

#[cfg(not(feature = "usb"))]
fn connect_usb(_port: Option<&str>, _motor_count: usize) -> anyhow::Result<Supervisor> {
    anyhow::bail!(
        "USB support not enabled. Rebuild with --features usb, or use --device simulate"
    );
}

// ============================================================================
// Procedures
// ============================================================================

fn report_cancel(reason: &CancelReason) {
    match reason {
        CancelReason::Requested => println!("Test stopped, nothing saved"),
        CancelReason::Hardware(e) => println!("Test aborted: {e}"),
    }
}

async fn play_demo(
    supervisor: &mut Supervisor,
    console: &mut Console,
    demo: DemoPlayback,
    profile: &TestProfile,
) -> anyhow::Result<()> {
    println!("Training playback ({} stimuli), q to skip", demo.stimuli().len());
    let mut handle = supervisor.start_demo(demo, profile).await?;
    console.drive(&mut handle, |_| None, false, |_| {}).await;
    handle.outcome().await?;
    supervisor.stop().await?;
    Ok(())
}

/// Blink the array, then give the patient a moment before the first stimulus.
async fn announce_start(supervisor: &mut Supervisor, profile: &TestProfile) -> anyhow::Result<()> {
    supervisor.begin_indicator(profile).await?;
    tokio::time::sleep(START_DELAY).await;
    Ok(())
}

async fn run_threshold(cli: &Cli, profile: &TestProfile, store: &ResultStore) -> anyhow::Result<()> {
    let mut supervisor = connect(cli, profile)?;
    let mut console = Console::stdin();

    println!("Threshold test: answer y (felt) or n (not felt), q to stop");
    announce_start(&mut supervisor, profile).await?;
    let mut handle = supervisor.start_threshold(profile).await?;
    console.drive(&mut handle, parse_felt, false, |_| {}).await;
    let outcome = handle.outcome().await?;
    supervisor.stop().await?;

    match outcome {
        RunOutcome::Completed(result) => {
            for (motor, threshold) in &result.thresholds {
                println!("Motor {motor}: {threshold} PWM");
            }
            store.save_result(TestKind::Threshold, &result, &timestamp())?;
        }
        RunOutcome::Cancelled { reason, .. } => report_cancel(&reason),
    }
    Ok(())
}

async fn run_spatial(
    cli: &Cli,
    profile: &TestProfile,
    store: &ResultStore,
    demo: bool,
) -> anyhow::Result<()> {
    let mut supervisor = connect(cli, profile)?;
    let mut console = Console::stdin();

    if demo {
        play_demo(&mut supervisor, &mut console, DemoPlayback::spatial(profile)?, profile).await?;
    }

    println!("Spatial test: answer the region number, q to stop");
    announce_start(&mut supervisor, profile).await?;
    let mut handle = supervisor.start_spatial(profile).await?;
    console.drive(&mut handle, parse_category, false, |_| {}).await;
    let outcome = handle.outcome().await?;
    supervisor.stop().await?;

    match outcome {
        RunOutcome::Completed(result) => {
            let correct = result.answers.iter().filter(|(t, r)| t == r).count();
            println!("{correct}/{} correct", result.answers.len());
            store.save_result(TestKind::Spatial, &result, &timestamp())?;
        }
        RunOutcome::Cancelled { reason, .. } => report_cancel(&reason),
    }
    Ok(())
}

async fn run_discrimination(
    cli: &Cli,
    profile: &TestProfile,
    store: &ResultStore,
    demo: bool,
) -> anyhow::Result<()> {
    let mut supervisor = connect(cli, profile)?;
    let mut console = Console::stdin();
    let mut queue = DiscriminationQueue::new(profile.selected_motors());

    if demo {
        let playback = DemoPlayback::levels(profile, queue.motors())?;
        play_demo(&mut supervisor, &mut console, playback, profile).await?;
    }

    println!(
        "Discrimination test: answer the level 1-{}, q to stop, demo to retrain, rewrite <motor> to redo a motor",
        profile.discrimination.levels.len()
    );
    announce_start(&mut supervisor, profile).await?;

    loop {
        let batch = queue.next_batch();
        if batch.is_empty() {
            break;
        }
        info!(?batch, "Discrimination batch");

        let mut current = None;
        let mut handle = supervisor.start_discrimination(profile, &batch).await?;
        let interruption = console
            .drive(&mut handle, parse_category, true, |event| match event {
                ProcedureEvent::Progress(progress) => current = progress.motor,
                ProcedureEvent::MotorCompleted { motor, trials } => {
                    queue.record_motor(*motor, trials.clone());
                }
                _ => {}
            })
            .await;
        let outcome = handle.outcome().await?;
        supervisor.stop().await?;

        let reason = match outcome {
            RunOutcome::Completed(run) => {
                queue.absorb(run);
                continue;
            }
            RunOutcome::Cancelled { reason, partial } => {
                if let Some(run) = partial {
                    queue.absorb(run);
                }
                reason
            }
        };

        match (interruption, reason) {
            (_, CancelReason::Hardware(e)) => {
                println!("Test aborted: {e}");
                break;
            }
            (Some(Interruption::Rewrite(motor)), CancelReason::Requested) => {
                if let Some(current) = current {
                    queue.interrupt(current);
                }
                if queue.rewrite(motor) {
                    println!("Motor {motor} will be run again");
                } else {
                    println!("Motor {motor} is not part of this session");
                }
            }
            (Some(Interruption::Demo), CancelReason::Requested) => {
                if let Some(current) = current {
                    queue.interrupt(current);
                }
                let playback = DemoPlayback::levels(profile, &queue.unfinished())?;
                play_demo(&mut supervisor, &mut console, playback, profile).await?;
            }
            (Some(Interruption::Quit) | None, CancelReason::Requested) => {
                println!("Test stopped");
                break;
            }
        }
    }

    if queue.completed_motors().is_empty() {
        println!("No motor finished, nothing saved");
        return Ok(());
    }
    if !queue.is_complete() {
        warn!(missing = ?queue.unfinished(), "Saving incomplete discrimination session");
    }
    let result = queue.finish(profile.discrimination.sorted_levels(), profile.discrimination.repeats)?;
    for (motor, accuracy) in &result.per_motor_accuracy {
        println!("Motor {motor}: {:.1} % correct", accuracy * 100.0);
    }
    store.save_result(TestKind::Discrimination, &result, &timestamp())?;
    Ok(())
}

// ============================================================================
// Summary
// ============================================================================

fn load_or_latest<T: serde::de::DeserializeOwned>(
    store: &ResultStore,
    kind: TestKind,
    explicit: Option<&std::path::Path>,
) -> anyhow::Result<Option<T>> {
    match explicit {
        Some(path) => read_json(path).map(Some),
        None => store.latest_result(kind),
    }
}

fn write_summary(
    store: &ResultStore,
    surname: &str,
    threshold: Option<&std::path::Path>,
    spatial: Option<&std::path::Path>,
    discrimination: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let threshold: Option<ThresholdResult> = load_or_latest(store, TestKind::Threshold, threshold)?;
    let spatial: Option<SpatialResult> = load_or_latest(store, TestKind::Spatial, spatial)?;
    let discrimination: Option<DiscriminationResult> =
        load_or_latest(store, TestKind::Discrimination, discrimination)?;

    let summary = Summary::build(
        surname,
        timestamp(),
        threshold.as_ref(),
        spatial.as_ref(),
        discrimination.as_ref(),
    )?;
    let (json, txt) = store.save_summary(&summary)?;
    print!("{}", summary.render_text());
    println!("Saved {} and {}", json.display(), txt.display());
    Ok(())
}
