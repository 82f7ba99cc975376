use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use droid_mirror::bridge::Device;
use droid_mirror::mirror::MirrorOptions;
use droid_mirror::process::SystemRunner;
use droid_mirror::utils::config::DEFAULT_WIFI_PORT;
use droid_mirror::utils::hints;
use droid_mirror::{Config, ConsoleEventListener, Controller, ControllerHandle, MirrorError};

#[derive(Parser)]
#[command(name = "droid-mirror")]
#[command(version)]
#[command(about = "Mirror an Android device's screen with scrcpy over USB or Wi-Fi", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    mirror: MirrorArgs,

    /// adb executable to use instead of searching for one
    #[arg(long, env = "DROID_MIRROR_ADB", global = true, value_name = "PATH")]
    adb: Option<PathBuf>,

    /// scrcpy executable to use instead of searching for one
    #[arg(long, env = "DROID_MIRROR_SCRCPY", global = true, value_name = "PATH")]
    scrcpy: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached devices
    Devices {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restart the adb server
    RestartServer,

    /// Check adb and scrcpy and report supported scrcpy options
    Doctor,

    /// Device setup, troubleshooting and usage tips
    Guide,
}

/// Options for the default mirroring flow
#[derive(Args, Debug)]
struct MirrorArgs {
    /// Connect to a device attached over USB
    #[arg(long, conflicts_with = "wifi")]
    usb: bool,

    /// Connect over Wi-Fi to this IPv4 address
    #[arg(long, value_name = "IP")]
    wifi: Option<String>,

    /// Serial of the device to mirror
    #[arg(short, long, value_name = "SERIAL")]
    device: Option<String>,

    /// Limit the longest side of the video (0 keeps the device resolution)
    #[arg(long, value_name = "PIXELS")]
    max_size: Option<String>,

    /// Video bit rate, e.g. 8M
    #[arg(long, value_name = "RATE")]
    bit_rate: Option<String>,

    /// Mirror only; do not forward keyboard and mouse
    #[arg(long)]
    no_control: bool,

    /// Do not forward device audio
    #[arg(long)]
    no_audio: bool,

    /// Do not force h264 at 60 fps
    #[arg(long)]
    no_video_optimization: bool,

    /// Start in fullscreen
    #[arg(long)]
    fullscreen: bool,

    /// adb TCP/IP port used with --wifi
    #[arg(long, default_value_t = DEFAULT_WIFI_PORT)]
    port: u16,

    /// How long scrcpy must stay up to count as started
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    grace_ms: u64,
}

impl MirrorArgs {
    fn options(&self) -> droid_mirror::Result<MirrorOptions> {
        Ok(MirrorOptions {
            max_size: match self.max_size {
                Some(ref size) => MirrorOptions::parse_max_size(size)?,
                None => None,
            },
            bit_rate: match self.bit_rate {
                Some(ref rate) => MirrorOptions::parse_bit_rate(rate)?,
                None => None,
            },
            disable_control: self.no_control,
            disable_audio: self.no_audio,
            disable_video_optimization: self.no_video_optimization,
            fullscreen: self.fullscreen,
        })
    }
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            adb_path: self.adb.clone(),
            scrcpy_path: self.scrcpy.clone(),
            wifi_port: self.mirror.port,
            launch_grace: Duration::from_millis(self.mirror.grace_ms),
            ..Config::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Usb,
    Wifi(String),
}

enum Outcome {
    Done,
    Cancelled,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // JSON output has no console listener, so warnings go to the logger
    let json = matches!(cli.command, Some(Commands::Devices { json: true }));
    init_logging(cli.verbose, json);

    let handle = Controller::spawn(cli.config(), Arc::new(SystemRunner));
    let listener = if json {
        None
    } else {
        Some(tokio::spawn(ConsoleEventListener::listen(handle.subscribe())))
    };

    let outcome = match cli.command {
        None => mirror(&handle, &cli.mirror).await,
        Some(Commands::Devices { json }) => devices(&handle, json).await,
        Some(Commands::RestartServer) => handle
            .restart_server()
            .await
            .map(|_| Outcome::Done)
            .map_err(Into::into),
        Some(Commands::Doctor) => doctor(&handle).await,
        Some(Commands::Guide) => {
            print_guide();
            Ok(Outcome::Done)
        }
    };

    if let Err(e) = handle.shutdown().await {
        log::debug!("shutdown: {}", e);
    }
    drop(handle);
    if let Some(listener) = listener {
        let _ = tokio::time::timeout(Duration::from_millis(500), listener).await;
    }

    match outcome {
        Ok(Outcome::Done) => Ok(()),
        Ok(Outcome::Cancelled) => {
            println!("Cancelled.");
            // A prompt thread may still be blocked on stdin
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "debug"
    } else if json {
        "warn"
    } else {
        "off"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

/// Ctrl+C presses, forwarded from the signal handler
type Interrupts = UnboundedReceiver<()>;

/// Await `work` unless Ctrl+C arrives first
async fn interruptible<T>(interrupts: &mut Interrupts, work: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        out = work => Some(out),
        Some(()) = interrupts.recv() => None,
    }
}

/// Run a blocking prompt off the runtime so Ctrl+C can still cancel it
async fn ask<T, F>(interrupts: &mut Interrupts, prompt: F) -> anyhow::Result<Option<T>>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<Option<T>> + Send + 'static,
{
    match interruptible(interrupts, tokio::task::spawn_blocking(prompt)).await {
        Some(answer) => Ok(answer??),
        None => Ok(None),
    }
}

/// Evaluate a stage, returning `Cancelled` from the caller on Ctrl+C
macro_rules! stage {
    ($interrupts:expr, $work:expr) => {
        match interruptible($interrupts, $work).await {
            Some(result) => result,
            None => return Ok(Outcome::Cancelled),
        }
    };
}

async fn mirror(handle: &ControllerHandle, args: &MirrorArgs) -> anyhow::Result<Outcome> {
    let options = args.options()?;

    // Installed before any adb call so an interrupt at any stage still reaches cleanup
    let (interrupt_tx, mut interrupts) = tokio::sync::mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })?;

    stage!(&mut interrupts, handle.check_dependencies())?;

    let mode = match (&args.wifi, args.usb || args.device.is_some()) {
        (Some(ip), _) => Mode::Wifi(ip.clone()),
        (None, true) => Mode::Usb,
        (None, false) => match ask(&mut interrupts, prompt_mode).await? {
            Some(mode) => mode,
            None => return Ok(Outcome::Cancelled),
        },
    };

    match mode {
        Mode::Wifi(ip) => {
            stage!(&mut interrupts, handle.connect_wifi(&ip))?;
        }
        Mode::Usb => match args.device {
            Some(ref serial) => {
                stage!(&mut interrupts, handle.connect_usb_device(serial))?;
            }
            None => match stage!(&mut interrupts, handle.connect_usb()) {
                Ok(_) => {}
                Err(MirrorError::SelectionRequired(devices)) => {
                    match ask(&mut interrupts, move || prompt_device(&devices)).await? {
                        Some(serial) => {
                            stage!(&mut interrupts, handle.connect_usb_device(&serial))?;
                        }
                        None => return Ok(Outcome::Cancelled),
                    }
                }
                Err(e) => return Err(e.into()),
            },
        },
    }

    // An interrupted start is still stopped by the shutdown queued behind it
    stage!(
        &mut interrupts,
        handle.start_mirroring(args.device.clone(), options)
    )?;
    println!("  Close the scrcpy window or press Ctrl+C to stop.");

    match interruptible(&mut interrupts, handle.wait_mirroring()).await {
        Some(exit) => {
            if let Some(exit) = exit? {
                if !exit.success() && !exit.stderr_tail.is_empty() {
                    eprintln!("{}", exit.stderr_tail.dimmed());
                }
            }
        }
        None => {
            println!("\n{} Stopping mirroring...", "⏹".yellow());
            handle.stop_mirroring().await?;
        }
    }

    Ok(Outcome::Done)
}

async fn devices(handle: &ControllerHandle, json: bool) -> anyhow::Result<Outcome> {
    let devices = handle.scan_devices().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    }
    Ok(Outcome::Done)
}

async fn doctor(handle: &ControllerHandle) -> anyhow::Result<Outcome> {
    let report = handle.check_dependencies().await?;
    let caps = handle.refresh_capabilities().await?;

    println!("\n{}", "scrcpy options".bold());
    for (flag, supported) in [
        ("--audio-codec", caps.has_audio_codec_flag),
        ("--video-codec", caps.has_video_codec_flag),
        ("--max-fps", caps.has_max_fps_flag),
        ("--video-bit-rate", caps.has_video_bit_rate_flag),
    ] {
        let mark = if supported { "✓".green() } else { "✗".red() };
        println!("  {} {}", mark, flag);
    }
    match report.mirror_version {
        Some(version) if version.supports_audio() => {
            println!("  {} audio forwarding (scrcpy {})", "✓".green(), version)
        }
        Some(version) => println!("  {} audio forwarding (scrcpy {})", "✗".red(), version),
        None => println!("  {} audio forwarding (unknown version)", "?".yellow()),
    }

    println!();
    handle.scan_devices().await?;
    Ok(Outcome::Done)
}

fn print_guide() {
    for (title, body) in [
        ("Device setup", hints::DEVICE_SETUP),
        ("Troubleshooting", hints::TROUBLESHOOTING),
        ("Tips", hints::TIPS),
        ("Examples", hints::USAGE_EXAMPLES),
    ] {
        println!("{}\n{}\n", title.bold().underline(), body);
    }
    println!("{}\n{}\n", "Installing adb".bold().underline(), hints::adb_install_hint());
    println!("{}\n{}", "Installing scrcpy".bold().underline(), hints::scrcpy_install_hint());
}

/// Read one answer; `None` on EOF, empty input or `q`
fn prompt(question: &str) -> io::Result<Option<String>> {
    print!("{}", question);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let answer = line.trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case("q") {
        Ok(None)
    } else {
        Ok(Some(answer.to_string()))
    }
}

fn prompt_mode() -> io::Result<Option<Mode>> {
    println!("\n{}", "How is the device connected?".bold());
    println!("  1) USB");
    println!("  2) Wi-Fi");

    loop {
        let Some(answer) = prompt("Choose [1-2, q to quit]: ")? else {
            return Ok(None);
        };
        match answer.as_str() {
            "1" => return Ok(Some(Mode::Usb)),
            "2" => return Ok(prompt("Device IP address: ")?.map(Mode::Wifi)),
            other => println!("Invalid choice: {}", other),
        }
    }
}

fn prompt_device(devices: &[Device]) -> io::Result<Option<String>> {
    println!("\n{}", "Several devices are ready:".bold());
    for (i, device) in devices.iter().enumerate() {
        println!("  {}) {}", i + 1, device.identifier);
    }

    loop {
        let question = format!("Choose [1-{}, q to quit]: ", devices.len());
        let Some(answer) = prompt(&question)? else {
            return Ok(None);
        };
        match pick_device(devices, &answer) {
            Some(serial) => return Ok(Some(serial)),
            None => println!("Enter a number between 1 and {}", devices.len()),
        }
    }
}

/// Map a 1-based menu answer to a device serial
fn pick_device(devices: &[Device], answer: &str) -> Option<String> {
    let index = answer.trim().parse::<usize>().ok()?;
    index
        .checked_sub(1)
        .and_then(|i| devices.get(i))
        .map(|d| d.identifier.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use droid_mirror::bridge::DeviceState;

    #[test]
    fn test_usb_and_wifi_conflict() {
        assert!(Cli::try_parse_from(["droid-mirror", "--usb", "--wifi", "192.168.1.2"]).is_err());
    }

    #[test]
    fn test_mirror_flags() {
        let cli = Cli::try_parse_from([
            "droid-mirror",
            "--wifi",
            "192.168.1.100",
            "--max-size",
            "1024",
            "--bit-rate",
            "8M",
            "--no-audio",
            "--fullscreen",
        ])
        .unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.mirror.wifi.as_deref(), Some("192.168.1.100"));

        let options = cli.mirror.options().unwrap();
        assert_eq!(options.max_size, Some(1024));
        assert_eq!(options.bit_rate.as_deref(), Some("8M"));
        assert!(options.disable_audio);
        assert!(options.fullscreen);
        assert!(!options.disable_control);
    }

    #[test]
    fn test_defaults_feed_config() {
        let cli = Cli::try_parse_from(["droid-mirror", "--usb", "--grace-ms", "500"]).unwrap();
        let config = cli.config();

        assert_eq!(config.wifi_port, 5555);
        assert_eq!(config.launch_grace, Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_max_size_rejected() {
        let cli = Cli::try_parse_from(["droid-mirror", "--usb", "--max-size", "huge"]).unwrap();
        assert!(matches!(
            cli.mirror.options(),
            Err(MirrorError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_subcommands() {
        let cli = Cli::try_parse_from(["droid-mirror", "devices", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Devices { json: true })));

        let cli = Cli::try_parse_from(["droid-mirror", "doctor", "-v"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Doctor)));
        assert!(cli.verbose);
    }

    #[tokio::test]
    async fn test_interrupt_cancels_pending_stage() {
        let (tx, mut interrupts) = tokio::sync::mpsc::unbounded_channel();
        tx.send(()).unwrap();

        let out = interruptible(&mut interrupts, std::future::pending::<()>()).await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_stage_completes_without_interrupt() {
        let (tx, mut interrupts) = tokio::sync::mpsc::unbounded_channel::<()>();
        assert_eq!(interruptible(&mut interrupts, async { 7 }).await, Some(7));

        // A dropped handler must not read as an interrupt
        drop(tx);
        assert_eq!(interruptible(&mut interrupts, async { 8 }).await, Some(8));
    }

    #[tokio::test]
    async fn test_interrupted_stage_returns_cancelled() {
        async fn connect_then_start(interrupts: &mut Interrupts) -> anyhow::Result<Outcome> {
            stage!(interrupts, std::future::pending::<anyhow::Result<()>>())?;
            unreachable!("stage was interrupted");
        }

        let (tx, mut interrupts) = tokio::sync::mpsc::unbounded_channel();
        tx.send(()).unwrap();
        let outcome = connect_then_start(&mut interrupts).await.unwrap();
        assert!(matches!(outcome, Outcome::Cancelled));
    }

    #[tokio::test]
    async fn test_interrupt_cancels_prompt() {
        let (tx, mut interrupts) = tokio::sync::mpsc::unbounded_channel();
        tx.send(()).unwrap();

        let answer = ask(&mut interrupts, || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(Some(Mode::Usb))
        })
        .await
        .unwrap();
        assert_eq!(answer, None);
    }

    #[test]
    fn test_pick_device() {
        let devices = vec![
            Device {
                identifier: "AAA".into(),
                state: DeviceState::Ready,
            },
            Device {
                identifier: "BBB".into(),
                state: DeviceState::Ready,
            },
        ];

        assert_eq!(pick_device(&devices, "2").as_deref(), Some("BBB"));
        assert_eq!(pick_device(&devices, " 1 ").as_deref(), Some("AAA"));
        assert_eq!(pick_device(&devices, "0"), None);
        assert_eq!(pick_device(&devices, "3"), None);
        assert_eq!(pick_device(&devices, "x"), None);
    }
}
