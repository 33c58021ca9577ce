//! keytone - play sine tones from the computer keyboard
//!
//! Run with: cargo run -- --base-freq 440

use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use keytone::{
    io::{
        audio::{list_output_devices, CpalDevice},
        scale::KeyboardRow,
    },
    runtime::KeyTone,
    EngineConfig, InputMode, Keymap,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Row {
    Top,
    Home,
    Bottom,
}

impl From<Row> for KeyboardRow {
    fn from(row: Row) -> Self {
        match row {
            Row::Top => KeyboardRow::Top,
            Row::Home => KeyboardRow::Home,
            Row::Bottom => KeyboardRow::Bottom,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Input {
    Auto,
    Polled,
    SingleKey,
}

impl From<Input> for InputMode {
    fn from(input: Input) -> Self {
        match input {
            Input::Auto => InputMode::Auto,
            Input::Polled => InputMode::Polled,
            Input::SingleKey => InputMode::SingleKey,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "keytone", about = "Hold keys to play sine tones")]
struct Cli {
    /// Frequency of the lowest key in Hz. Asked for on stdin if omitted.
    #[arg(short = 'f', long)]
    base_freq: Option<f64>,

    /// Keys to play, lowest pitch first. Overrides --row.
    #[arg(short, long)]
    keys: Option<String>,

    /// Keyboard row to play on.
    #[arg(long, value_enum, default_value_t = Row::Home)]
    row: Row,

    /// Scale steps per octave. Defaults to the number of keys.
    #[arg(long)]
    steps: Option<usize>,

    /// Length of each generated block in milliseconds.
    #[arg(long, default_value_t = 100)]
    block_ms: u64,

    /// Peak level of each note, in (0, 1].
    #[arg(short, long, default_value_t = 0.25)]
    amplitude: f32,

    /// Output sample rate. Defaults to the device's rate.
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Output device name (see --list-devices).
    #[arg(short, long)]
    device: Option<String>,

    /// How held keys are detected.
    #[arg(long, value_enum, default_value_t = Input::Auto)]
    input: Input,

    /// Single-key mode: milliseconds a key stays held after its last repeat.
    #[arg(long, default_value_t = 650)]
    hold_ms: u64,

    /// Print output devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Write log lines here instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    if cli.list_devices {
        for name in list_output_devices().wrap_err("failed to list output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let base_freq = match cli.base_freq {
        Some(freq) => freq,
        None => prompt_base_frequency()?,
    };
    let keys = match &cli.keys {
        Some(keys) => keys.to_lowercase(),
        None => KeyboardRow::from(cli.row).keys().to_string(),
    };
    let keymap =
        Keymap::from_scale(&keys, base_freq, cli.steps).wrap_err("failed to build keymap")?;

    let config = EngineConfig::new()
        .block_duration(Duration::from_millis(cli.block_ms))
        .amplitude(cli.amplitude)
        .input_mode(cli.input.into())
        .hold_window(Duration::from_millis(cli.hold_ms));

    let device = match cli.device {
        Some(name) => CpalDevice::named(name),
        None => CpalDevice::default_output(),
    };

    let mut app = KeyTone::new(keymap).config(config).device(device);
    if let Some(rate) = cli.sample_rate {
        app = app.sample_rate(rate);
    }
    app.run()
}

/// Log lines end in `\r\n`: the terminal is in raw mode while playing.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> EyreResult<()> {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| write!(buf, "[{:<5}] {}\r\n", record.level(), record.args()));

    if let Some(path) = log_file {
        let file = File::create(path)
            .wrap_err_with(|| format!("failed to create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}

fn prompt_base_frequency() -> EyreResult<f64> {
    let stdin = io::stdin();
    loop {
        print!("Select the frequency of the base note: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            return Err(eyre!("no base frequency given"));
        }
        match line.trim().parse::<f64>() {
            Ok(freq) if freq.is_finite() && freq > 0.0 => return Ok(freq),
            _ => eprintln!("not a positive frequency: {:?}", line.trim()),
        }
    }
}
