use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use plotters::prelude::*;
use pulse_lib::{
    config::StreamConfig,
    detectors::ppg::{estimate_bpm, find_peaks, BpmConfig},
    io::{record::Recording, text as text_io},
    monitor::{Monitor, MonitorStatus},
    plot::{figure_from_points, Axis, Figure, Series},
    synth::{SignalGenerator, SynthParams},
    PulseConfig, SignalKind, StreamHandle,
};
use serde::Serialize;
use std::{
    io::{self, Read, Write},
    net::{TcpListener, UdpSocket},
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "Pulse: record, inspect and simulate ESP32 ECG/PPG streams"
)]
struct Cli {
    /// TOML file overriding stream defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindArg {
    #[value(name = "ppg")]
    Ppg,
    #[value(name = "ecg")]
    Ecg,
}

impl From<KindArg> for SignalKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Ppg => SignalKind::Ppg,
            KindArg::Ecg => SignalKind::Ecg,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a live stream into a CSV file
    Record {
        #[arg(long, default_value = "ppg")]
        kind: KindArg,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, default_value_t = 10.0)]
        duration_s: f64,
        #[arg(long)]
        out: PathBuf,
    },
    /// Estimate pulse rate from a recorded CSV or newline-delimited samples (stdin if no --input)
    Bpm {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        fs: Option<f64>,
    },
    /// Render a recorded CSV to a PNG via plotters
    Plot {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Serve a synthetic stream shaped like the device output
    Simulate {
        #[arg(long, default_value = "ppg")]
        kind: KindArg,
        #[arg(long, default_value_t = 72.0)]
        bpm: f64,
        #[arg(long)]
        rate_hz: Option<f64>,
        /// Listen address for the PPG TCP server
        #[arg(long, default_value = "0.0.0.0:80")]
        bind: String,
        /// Destination of ECG UDP datagrams
        #[arg(long, default_value = "127.0.0.1:80")]
        target: String,
        /// Stop after this many samples
        #[arg(long)]
        samples: Option<u64>,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = PulseConfig::load_or_default(cli.config.as_deref())
        .context("loading configuration")?;
    match cli.command {
        Commands::Record {
            kind,
            host,
            port,
            duration_s,
            out,
        } => {
            let mut cfg = config.stream(kind.into()).clone();
            if let Some(host) = host {
                cfg.host = host;
            }
            if let Some(port) = port {
                cfg.port = port;
            }
            cmd_record(cfg, duration_s, &out)?
        }
        Commands::Bpm { input, fs } => {
            let mut bpm_cfg = config.ppg.bpm.unwrap_or_default();
            if let Some(fs) = fs {
                if !fs.is_finite() || fs <= 0.0 {
                    bail!("--fs must be a positive number");
                }
                bpm_cfg.sample_rate_hz = fs;
            }
            cmd_bpm(input.as_deref(), &bpm_cfg)?
        }
        Commands::Plot { input, out } => cmd_plot(&config, &input, &out)?,
        Commands::Simulate {
            kind,
            bpm,
            rate_hz,
            bind,
            target,
            samples,
            seed,
        } => {
            let kind = SignalKind::from(kind);
            let mut params = SynthParams::for_kind(kind);
            params.bpm = bpm;
            params.seed = seed;
            if let Some(rate) = rate_hz {
                params.sample_rate_hz = rate;
            }
            if !params.sample_rate_hz.is_finite() || params.sample_rate_hz <= 0.0 {
                bail!("--rate-hz must be a positive number");
            }
            if !bpm.is_finite() || bpm <= 0.0 {
                bail!("--bpm must be a positive number");
            }
            let generator = SignalGenerator::new(kind, params);
            match kind {
                SignalKind::Ppg => cmd_simulate_tcp(generator, &bind, samples)?,
                SignalKind::Ecg => cmd_simulate_udp(generator, &target, samples)?,
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct RecordSummary {
    kind: SignalKind,
    samples: usize,
    rejected: u64,
    out: PathBuf,
}

fn cmd_record(cfg: StreamConfig, duration_s: f64, out: &Path) -> Result<()> {
    if !duration_s.is_finite() || duration_s < 0.0 {
        bail!("--duration-s must be a non-negative number");
    }
    let duration = Duration::try_from_secs_f64(duration_s).context("--duration-s out of range")?;
    let target = cfg.address();
    let handle = StreamHandle::spawn(cfg.clone())
        .with_context(|| format!("starting {} stream", cfg.kind))?;
    let tick = cfg.tick();
    let mut monitor = Monitor::new(cfg);
    monitor.set_connecting(target);
    monitor.start_recording();

    let started = Instant::now();
    while started.elapsed() < duration {
        monitor.drain(handle.events());
        if !monitor.status().is_running() {
            break;
        }
        thread::sleep(tick);
    }
    monitor.drain(handle.events());
    handle.stop();

    let recording = monitor.stop_recording();
    if let MonitorStatus::Closed {
        reason: Some(reason),
    } = monitor.status()
    {
        if recording.is_empty() {
            bail!("stream ended before any samples arrived: {reason}");
        }
        log::warn!("stream ended early: {reason}");
    }
    recording
        .write_csv(out)
        .with_context(|| format!("writing {}", out.display()))?;
    let summary = RecordSummary {
        kind: recording.kind,
        samples: recording.len(),
        rejected: monitor.stats().rejected,
        out: out.to_path_buf(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

/// Values from a recorded CSV, a newline series file, or stdin.
fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) if is_csv(path) => Ok(Recording::read_csv(path)
            .with_context(|| format!("reading {}", path.display()))?
            .values()),
        Some(path) => text_io::read_f64_series(path)
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(text_io::parse_f64_series(&buf)?)
        }
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

#[derive(Serialize)]
struct BpmReport {
    samples: usize,
    peaks: usize,
    bpm: Option<f64>,
}

fn cmd_bpm(input: Option<&Path>, cfg: &BpmConfig) -> Result<()> {
    let values = read_samples(input)?;
    // Same trailing window the live view estimates over.
    let start = values.len().saturating_sub(cfg.window);
    let window = &values[start..];
    let estimate = estimate_bpm(window, cfg);
    let peaks = match &estimate {
        Some(est) => est.peaks.indices.len(),
        None => find_peaks(window, cfg.threshold_ratio).indices.len(),
    };
    let report = BpmReport {
        samples: window.len(),
        peaks,
        bpm: estimate.map(|est| est.bpm),
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

#[derive(Serialize)]
struct PlotSummary {
    kind: SignalKind,
    samples: usize,
    x_range: [f64; 2],
    y_range: [f64; 2],
    out: PathBuf,
}

fn cmd_plot(config: &PulseConfig, input: &Path, out: &Path) -> Result<()> {
    let recording =
        Recording::read_csv(input).with_context(|| format!("reading {}", input.display()))?;
    let kind = recording.kind;
    let (scale, x_label) = match kind {
        SignalKind::Ppg => (1.0, "Sample"),
        SignalKind::Ecg => (1.0 / config.ecg.sample_rate_hz.max(f64::EPSILON), "Time (s)"),
    };
    let points = recording
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| [i as f64 * scale, row.value])
        .collect();
    let mut fig = figure_from_points(kind.title(), kind.csv_header(), points, 0x1F77B4);
    fig.x = Axis::new(x_label, None);
    fig.y = Axis::new(kind.value_label(), config.stream(kind).y_range);
    if let Err(err) = draw_plotters_figure(out, &fig, true) {
        // Text needs a system font; hosts without one still get the trace.
        log::warn!("drawing {} without text: {err:#}", out.display());
        draw_plotters_figure(out, &fig, false)?;
    }
    log::info!("wrote {} ({} samples)", out.display(), recording.len());
    let summary = PlotSummary {
        kind,
        samples: recording.len(),
        x_range: fig.resolved_range(0),
        y_range: fig.resolved_range(1),
        out: out.to_path_buf(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn draw_plotters_figure(path: &Path, fig: &Figure, with_text: bool) -> Result<()> {
    let backend = BitMapBackend::new(path, (1000, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let [x_min, x_max] = fig.resolved_range(0);
    let [y_min, y_max] = fig.resolved_range(1);
    let mut builder = ChartBuilder::on(&root);
    builder.margin(10);
    if with_text {
        builder
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 24),
            )
            .x_label_area_size(40)
            .y_label_area_size(60);
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    let mut mesh = chart.configure_mesh();
    if with_text {
        if let Some(label) = &fig.x.label {
            mesh.x_desc(label.as_str());
        }
        if let Some(label) = &fig.y.label {
            mesh.y_desc(label.as_str());
        }
    } else {
        mesh.x_labels(0).y_labels(0);
    }
    mesh.draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    &RGBColor(r, g, b),
                ))?;
            }
        }
    }
    root.present()?;
    Ok(())
}

fn sample_period(generator: &SignalGenerator) -> Result<Duration> {
    Duration::try_from_secs_f64(1.0 / generator.sample_rate_hz()).context("invalid sample rate")
}

/// Serve newline-delimited samples to one TCP client at a time.
fn cmd_simulate_tcp(mut generator: SignalGenerator, bind: &str, limit: Option<u64>) -> Result<()> {
    let listener = TcpListener::bind(bind).with_context(|| format!("binding {bind}"))?;
    let local = listener.local_addr()?;
    // Printed so callers binding port 0 can find the server.
    println!("{local}");
    io::stdout().flush()?;
    log::info!("simulated {} stream listening on {local}", generator.kind());
    let period = sample_period(&generator)?;

    for conn in listener.incoming() {
        let mut conn = match conn {
            Ok(conn) => conn,
            Err(err) => {
                log::warn!("accept failed: {err}");
                continue;
            }
        };
        let peer = conn
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".into());
        log::info!("client connected: {peer}");
        let mut sent = 0u64;
        let result = loop {
            if limit.is_some_and(|limit| sent >= limit) {
                break Ok(());
            }
            let Some(value) = generator.next() else {
                break Ok(());
            };
            if let Err(err) = writeln!(conn, "{value:.2}") {
                break Err(err);
            }
            sent += 1;
            thread::sleep(period);
        };
        match result {
            Ok(()) => {
                log::info!("sent {sent} samples to {peer}");
                return Ok(());
            }
            Err(err) => log::info!("client {peer} went away after {sent} samples: {err}"),
        }
    }
    Ok(())
}

/// Send one datagram per sample to `target`.
fn cmd_simulate_udp(generator: SignalGenerator, target: &str, limit: Option<u64>) -> Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("binding UDP socket")?;
    log::info!("simulated {} stream sending to {target}", generator.kind());
    let period = sample_period(&generator)?;
    let limit = limit.unwrap_or(u64::MAX);
    let mut sent = 0u64;
    for value in generator {
        if sent >= limit {
            break;
        }
        socket
            .send_to(format!("{value:.4}").as_bytes(), target)
            .with_context(|| format!("sending to {target}"))?;
        sent += 1;
        thread::sleep(period);
    }
    log::info!("sent {sent} datagrams");
    Ok(())
}
