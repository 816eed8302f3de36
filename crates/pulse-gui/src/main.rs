use eframe::{egui, egui::ViewportBuilder};
use egui_plot::{Line, Plot, PlotBounds};
use pulse_lib::plot::{Figure, Series, Style};
use pulse_lib::{PulseConfig, SignalKind, StreamSession};
use rfd::FileDialog;
use std::env;
use std::path::PathBuf;

const MAX_PLOT_POINTS: usize = 2048;

fn main() -> eframe::Result<()> {
    env_logger::init();
    let config = load_config();
    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default().with_inner_size([1200.0, 720.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Pulse Viewer",
        native_options,
        Box::new(move |_cc| Ok(Box::new(PulseApp::new(config)))),
    )
}

/// `PULSE_CONFIG` names an optional TOML file; a bad file falls back to defaults.
fn load_config() -> PulseConfig {
    let path = env::var_os("PULSE_CONFIG").map(PathBuf::from);
    match PulseConfig::load_or_default(path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            log::error!("ignoring config: {err}");
            PulseConfig::default()
        }
    }
}

fn tab_title(kind: SignalKind) -> &'static str {
    match kind {
        SignalKind::Ppg => "IR / BPM",
        SignalKind::Ecg => "ECG",
    }
}

struct PulseApp {
    active_tab: SignalKind,
    ppg: StreamSession,
    ecg: StreamSession,
    tick: std::time::Duration,
}

impl PulseApp {
    fn new(config: PulseConfig) -> Self {
        let tick = config.ppg.tick().min(config.ecg.tick());
        Self {
            active_tab: SignalKind::Ppg,
            ppg: StreamSession::new(config.ppg),
            ecg: StreamSession::new(config.ecg),
            tick,
        }
    }

    fn session(&self, kind: SignalKind) -> &StreamSession {
        match kind {
            SignalKind::Ppg => &self.ppg,
            SignalKind::Ecg => &self.ecg,
        }
    }

    fn show_ppg_tab(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("ppg_controls").show(ctx, |ui| {
            ui.heading("IR Signal Viewer");
            ui.label("Enter ESP32 IP Address:");
            ui.text_edit_singleline(&mut self.ppg.host);
            ui.horizontal(|ui| {
                ui.label("Port");
                ui.add(egui::DragValue::new(&mut self.ppg.port));
            });

            ui.separator();
            stream_buttons(ui, &mut self.ppg, "Start", "Stop");
            ui.separator();
            recording_buttons(ui, &mut self.ppg);

            ui.separator();
            ui.label(
                egui::RichText::new(self.ppg.monitor().bpm_label())
                    .size(20.0)
                    .strong(),
            );
            if let Some(est) = self.ppg.monitor().bpm_estimate() {
                ui.label(format!(
                    "{} peaks, threshold {:.1}",
                    est.peaks.indices.len(),
                    est.peaks.threshold
                ));
            }
            status_lines(ui, &self.ppg);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let fig = self.ppg.monitor().figure(MAX_PLOT_POINTS);
            show_figure(ui, "ppg_plot", &fig);
        });
    }

    fn show_ecg_tab(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("ecg_controls").show(ctx, |ui| {
            ui.heading("Real-Time ECG Monitor");
            ui.horizontal(|ui| {
                ui.label("Listen on");
                ui.text_edit_singleline(&mut self.ecg.host);
            });
            ui.horizontal(|ui| {
                ui.label("Port");
                ui.add(egui::DragValue::new(&mut self.ecg.port));
            });

            ui.separator();
            stream_buttons(ui, &mut self.ecg, "Start Receiving Data", "Stop");
            ui.separator();
            recording_buttons(ui, &mut self.ecg);

            ui.separator();
            let cfg = self.ecg.monitor().config();
            ui.label(format!(
                "{:.0} Hz, {:.1} s window",
                cfg.sample_rate_hz,
                cfg.window_seconds()
            ));
            if let Some(latest) = self.ecg.monitor().latest() {
                ui.label(format!("Latest: {latest:+.3} mV"));
            }
            status_lines(ui, &self.ecg);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let fig = self.ecg.monitor().figure(MAX_PLOT_POINTS);
            show_figure(ui, "ecg_plot", &fig);
        });
    }
}

fn stream_buttons(ui: &mut egui::Ui, session: &mut StreamSession, start: &str, stop: &str) {
    let running = session.is_running();
    ui.horizontal(|ui| {
        if ui.add_enabled(!running, egui::Button::new(start)).clicked() {
            if let Err(err) = session.start() {
                session.set_message(err.to_string());
            }
        }
        if ui.add_enabled(running, egui::Button::new(stop)).clicked() {
            session.stop();
        }
    });
}

fn recording_buttons(ui: &mut egui::Ui, session: &mut StreamSession) {
    let recording = session.is_recording();
    ui.horizontal(|ui| {
        if ui
            .add_enabled(!recording, egui::Button::new("Start Recording"))
            .clicked()
        {
            session.start_recording();
        }
        if ui
            .add_enabled(recording, egui::Button::new("Stop Recording"))
            .clicked()
        {
            let captured = session.stop_recording();
            save_dialog(session, &captured);
        }
    });
    if let Some(last) = session.last_recording() {
        if ui
            .button(format!("Save last recording ({} samples)", last.len()))
            .clicked()
        {
            save_dialog(session, &last);
        }
    }
    if recording {
        ui.label(format!("Recording {} samples", session.monitor().recorder().len()));
    }
}

fn save_dialog(session: &mut StreamSession, recording: &pulse_lib::io::record::Recording) {
    if let Some(path) = FileDialog::new()
        .add_filter("CSV files", &["csv"])
        .add_filter("All files", &["*"])
        .set_file_name(session.suggested_file_name())
        .save_file()
    {
        let path = if path.extension().is_none() {
            path.with_extension("csv")
        } else {
            path
        };
        session.save_recording(recording, &path);
    }
}

fn status_lines(ui: &mut egui::Ui, session: &StreamSession) {
    ui.separator();
    let monitor = session.monitor();
    ui.label(format!("Status: {}", monitor.status().describe()));
    let stats = monitor.stats();
    ui.label(format!("Samples: {}", stats.received));
    if stats.rejected > 0 {
        ui.colored_label(
            egui::Color32::LIGHT_RED,
            format!("Invalid data: {}", stats.rejected),
        );
    }
    if let Some(message) = session.message() {
        ui.label(message);
    }
}

impl eframe::App for PulseApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ppg.poll();
        self.ecg.poll();

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                for kind in SignalKind::all() {
                    let selected = self.active_tab == kind;
                    if ui.selectable_label(selected, tab_title(kind)).clicked() {
                        self.active_tab = kind;
                    }
                }
            });
        });

        match self.active_tab {
            SignalKind::Ppg => self.show_ppg_tab(ctx),
            SignalKind::Ecg => self.show_ecg_tab(ctx),
        }

        egui::TopBottomPanel::bottom("bottom").show(ctx, |ui| {
            ui.horizontal(|ui| {
                for kind in SignalKind::all() {
                    let session = self.session(kind);
                    let state = if session.is_running() { "running" } else { "idle" };
                    ui.label(format!("{}: {state}", tab_title(kind)));
                }
            });
        });

        ctx.request_repaint_after(self.tick);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.ppg.stop();
        self.ecg.stop();
    }
}

fn show_figure(ui: &mut egui::Ui, id: &str, figure: &Figure) {
    if let Some(title) = &figure.title {
        ui.heading(title);
    }
    let [x0, x1] = figure.resolved_range(0);
    let [y0, y1] = figure.resolved_range(1);
    let mut plot = Plot::new(id)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .show_grid(true);
    if let Some(label) = &figure.x.label {
        plot = plot.x_axis_label(label.clone());
    }
    if let Some(label) = &figure.y.label {
        plot = plot.y_axis_label(label.clone());
    }
    plot.show(ui, |plot_ui| {
        plot_ui.set_plot_bounds(PlotBounds::from_min_max([x0, y0], [x1, y1]));
        for series in &figure.series {
            match series {
                Series::Line(line) => {
                    plot_ui.line(
                        Line::new(line.points.clone())
                            .stroke(stroke_from_style(&line.style))
                            .name(line.name.clone()),
                    );
                }
            }
        }
    });
}

fn stroke_from_style(style: &Style) -> egui::Stroke {
    let (r, g, b) = style.color.rgb();
    egui::Stroke::new(style.width, egui::Color32::from_rgb(r, g, b))
}
