use std::{
    env,
    io::{self, Stdout},
    path::PathBuf,
    time::Instant,
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use pulse_lib::{
    config::RecordingConfig, monitor::Monitor, plot::Series, PulseConfig, SignalKind, StreamConfig,
    StreamSession,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::CrosstermBackend,
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};

fn main() -> Result<()> {
    env_logger::init();
    let path = env::var_os("PULSE_CONFIG").map(PathBuf::from);
    let config = PulseConfig::load_or_default(path.as_deref()).context("loading configuration")?;
    let tick_rate = config.ppg.tick().min(config.ecg.tick());
    let mut app = App::new(config);

    let mut terminal = setup_terminal()?;
    let mut last_tick = Instant::now();
    while !app.should_quit {
        app.poll();
        terminal.draw(|f| draw(f, &app))?;
        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }

    app.shutdown();
    restore_terminal()?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("initializing terminal")
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

#[derive(Default)]
struct TextField {
    value: String,
    cursor: usize,
}

impl TextField {
    fn new(default: &str) -> Self {
        Self {
            value: default.to_string(),
            cursor: default.len(),
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                self.value.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                true
            }
            KeyCode::Backspace => {
                if let Some(c) = self.value[..self.cursor].chars().next_back() {
                    self.cursor -= c.len_utf8();
                    self.value.remove(self.cursor);
                }
                true
            }
            KeyCode::Left => {
                if let Some(c) = self.value[..self.cursor].chars().next_back() {
                    self.cursor -= c.len_utf8();
                }
                true
            }
            KeyCode::Right => {
                if let Some(c) = self.value[self.cursor..].chars().next() {
                    self.cursor += c.len_utf8();
                }
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = self.value.len();
                true
            }
            _ => false,
        }
    }
}

/// A stream session with the terminal-side editor for its host.
struct Pane {
    session: StreamSession,
    host: TextField,
}

impl Pane {
    fn new(cfg: StreamConfig) -> Self {
        Self {
            host: TextField::new(&cfg.host),
            session: StreamSession::new(cfg),
        }
    }

    fn start(&mut self) -> pulse_lib::Result<()> {
        self.session.host = self.host.value.clone();
        self.session.start()
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Focus {
    None,
    Host,
}

struct App {
    tab: SignalKind,
    focus: Focus,
    ppg: Pane,
    ecg: Pane,
    recording: RecordingConfig,
    status: String,
    should_quit: bool,
}

impl App {
    fn new(config: PulseConfig) -> Self {
        Self {
            tab: SignalKind::Ppg,
            focus: Focus::None,
            ppg: Pane::new(config.ppg),
            ecg: Pane::new(config.ecg),
            recording: config.recording,
            status: "s start · x stop · r record · h edit host · tab switch · q quit".into(),
            should_quit: false,
        }
    }

    fn pane(&self) -> &Pane {
        match self.tab {
            SignalKind::Ppg => &self.ppg,
            SignalKind::Ecg => &self.ecg,
        }
    }

    fn pane_mut(&mut self) -> &mut Pane {
        match self.tab {
            SignalKind::Ppg => &mut self.ppg,
            SignalKind::Ecg => &mut self.ecg,
        }
    }

    fn poll(&mut self) {
        self.ppg.session.poll();
        self.ecg.session.poll();
    }

    fn shutdown(&mut self) {
        self.ppg.session.stop();
        self.ecg.session.stop();
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.focus == Focus::Host {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.focus = Focus::None,
                _ => {
                    self.pane_mut().host.handle_key(&key);
                }
            }
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => {
                self.tab = match self.tab {
                    SignalKind::Ppg => SignalKind::Ecg,
                    SignalKind::Ecg => SignalKind::Ppg,
                }
            }
            KeyCode::Char('h') => self.focus = Focus::Host,
            KeyCode::Char('s') => {
                let kind = self.tab;
                self.status = match self.pane_mut().start() {
                    Ok(()) => format!("{kind} stream started"),
                    Err(err) => format!("Error: {err}"),
                };
            }
            KeyCode::Char('x') => {
                self.pane_mut().session.stop();
                self.status = format!("{} stream stopped", self.tab);
            }
            KeyCode::Char('r') => self.toggle_recording(),
            _ => {}
        }
    }

    fn toggle_recording(&mut self) {
        let dir = self.recording.directory.clone();
        let session = &mut self.pane_mut().session;
        if session.is_recording() {
            let recording = session.stop_recording();
            let path = dir.join(session.suggested_file_name());
            session.save_recording(&recording, &path);
        } else {
            session.start_recording();
        }
        let status = session.message().unwrap_or_default().to_string();
        self.status = status;
    }
}

fn draw(f: &mut Frame, app: &App) {
    let size = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(size);
    draw_tabs(f, layout[0], app);
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(36), Constraint::Min(0)])
        .split(layout[1]);
    draw_panel(f, body[0], app);
    draw_chart(f, body[1], app.pane().session.monitor());
    draw_status(f, layout[2], app);
}

fn draw_tabs(f: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<Line> = SignalKind::all()
        .iter()
        .map(|kind| Line::from(kind.title()))
        .collect();
    let selected = SignalKind::all()
        .iter()
        .position(|kind| *kind == app.tab)
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title("Pulse"));
    f.render_widget(tabs, area);
}

fn draw_panel(f: &mut Frame, area: Rect, app: &App) {
    let pane = app.pane();
    let monitor = pane.session.monitor();
    let cfg = monitor.config();
    let host_style = if app.focus == Focus::Host {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let mut lines = vec![
        Line::from(vec![
            Span::raw("Host: "),
            Span::styled(pane.host.value.clone(), host_style),
        ]),
        Line::from(format!("Port: {} ({:?})", pane.session.port, cfg.transport)),
        Line::from(format!("Status: {}", monitor.status().describe())),
        Line::from(""),
    ];
    if monitor.has_bpm() {
        lines.push(Line::from(Span::styled(
            monitor.bpm_label(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }
    if let Some(latest) = monitor.latest() {
        lines.push(Line::from(format!("Latest: {latest:.3}")));
    }
    let stats = monitor.stats();
    lines.push(Line::from(format!("Samples: {}", stats.received)));
    lines.push(Line::from(format!("Rejected: {}", stats.rejected)));
    if monitor.is_recording() {
        lines.push(Line::from(Span::styled(
            format!("● REC {} samples", monitor.recorder().len()),
            Style::default().fg(Color::Red),
        )));
    }
    let state = if pane.session.is_running() { "running" } else { "idle" };
    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(state));
    f.render_widget(panel, area);
}

fn draw_chart(f: &mut Frame, area: Rect, monitor: &Monitor) {
    let fig = monitor.figure(area.width.max(2) as usize * 2);
    let points: Vec<(f64, f64)> = fig
        .series
        .iter()
        .flat_map(|series| match series {
            Series::Line(line) => {
                line.points.iter().map(|p| (p[0], p[1])).collect::<Vec<_>>()
            }
        })
        .collect();
    let [x0, x1] = fig.resolved_range(0);
    let [y0, y1] = fig.resolved_range(1);
    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&points);
    let x_label = fig.x.label.clone().unwrap_or_default();
    let y_label = fig.y.label.clone().unwrap_or_default();
    let chart = Chart::new(vec![dataset])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(fig.title.clone().unwrap_or_default()),
        )
        .x_axis(
            Axis::default()
                .title(x_label)
                .bounds([x0, x1])
                .labels(vec![
                    Span::raw(format!("{x0:.1}")),
                    Span::raw(format!("{x1:.1}")),
                ]),
        )
        .y_axis(
            Axis::default()
                .title(y_label)
                .bounds([y0, y1])
                .labels(vec![
                    Span::raw(format!("{y0:.1}")),
                    Span::raw(format!("{y1:.1}")),
                ]),
        );
    f.render_widget(chart, area);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let status = Paragraph::new(app.status.as_str())
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
    f.render_widget(status, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn text_field_edits_at_cursor() {
        let mut field = TextField::new("19.168.4.1");
        field.handle_key(&press(KeyCode::Home));
        field.handle_key(&press(KeyCode::Char('1')));
        assert_eq!(field.value, "119.168.4.1");
        field.handle_key(&press(KeyCode::End));
        field.handle_key(&press(KeyCode::Backspace));
        assert_eq!(field.value, "119.168.4.");
    }

    #[test]
    fn start_without_host_reports_error() {
        let mut app = App::new(PulseConfig::default());
        app.on_key(press(KeyCode::Char('s')));
        assert!(app.status.starts_with("Error"));
        assert!(!app.ppg.session.is_running());
    }

    #[test]
    fn host_edit_swallows_command_keys() {
        let mut app = App::new(PulseConfig::default());
        app.on_key(press(KeyCode::Char('h')));
        for c in "10.0.0.5".chars() {
            app.on_key(press(KeyCode::Char(c)));
        }
        app.on_key(press(KeyCode::Char('q')));
        assert!(!app.should_quit);
        app.on_key(press(KeyCode::Enter));
        assert_eq!(app.ppg.host.value, "10.0.0.5q");
        app.on_key(press(KeyCode::Tab));
        assert_eq!(app.tab, SignalKind::Ecg);
        app.on_key(press(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn recording_toggle_writes_csv() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = PulseConfig::default();
        config.recording.directory = dir.path().to_path_buf();
        let mut app = App::new(config);
        app.on_key(press(KeyCode::Char('r')));
        assert!(app.ppg.session.is_recording());
        assert_eq!(app.status, "ppg recording started");
        app.on_key(press(KeyCode::Char('r')));
        assert!(!app.ppg.session.is_recording());
        assert!(app.status.starts_with("Data saved"), "{}", app.status);
        let files: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .collect();
        assert_eq!(files.len(), 1);
    }
}
