use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::{Duration, Instant};

use crate::classify::{self, LineKind};
use crate::launcher::CheckerConfig;
use crate::runner::{self, CheckerEvent, RunHandle};
use crate::transcript::Transcript;
use crate::{Origin, RunRequest, RunState, stats};

/// Pump tick: how often queued checker output is drained into the display.
const TICK: Duration = Duration::from_millis(100);

/// Which panel is shown in the main area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Output,
    Stats,
}

/// What the path-input modal is editing.
#[derive(Debug, Clone, Copy)]
enum InputTarget {
    ImagePath,
    SavePath,
}

struct InputPrompt {
    target: InputTarget,
    buffer: String,
}

/// Application state for the TUI.
///
/// Owns everything the event pump touches: the run request fields, the
/// transcript, the channel receiver, and the handle of the in-flight run.
pub struct App {
    config: CheckerConfig,
    image_input: String,
    verbose: bool,
    repair: bool,
    transcript: Transcript,
    stats: Option<stats::RunStats>,
    run_state: RunState,
    handle: Option<RunHandle>,
    tx: Sender<CheckerEvent>,
    rx: Receiver<CheckerEvent>,
    tab: Tab,
    input: Option<InputPrompt>,
    status_message: Option<(String, Instant)>,
    should_quit: bool,
    show_help: bool,
    scroll_offset: u16,
    follow: bool,
}

impl App {
    pub fn new(config: CheckerConfig, image: Option<PathBuf>, verbose: bool, repair: bool) -> Self {
        let (tx, rx) = channel();
        Self {
            config,
            image_input: image
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            verbose,
            repair,
            transcript: Transcript::new(),
            stats: None,
            run_state: RunState::Idle,
            handle: None,
            tx,
            rx,
            tab: Tab::Output,
            input: None,
            status_message: None,
            should_quit: false,
            show_help: false,
            scroll_offset: 0,
            follow: true,
        }
    }

    /// Drain every queued checker event, classify lines, and append them.
    ///
    /// Called once per pump tick; never blocks.
    fn drain_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                CheckerEvent::Stdout(line) => self.append(Origin::Stdout, &line),
                CheckerEvent::Stderr(line) => self.append(Origin::Stderr, &line),
                CheckerEvent::Exited { .. } => self.finish_run(),
            }
        }
    }

    fn append(&mut self, origin: Origin, line: &str) {
        let kind = classify::classify(origin, line);
        self.transcript.push(kind, line);
    }

    /// Transition out of the running state and compute the statistics.
    ///
    /// Guarded by the run state so a stray completion cannot finish a run
    /// twice.
    fn finish_run(&mut self) {
        if self.run_state != RunState::Running {
            return;
        }
        self.run_state = RunState::Finished;
        self.handle = None;
        self.stats = Some(stats::scan(&self.transcript.text()));
    }

    fn flash(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    fn start_run(&mut self) {
        if self.run_state == RunState::Running {
            self.flash("A verification run is already active.");
            return;
        }

        let image = self.image_input.trim();
        if image.is_empty() {
            self.flash("Select an image file first (press e).");
            return;
        }

        let mut request = RunRequest::new(PathBuf::from(image));
        request.verbose = self.verbose;
        request.repair = self.repair;

        // The launcher is never invoked for a missing image.
        if !request.image_exists() {
            self.flash(format!("Not a valid image file: {image}"));
            return;
        }

        self.transcript.clear();
        self.stats = None;
        self.scroll_offset = 0;
        self.follow = true;
        self.tab = Tab::Output;
        self.run_state = RunState::Running;
        self.handle = Some(runner::start(self.config.clone(), request, self.tx.clone()));
    }

    fn stop_run(&mut self) {
        let stopped = self.handle.as_ref().is_some_and(RunHandle::stop);
        if !stopped {
            self.flash("No verification is running.");
        }
    }

    fn clear_output(&mut self) {
        self.transcript.clear();
        self.stats = None;
        self.scroll_offset = 0;
        self.follow = true;
    }

    fn begin_edit_image(&mut self) {
        self.input = Some(InputPrompt {
            target: InputTarget::ImagePath,
            buffer: self.image_input.clone(),
        });
    }

    fn begin_save(&mut self) {
        if self.transcript.is_empty() {
            self.flash("Nothing to save.");
            return;
        }
        self.input = Some(InputPrompt {
            target: InputTarget::SavePath,
            buffer: "imgcheck-output.txt".to_string(),
        });
    }

    fn commit_input(&mut self) {
        let Some(prompt) = self.input.take() else {
            return;
        };
        match prompt.target {
            InputTarget::ImagePath => {
                self.image_input = prompt.buffer.trim().to_string();
            }
            InputTarget::SavePath => {
                let path = prompt.buffer.trim().to_string();
                if path.is_empty() {
                    self.flash("Save cancelled: empty path.");
                    return;
                }
                match self.transcript.save(Path::new(&path)) {
                    Ok(()) => self.flash(format!("Output saved to {path}")),
                    Err(err) => self.flash(format!("Save failed: {err}")),
                }
            }
        }
    }

    /// Handle keyboard input, routing to the modal or the main key map.
    fn handle_input(&mut self, key: event::KeyEvent) {
        if self.input.is_some() {
            self.handle_prompt_input(key);
            return;
        }

        if self.show_help {
            // Any key closes help
            self.show_help = false;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('?') => {
                self.show_help = true;
            }
            KeyCode::Char('e') => {
                self.begin_edit_image();
            }
            KeyCode::Char('v') => {
                self.verbose = !self.verbose;
            }
            KeyCode::Char('p') => {
                self.repair = !self.repair;
            }
            KeyCode::Char('r') | KeyCode::Enter => {
                self.start_run();
            }
            KeyCode::Char('x') => {
                self.stop_run();
            }
            KeyCode::Char('c') => {
                self.clear_output();
            }
            KeyCode::Char('s') => {
                self.begin_save();
            }
            KeyCode::Tab => {
                self.tab = match self.tab {
                    Tab::Output => Tab::Stats,
                    Tab::Stats => Tab::Output,
                };
            }
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.scroll_by(10);
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.scroll_by(-10);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.scroll_by(1);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.scroll_by(-1);
            }
            KeyCode::PageDown => {
                self.scroll_by(20);
            }
            KeyCode::PageUp => {
                self.scroll_by(-20);
            }
            KeyCode::Char('G') => {
                self.follow = true;
            }
            _ => {}
        }
    }

    fn handle_prompt_input(&mut self, key: event::KeyEvent) {
        match key.code {
            KeyCode::Enter => self.commit_input(),
            KeyCode::Esc => {
                self.input = None;
            }
            KeyCode::Backspace => {
                if let Some(prompt) = self.input.as_mut() {
                    prompt.buffer.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(prompt) = self.input.as_mut() {
                    prompt.buffer.push(c);
                }
            }
            _ => {}
        }
    }

    /// Manual scrolling disengages follow mode until `G` re-engages it.
    fn scroll_by(&mut self, delta: i32) {
        self.follow = false;
        let current = i32::from(self.scroll_offset);
        self.scroll_offset = current.saturating_add(delta).max(0) as u16;
    }

    /// Render the UI.
    fn render(&mut self, frame: &mut Frame) {
        // Expire old status messages
        let expired = self
            .status_message
            .as_ref()
            .map(|(_, time)| time.elapsed() >= Duration::from_secs(3))
            .unwrap_or(false);
        if expired {
            self.status_message = None;
        }

        if self.show_help {
            self.render_help(frame);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(3),
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_tab_bar(frame, chunks[1]);
        match self.tab {
            Tab::Output => self.render_output(frame, chunks[2]),
            Tab::Stats => self.render_stats(frame, chunks[2]),
        }
        self.render_status_bar(frame, chunks[3]);

        if self.input.is_some() {
            self.render_input(frame);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let image = if self.image_input.is_empty() {
            Span::styled("<none>  (press e to select)", Style::default().fg(Color::DarkGray))
        } else {
            Span::raw(self.image_input.as_str())
        };

        let checkbox = |on: bool| if on { "[x]" } else { "[ ]" };
        let options = format!(
            "{} verbose (v)   {} repair (p)   checker: {}{}",
            checkbox(self.verbose),
            checkbox(self.repair),
            self.config.display_name(),
            if self.config.wsl { " (via WSL)" } else { "" },
        );

        let text = Text::from(vec![
            Line::from(vec![Span::styled("Image: ", Style::default().fg(Color::Cyan)), image]),
            Line::from(options),
        ]);

        let header = Paragraph::new(text).block(
            Block::default()
                .borders(Borders::ALL)
                .title("File System Checker"),
        );
        frame.render_widget(header, area);
    }

    fn render_tab_bar(&self, frame: &mut Frame, area: Rect) {
        let titles = vec!["Verification Output", "Statistics"];
        let selected = match self.tab {
            Tab::Output => 0,
            Tab::Stats => 1,
        };
        let tabs = Tabs::new(titles)
            .select(selected)
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .divider("|");
        frame.render_widget(tabs, area);
    }

    fn render_output(&mut self, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = self
            .transcript
            .lines()
            .iter()
            .map(|line| {
                let style = match line.kind {
                    LineKind::Pass => Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                    LineKind::Fail => Style::default()
                        .fg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                    LineKind::Error => Style::default().fg(Color::Red),
                    LineKind::Plain => Style::default(),
                };
                Line::from(Span::styled(line.text.clone(), style))
            })
            .collect();

        let total = lines.len() as u16;
        let inner_height = area.height.saturating_sub(2);
        let max_offset = total.saturating_sub(inner_height);
        if self.follow {
            self.scroll_offset = max_offset;
        } else {
            self.scroll_offset = self.scroll_offset.min(max_offset);
        }

        let paragraph = Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title("Output"))
            .scroll((self.scroll_offset, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_stats(&self, frame: &mut Frame, area: Rect) {
        let text = match self.stats {
            Some(s) => stats::render(s),
            None => "No statistics yet. Run a verification first.".to_string(),
        };
        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Statistics"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let status_text = match &self.status_message {
            Some((msg, _)) => msg.clone(),
            None => match self.run_state {
                RunState::Idle => {
                    "Ready | e=image v/p=options r=run x=stop c=clear s=save Tab=stats ?=help q=quit"
                        .to_string()
                }
                RunState::Running => {
                    let name = Path::new(&self.image_input)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| self.image_input.clone());
                    format!("Verifying {name}... | x=stop ?=help")
                }
                RunState::Finished => {
                    "Verification complete. | r=rerun s=save Tab=stats q=quit".to_string()
                }
            },
        };

        let status_bar = Paragraph::new(status_text)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: false });
        frame.render_widget(status_bar, area);
    }

    fn render_input(&self, frame: &mut Frame) {
        let Some(prompt) = &self.input else { return };
        let title = match prompt.target {
            InputTarget::ImagePath => "Image file path",
            InputTarget::SavePath => "Save output as",
        };
        let text = format!("{}\u{2588}\n\nEnter to confirm, Esc to cancel", prompt.buffer);

        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false })
            .style(Style::default().fg(Color::Yellow));

        let area = centered_rect(60, 20, frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }

    fn render_help(&self, frame: &mut Frame) {
        let help_text = vec![
            "imgcheck - Keyboard Shortcuts",
            "",
            "Run:",
            "  e             - Edit image file path",
            "  v             - Toggle verbose output",
            "  p             - Toggle repair attempts",
            "  r / Enter     - Run verification",
            "  x             - Stop the running verification",
            "",
            "Output:",
            "  Tab           - Switch Output/Statistics tab",
            "  j/k, arrows   - Scroll",
            "  Ctrl+d/u      - Scroll half page",
            "  PgDn/PgUp     - Scroll page",
            "  G             - Follow latest output",
            "  c             - Clear output",
            "  s             - Save output to a file",
            "",
            "Other:",
            "  ?             - Show this help",
            "  q / Esc       - Quit",
            "",
            "Press any key to close this help",
        ];

        let text = Text::from(help_text.iter().map(|&s| Line::from(s)).collect::<Vec<_>>());
        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .wrap(Wrap { trim: false });

        let area = centered_rect(60, 80, frame.area());
        frame.render_widget(paragraph, area);
    }
}

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Setup the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("Failed to create terminal")
}

/// Restore the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Launch the interactive checker front-end.
///
/// The loop doubles as the pump timer: it redraws and drains the checker
/// channel every 100ms, or sooner when a key arrives.
pub fn run_tui(mut app: App) -> Result<()> {
    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;

    let result = (|| -> Result<()> {
        loop {
            app.drain_events();

            terminal
                .draw(|f| app.render(f))
                .context("Failed to draw frame")?;

            if app.should_quit {
                break;
            }

            if event::poll(TICK).context("Failed to poll events")?
                && let Event::Key(key) = event::read().context("Failed to read event")?
            {
                // Ignore key release events
                if key.kind == event::KeyEventKind::Press {
                    app.handle_input(key);
                }
            }
        }
        Ok(())
    })();

    // Kill any still-running checker before leaving
    if let Some(handle) = app.handle.take() {
        handle.stop();
    }

    // Restore terminal in all cases
    restore_terminal(&mut terminal)?;

    result
}
