use anyhow::Result;
use bear_hunt_ledger::commands::format_thousands;
use bear_hunt_ledger::LedgerEntry;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

const PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Standings,
    UploadLog,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Standings => Page::UploadLog,
            Page::UploadLog => Page::Standings,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Standings => "Standings",
            Page::UploadLog => "Upload Log",
        }
    }
}

pub struct App {
    /// Sorted by damage, highest first
    pub standings: Vec<LedgerEntry>,
    pub audit_lines: Vec<String>,
    pub state: TableState,
    pub log_scroll: usize,
    pub current_page: Page,
}

impl App {
    pub fn new(entries: Vec<LedgerEntry>, audit_lines: Vec<String>) -> Self {
        let mut standings = entries;
        // Stable sort: equal damage keeps first-seen order, same as the leaderboard
        standings.sort_by(|a, b| b.damage.cmp(&a.damage));

        let mut state = TableState::default();
        if !standings.is_empty() {
            state.select(Some(0));
        }

        Self {
            standings,
            audit_lines,
            state,
            log_scroll: 0,
            current_page: Page::Standings,
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    /// Saturates at `u64::MAX`
    pub fn total_damage(&self) -> u64 {
        self.standings
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.damage))
    }

    pub fn next(&mut self) {
        match self.current_page {
            Page::Standings => self.move_selection(1),
            Page::UploadLog => self.scroll_log(1),
        }
    }

    pub fn previous(&mut self) {
        match self.current_page {
            Page::Standings => self.move_selection(-1),
            Page::UploadLog => self.scroll_log(-1),
        }
    }

    pub fn page_down(&mut self) {
        match self.current_page {
            Page::Standings => self.move_selection(PAGE_SIZE as isize),
            Page::UploadLog => self.scroll_log(PAGE_SIZE as isize),
        }
    }

    pub fn page_up(&mut self) {
        match self.current_page {
            Page::Standings => self.move_selection(-(PAGE_SIZE as isize)),
            Page::UploadLog => self.scroll_log(-(PAGE_SIZE as isize)),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.standings.len();
        if len == 0 {
            return;
        }
        let current = self.state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        self.state.select(Some(next as usize));
    }

    fn scroll_log(&mut self, delta: isize) {
        let max = self.audit_lines.len().saturating_sub(1) as isize;
        self.log_scroll = (self.log_scroll as isize + delta).clamp(0, max) as usize;
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => app.next_page(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Standings => render_standings(f, chunks[1], app),
        Page::UploadLog => render_upload_log(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];
    for (i, page) in [Page::Standings, Page::UploadLog].iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        spans.push(Span::styled(page.title(), style));
    }

    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Players: {}", app.standings.len()),
        Style::default().fg(Color::White),
    ));
    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Total damage: {}", format_thousands(app.total_damage())),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_standings(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["#", "Player", "Damage"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.standings.iter().enumerate().map(|(i, entry)| {
        let color = match i {
            0 => Color::Yellow,
            1 => Color::White,
            2 => Color::LightRed,
            _ => Color::Gray,
        };

        Row::new(vec![
            Cell::from(format!("{}", i + 1)).style(Style::default().fg(color)),
            Cell::from(entry.name.clone()),
            Cell::from(format_thousands(entry.damage)).style(Style::default().fg(Color::Green)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(24),
            Constraint::Length(20),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" 🏆 Top Damage "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_upload_log(f: &mut Frame, area: Rect, app: &App) {
    let lines: Vec<Line> = app
        .audit_lines
        .iter()
        .skip(app.log_scroll)
        .map(|line| {
            if line.contains("EVENT RESET") {
                Line::from(Span::styled(line.clone(), Style::default().fg(Color::Red)))
            } else {
                Line::from(line.clone())
            }
        })
        .collect();

    let log = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Upload Log "),
    );

    f.render_widget(log, area);
}

fn render_status_bar(f: &mut Frame, area: Rect) {
    let status_spans = vec![
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)),
        Span::raw(" Fast | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}
