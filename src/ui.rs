use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use purse_tracker::tracker::{ExpenditureRow, MonthList, Tracker};
use purse_tracker::{ListParams, TagWeight, YearSummary};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Month,
    Summary,
    Tags,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Month => Page::Summary,
            Page::Summary => Page::Tags,
            Page::Tags => Page::Month,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Month => Page::Tags,
            Page::Summary => Page::Month,
            Page::Tags => Page::Summary,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Month => "Month",
            Page::Summary => "Year Summary",
            Page::Tags => "Tags",
        }
    }
}

/// Browser over the default purse of one account
pub struct App<'a> {
    tracker: Tracker<'a>,
    pub year: i32,
    pub month: u32,
    pub list: MonthList,
    pub summary: YearSummary,
    pub tags: Vec<TagWeight>,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
}

impl<'a> App<'a> {
    pub fn new(tracker: Tracker<'a>, year: i32, month: u32) -> purse_tracker::Result<Self> {
        let list = Self::load_month(&tracker, year, month)?;
        let summary = tracker.year_summary(year)?;
        let tags = tracker.tags(None)?.tags;

        let mut state = TableState::default();
        if !list.expenditures.items.is_empty() {
            state.select(Some(0));
        }

        Ok(Self {
            tracker,
            year,
            month,
            list,
            summary,
            tags,
            state,
            current_page: Page::Month,
            show_detail: false,
        })
    }

    /// The whole month on one page
    fn load_month(tracker: &Tracker<'a>, year: i32, month: u32) -> purse_tracker::Result<MonthList> {
        let params = ListParams {
            paginate_by: Some(usize::MAX.to_string()),
            ..Default::default()
        };
        tracker.month_list(year, month, &params)
    }

    fn reload(&mut self) -> purse_tracker::Result<()> {
        self.list = Self::load_month(&self.tracker, self.year, self.month)?;
        if self.summary.year != self.year {
            self.summary = self.tracker.year_summary(self.year)?;
        }
        self.state
            .select(if self.list.expenditures.items.is_empty() { None } else { Some(0) });
        Ok(())
    }

    pub fn previous_month(&mut self) -> purse_tracker::Result<()> {
        (self.year, self.month) = self.list.previous;
        self.reload()
    }

    pub fn next_month(&mut self) -> purse_tracker::Result<()> {
        (self.year, self.month) = self.list.next;
        self.reload()
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn selected_expenditure(&self) -> Option<&ExpenditureRow> {
        self.state
            .selected()
            .and_then(|i| self.list.expenditures.items.get(i))
    }

    fn row_count(&self) -> usize {
        match self.current_page {
            Page::Month => self.list.expenditures.items.len(),
            Page::Summary => self.summary.months.len(),
            Page::Tags => self.tags.len(),
        }
    }

    pub fn next(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 20).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(20));
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App<'_>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App<'_>) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                    app.state.select(Some(0));
                }
                KeyCode::BackTab => {
                    app.previous_page();
                    app.state.select(Some(0));
                }
                KeyCode::Left | KeyCode::Char('h') => app.previous_month()?,
                KeyCode::Right | KeyCode::Char('l') => app.next_month()?,
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => {
                    let len = app.row_count();
                    if len > 0 {
                        app.state.select(Some(len - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Month {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_month(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Month => render_month(f, chunks[1], app),
            Page::Summary => render_summary(f, chunks[1], app),
            Page::Tags => render_tags(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App<'_>) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Month, Page::Summary, Page::Tags].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    let purse = &app.list.purse;
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("{}{}", purse.purse.name, if purse.shared { " (shared)" } else { "" }),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("{}-{:02}", app.year, app.month),
        Style::default().fg(Color::Cyan),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Total {:.2}", app.list.totals.total_amount.unwrap_or(0.0)),
        Style::default().fg(Color::Red),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Mine {:.2}", app.list.totals.user_amount.unwrap_or(0.0)),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn table_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(title)
}

fn amount_color(amount: f64) -> Color {
    if amount < 0.0 {
        Color::Green
    } else {
        Color::Red
    }
}

fn render_month(f: &mut Frame, area: Rect, app: &mut App<'_>) {
    let rows = app.list.expenditures.items.iter().map(|row| {
        let e = &row.expenditure;
        let marker = if e.generated { "↻" } else if row.editable { "✎" } else { "" };
        Row::new(vec![
            Cell::from(e.date.format("%Y-%m-%d").to_string()),
            Cell::from(format!("{:.2}", e.amount)).style(Style::default().fg(amount_color(e.amount))),
            Cell::from(truncate(&e.author, 15)),
            Cell::from(truncate(&e.description, 45)),
            Cell::from(marker),
        ])
        .height(1)
    });

    let title = match &app.list.keywords {
        Some(keywords) => format!(" Expenditures - {} ", keywords),
        None => " Expenditures ".to_string(),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(17),
            Constraint::Min(20),
            Constraint::Length(3),
        ],
    )
    .header(header_row(&["Date", "Amount", "Author", "Description", ""]))
    .block(table_block(&title))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_summary(f: &mut Frame, area: Rect, app: &mut App<'_>) {
    let summary = &app.summary;
    let mut rows: Vec<Row> = summary
        .months
        .iter()
        .map(|m| {
            Row::new(vec![
                Cell::from(m.month.format("%B").to_string()),
                Cell::from(m.count.to_string()),
                Cell::from(format!("{:.2}", m.amount)),
                Cell::from(format!("{:.2}", m.average)),
                Cell::from(format!("{:.2}", m.delta)).style(Style::default().fg(amount_color(m.delta))),
            ])
        })
        .collect();

    rows.push(
        Row::new(vec![
            Cell::from("Total"),
            Cell::from(""),
            Cell::from(format!("{:.2}", summary.totals.amount)),
            Cell::from(format!("{:.2}", summary.totals.average)),
            Cell::from(format!("{:.2}", summary.totals.delta)),
        ])
        .style(Style::default().add_modifier(Modifier::BOLD)),
    );

    let title = format!(" {} - {} member(s) ", summary.year, summary.members);
    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(14),
        ],
    )
    .header(header_row(&["Month", "Count", "Paid", "Share", "Balance"]))
    .block(table_block(&title))
    .highlight_style(Style::default().bg(Color::DarkGray))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_tags(f: &mut Frame, area: Rect, app: &mut App<'_>) {
    let rows = app.tags.iter().map(|t| {
        Row::new(vec![
            Cell::from(truncate(&t.name, 30)),
            Cell::from(t.count.to_string()),
            Cell::from(format!("{:.2}", t.amount)),
        ])
    });

    let table = Table::new(
        rows,
        [Constraint::Length(32), Constraint::Length(8), Constraint::Length(14)],
    )
    .header(header_row(&["Tag", "Count", "Amount"]))
    .block(table_block(" Tags "))
    .highlight_style(Style::default().bg(Color::DarkGray))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App<'_>) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let status_spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, app.row_count()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled("←/→", Style::default().fg(Color::Yellow)),
        Span::raw(" Month | "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Details | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
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

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App<'_>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Expenditure ");

    let Some(row) = app.selected_expenditure() else {
        f.render_widget(Paragraph::new("No expenditure selected").block(block), area);
        return;
    };
    let e = &row.expenditure;
    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let content = vec![
        Line::from(""),
        Line::from(vec![Span::styled("  Date: ", label), Span::raw(e.date.format("%Y-%m-%d").to_string())]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Amount: ", label),
            Span::styled(format!("{:.2}", e.amount), Style::default().fg(amount_color(e.amount))),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled("  Author: ", label), Span::raw(e.author.clone())]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Created: ", label),
            Span::raw(e.created.format("%Y-%m-%d %H:%M").to_string()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Recurring copy: ", label),
            Span::raw(if e.generated { "yes" } else { "no" }),
        ]),
        Line::from(vec![
            Span::styled("  Editable: ", label),
            Span::raw(if row.editable { "yes" } else { "no" }),
        ]),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  DESCRIPTION",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                wrap_text(&e.description, 35),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
        ]),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() || current_line.chars().count() + word.chars().count() < width {
            if !current_line.is_empty() {
                current_line.push(' ');
            }
            current_line.push_str(word);
        } else {
            if !result.is_empty() {
                result.push_str("\n  ");
            }
            result.push_str(&current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        if !result.is_empty() {
            result.push_str("\n  ");
        }
        result.push_str(&current_line);
    }

    result
}
