use anyhow::Result;
use brokerage_ledger::{AccountBalance, LedgerEntry, Trade, CHART};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
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
use rust_decimal::Decimal;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Trades,
    Ledger,
    TrialBalance,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Trades => Page::Ledger,
            Page::Ledger => Page::TrialBalance,
            Page::TrialBalance => Page::Trades,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Trades => Page::TrialBalance,
            Page::Ledger => Page::Trades,
            Page::TrialBalance => Page::Ledger,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Trades => "Trades",
            Page::Ledger => "General Ledger",
            Page::TrialBalance => "Trial Balance",
        }
    }
}

pub struct App {
    pub trades: Vec<Trade>,
    pub ledger: Vec<LedgerEntry>,
    pub filtered_ledger: Vec<LedgerEntry>,
    pub balances: Vec<AccountBalance>,
    pub trade_state: TableState,
    pub ledger_state: TableState,
    pub balance_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    /// Ledger restricted to one account number
    pub account_filter: Option<String>,
}

impl App {
    pub fn new(
        trades: Vec<Trade>,
        ledger: Vec<LedgerEntry>,
        balances: Vec<AccountBalance>,
    ) -> Self {
        let mut trade_state = TableState::default();
        if !trades.is_empty() {
            trade_state.select(Some(0));
        }
        let mut ledger_state = TableState::default();
        if !ledger.is_empty() {
            ledger_state.select(Some(0));
        }
        let mut balance_state = TableState::default();
        balance_state.select(Some(0));

        let filtered_ledger = ledger.clone();

        Self {
            trades,
            ledger,
            filtered_ledger,
            balances,
            trade_state,
            ledger_state,
            balance_state,
            current_page: Page::Trades,
            show_detail: false,
            account_filter: None,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_trade(&self) -> Option<&Trade> {
        self.trade_state.selected().and_then(|i| self.trades.get(i))
    }

    pub fn filter_account(&mut self, account: Option<&str>) {
        self.account_filter = account.map(str::to_string);
        self.filtered_ledger = match account {
            None => self.ledger.clone(),
            Some(number) => self
                .ledger
                .iter()
                .filter(|e| e.account_number == number)
                .cloned()
                .collect(),
        };

        if self.filtered_ledger.is_empty() {
            self.ledger_state.select(None);
        } else {
            self.ledger_state.select(Some(0));
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn active(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Trades => (&mut self.trade_state, self.trades.len()),
            Page::Ledger => (&mut self.ledger_state, self.filtered_ledger.len()),
            Page::TrialBalance => (&mut self.balance_state, self.balances.len()),
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = state.selected().map(|i| (i + 20).min(len - 1)).unwrap_or(0);
        state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let (state, _) = self.active();
        let i = state.selected().map(|i| i.saturating_sub(20)).unwrap_or(0);
        state.select(Some(i));
    }

    pub fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats::default();

        for trade in &self.trades {
            if trade.is_finalized {
                stats.finalized += 1;
            } else {
                stats.open += 1;
            }
        }
        for entry in &self.ledger {
            stats.debits += entry.debit;
            stats.credits += entry.credit;
        }

        stats
    }
}

#[derive(Default)]
pub struct LedgerStats {
    pub open: usize,
    pub finalized: usize,
    pub debits: Decimal,
    pub credits: Decimal,
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

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

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
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('c') if app.current_page == Page::Ledger => app.filter_account(None),
                KeyCode::Char('1') if app.current_page == Page::Ledger => {
                    app.filter_account(Some("10100"))
                }
                KeyCode::Char('2') if app.current_page == Page::Ledger => {
                    app.filter_account(Some("10200"))
                }
                KeyCode::Char('3') if app.current_page == Page::Ledger => {
                    app.filter_account(Some("10300"))
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.active().0.select(Some(0)),
                KeyCode::End => {
                    let (state, len) = app.active();
                    if len > 0 {
                        state.select(Some(len - 1));
                    }
                }
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

    if app.show_detail && app.current_page == Page::Trades {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);

        render_trades(f, content_chunks[0], app);
        render_trade_detail(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Trades => render_trades(f, chunks[1], app),
            Page::Ledger => render_ledger(f, chunks[1], app),
            Page::TrialBalance => render_trial_balance(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn header_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

fn table_block(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(title)
}

fn highlight() -> Style {
    Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let stats = app.stats();

    let mut tab_spans = vec![];
    for (i, page) in [Page::Trades, Page::Ledger, Page::TrialBalance].iter().enumerate() {
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

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Open: {}", stats.open),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Finalized: {}", stats.finalized),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  |  "));

    let balanced_color = if stats.debits == stats.credits { Color::Green } else { Color::Red };
    tab_spans.push(Span::styled(
        format!("Dr {:.2} / Cr {:.2}", stats.debits, stats.credits),
        Style::default().fg(balanced_color),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_trades(f: &mut Frame, area: Rect, app: &mut App) {
    let header = Row::new(
        ["#", "Address", "Closing", "Commission", "Deposit", "We Hold", "Status"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.trades.iter().map(|trade| {
        let (status, color) = if trade.is_finalized {
            ("FINAL", Color::Green)
        } else {
            ("OPEN", Color::Yellow)
        };

        Row::new(vec![
            Cell::from(trade.trade_number.to_string()),
            Cell::from(truncate(&trade.key_info.address, 30)),
            Cell::from(
                trade
                    .key_info
                    .closing_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::from(format!("{:.2}", trade.commission.total_commission)),
            Cell::from(format!("{:.2}", trade.deposit_held())),
            Cell::from(if trade.we_hold() { "yes" } else { "no" }),
            Cell::from(status).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(32),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(table_block(" Trades ".to_string()))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.trade_state);
}

fn render_ledger(f: &mut Frame, area: Rect, app: &mut App) {
    let header = Row::new(
        ["Entry", "Date", "Account", "Debit", "Credit", "EFT", "Description"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.filtered_ledger.iter().map(|entry| {
        let cleared = if entry.cleared { "✓ " } else { "" };
        Row::new(vec![
            Cell::from(entry.entry_number.to_string()),
            Cell::from(entry.date.to_string()),
            Cell::from(format!("{} {}", entry.account_number, truncate(&entry.account_name, 18))),
            Cell::from(money_cell(entry.debit)).style(Style::default().fg(Color::Green)),
            Cell::from(money_cell(entry.credit)).style(Style::default().fg(Color::Red)),
            Cell::from(entry.eft_number.map(|n| n.to_string()).unwrap_or_default()),
            Cell::from(format!("{}{}", cleared, truncate(&entry.description, 40))),
        ])
        .height(1)
    });

    let title = match &app.account_filter {
        Some(account) => format!(" General Ledger - {} ", account),
        None => " General Ledger ".to_string(),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(7),
            Constraint::Length(12),
            Constraint::Length(26),
            Constraint::Length(13),
            Constraint::Length(13),
            Constraint::Length(6),
            Constraint::Min(20),
        ],
    )
    .header(header)
    .block(table_block(title))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.ledger_state);
}

fn render_trial_balance(f: &mut Frame, area: Rect, app: &mut App) {
    let header = Row::new(
        ["Account", "Name", "Debits", "Credits", "Balance"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.balances.iter().map(|b| {
        let color = if b.balance < Decimal::ZERO { Color::Red } else { Color::Green };
        Row::new(vec![
            Cell::from(b.account_number.clone()),
            Cell::from(b.account_name.clone()),
            Cell::from(format!("{:.2}", b.debits)),
            Cell::from(format!("{:.2}", b.credits)),
            Cell::from(format!("{:.2}", b.balance)).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(9),
            Constraint::Length(28),
            Constraint::Length(15),
            Constraint::Length(15),
            Constraint::Length(15),
        ],
    )
    .header(header)
    .block(table_block(format!(" Trial Balance - {} accounts in chart ", CHART.len())))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.balance_state);
}

fn label(text: &str) -> Span<'static> {
    Span::styled(
        format!("  {}: ", text),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )
}

fn render_trade_detail(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Trade Details ");

    let Some(trade) = app.selected_trade() else {
        f.render_widget(Paragraph::new("No trade selected").block(block), area);
        return;
    };

    let mut content = vec![
        Line::from(""),
        Line::from(vec![label("Trade"), Span::raw(format!("#{}", trade.trade_number))]),
        Line::from(vec![label("Address"), Span::raw(trade.key_info.address.clone())]),
        Line::from(vec![label("MLS"), Span::raw(trade.key_info.mls_number.clone())]),
        Line::from(vec![
            label("Sale Price"),
            Span::raw(format!("{:.2}", trade.key_info.sale_price)),
        ]),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(vec![Span::styled(
            "  COMMISSION",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(vec![
            label("Commission"),
            Span::raw(format!("{:.2}", trade.commission.total_commission)),
        ]),
        Line::from(vec![label("HST"), Span::raw(format!("{:.2}", trade.commission.hst()))]),
        Line::from(vec![
            label("Total"),
            Span::styled(
                format!("{:.2}", trade.commission.total_with_hst()),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(vec![
            label("Deposit Held"),
            Span::raw(format!("{:.2}", trade.deposit_held())),
            Span::raw(if trade.we_hold() { " (we hold)" } else { " (co-op holds)" }),
        ]),
        Line::from(""),
    ];

    for row in &trade.agent_commissions {
        content.push(Line::from(vec![
            Span::raw("  • "),
            Span::raw(truncate(&row.agent_id, 12)),
            Span::raw(format!("  {:.2}", row.award(trade.commission.total_commission))),
        ]));
    }
    for broker in &trade.outside_brokers {
        content.push(Line::from(vec![
            Span::raw("  ◦ "),
            Span::raw(broker.name.clone()),
            Span::raw(format!("  {:.2}", broker.commission)),
        ]));
    }

    content.push(Line::from(""));
    content.push(Line::from(vec![
        label("Status"),
        if trade.is_finalized {
            Span::styled(
                format!("finalized, {} EFTs", trade.eft_ids.len()),
                Style::default().fg(Color::Green),
            )
        } else {
            Span::styled("open", Style::default().fg(Color::Yellow))
        },
    ]));
    content.push(Line::from(""));
    content.push(Line::from(vec![Span::styled(
        "  Press Enter to close",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )]));

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let (selected, total) = match app.current_page {
        Page::Trades => (app.trade_state.selected(), app.trades.len()),
        Page::Ledger => (app.ledger_state.selected(), app.filtered_ledger.len()),
        Page::TrialBalance => (app.balance_state.selected(), app.balances.len()),
    };
    let selected = selected.map(|i| i + 1).unwrap_or(0);

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if app.current_page == Page::Ledger {
        status_spans.push(Span::raw(" | "));
        status_spans.push(key("1-3"));
        status_spans.push(Span::raw(" Bank "));
        status_spans.push(key("c"));
        status_spans.push(Span::raw(" All"));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(key("Enter"));
    status_spans.push(Span::raw(" Details | "));
    status_spans.push(key("Tab"));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(key("↑/↓"));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn money_cell(amount: Decimal) -> String {
    if amount.is_zero() {
        String::new()
    } else {
        format!("{:.2}", amount)
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokerage_ledger::ledger::{LedgerBatch, RE_TRUST_BANK, TRUST_LIABILITY};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn app() -> App {
        let mut batch = LedgerBatch::new("ui", NaiveDate::from_ymd_opt(2026, 5, 1).unwrap());
        batch.push_pair(RE_TRUST_BANK, TRUST_LIABILITY, dec!(500), "Deposit", None);
        App::new(vec![Trade::new("1 King St W", dec!(100))], batch.entries, Vec::new())
    }

    #[test]
    fn test_page_cycle() {
        let mut app = app();
        assert_eq!(app.current_page, Page::Trades);
        app.next_page();
        app.next_page();
        assert_eq!(app.current_page, Page::TrialBalance);
        app.next_page();
        assert_eq!(app.current_page, Page::Trades);
        app.previous_page();
        assert_eq!(app.current_page, Page::TrialBalance);
    }

    #[test]
    fn test_ledger_account_filter() {
        let mut app = app();
        app.current_page = Page::Ledger;

        app.filter_account(Some("10100"));
        assert_eq!(app.filtered_ledger.len(), 1);
        assert_eq!(app.ledger_state.selected(), Some(0));

        app.filter_account(Some("10300"));
        assert!(app.filtered_ledger.is_empty());
        assert_eq!(app.ledger_state.selected(), None);

        app.filter_account(None);
        assert_eq!(app.filtered_ledger.len(), 2);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app();
        app.current_page = Page::Ledger;
        app.next();
        assert_eq!(app.ledger_state.selected(), Some(1));
        app.next();
        assert_eq!(app.ledger_state.selected(), Some(0));
        app.previous();
        assert_eq!(app.ledger_state.selected(), Some(1));
    }

    #[test]
    fn test_stats_and_truncate() {
        let app = app();
        let stats = app.stats();
        assert_eq!(stats.open, 1);
        assert_eq!(stats.debits, stats.credits);
        assert_eq!(truncate("123 Very Long Street Name", 10), "123 Ver...");
    }
}
