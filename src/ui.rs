use crate::{
    app::{App, InputMode, LogLevel, ToastLevel},
    game::{Game, STEAM_DECK},
    view::{rank_label, SortField, ViewRow},
};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Cell, Clear, Padding, Paragraph, Row, Table, TableState, Wrap,
    },
};
use std::{io, time::Duration};

const SIDE_PANEL_WIDTH: u16 = 44;
const LOG_PANEL_HEIGHT: u16 = 8;

#[derive(Clone)]
struct Theme {
    accent: Color,
    accent_soft: Color,
    border: Color,
    text: Color,
    muted: Color,
    success: Color,
    warning: Color,
    error: Color,
    header_bg: Color,
    log_bg: Color,
}

impl Theme {
    fn new() -> Self {
        Self {
            accent: Color::Rgb(120, 190, 255),
            accent_soft: Color::Rgb(70, 110, 160),
            border: Color::Rgb(65, 75, 90),
            text: Color::Rgb(220, 230, 240),
            muted: Color::Rgb(110, 118, 128),
            success: Color::Rgb(120, 220, 140),
            warning: Color::Rgb(230, 200, 120),
            error: Color::Rgb(235, 100, 95),
            header_bg: Color::Rgb(22, 28, 36),
            log_bg: Color::Rgb(16, 20, 26),
        }
    }

    fn block(&self, title: &'static str) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.border))
            .title(Span::styled(
                title,
                Style::default()
                    .fg(self.accent)
                    .add_modifier(Modifier::BOLD),
            ))
    }

    fn panel(&self, title: &'static str) -> Block<'static> {
        self.block(title).padding(Padding {
            left: 1,
            right: 1,
            top: 0,
            bottom: 0,
        })
    }
}

pub fn run(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(terminal: &mut Terminal<impl Backend>, app: &mut App) -> Result<()> {
    loop {
        app.tick();
        let height = terminal.size()?.height;
        app.list_view_height = height.saturating_sub(LOG_PANEL_HEIGHT + 7) as usize;
        terminal.draw(|frame| draw(frame, app))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key)?;
                }
            }
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    if app.help_open {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.toggle_help();
        }
        return Ok(());
    }

    match app.input_mode {
        InputMode::Search { .. } => handle_search_mode(app, key),
        InputMode::Normal => handle_normal_mode(app, key),
    }
}

fn handle_search_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => app.cancel_search(),
        KeyCode::Enter => app.submit_search(),
        KeyCode::Backspace => app.search_pop(),
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL)
                || key.modifiers.contains(KeyModifiers::ALT)
            {
                return Ok(());
            }
            app.search_push(c);
        }
        _ => {}
    }
    Ok(())
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => app.should_quit = true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true
        }
        KeyCode::Char('?') => app.toggle_help(),
        KeyCode::Char('/') | KeyCode::Char('s') => app.enter_search_mode(),
        KeyCode::Up | KeyCode::Char('k') => app.move_up(),
        KeyCode::Down | KeyCode::Char('j') => app.move_down(),
        KeyCode::PageUp => app.page_up(),
        KeyCode::PageDown => app.page_down(),
        KeyCode::Home | KeyCode::Char('g') => app.jump_to_start(),
        KeyCode::End | KeyCode::Char('G') => app.jump_to_end(),
        KeyCode::Enter => app.toggle_detail(),
        KeyCode::Esc => {
            if app.detail_open {
                app.close_detail();
            } else if !app.catalog.selection().search_query.is_empty() {
                app.clear_search();
            }
        }
        KeyCode::Char('p') => app.cycle_platform(1),
        KeyCode::Char('P') => app.cycle_platform(-1),
        KeyCode::Char('o') => app.cycle_source(1),
        KeyCode::Char('O') => app.cycle_source(-1),
        KeyCode::Char('t') => app.cycle_sort_field(1),
        KeyCode::Char('T') => app.cycle_sort_field(-1),
        KeyCode::Char('r') => app.toggle_sort_direction(),
        KeyCode::Char(digit @ '1'..='6') => {
            let index = digit as usize - '1' as usize;
            if let Some(field) = SortField::all().get(index).copied() {
                app.select_sort_field(field);
            }
        }
        KeyCode::Char('R') | KeyCode::F(5) => app.request_fetch(),
        KeyCode::Char('y') => app.copy_selected_title(),
        KeyCode::Char('w') => {
            if let Err(err) = app.save_preferences() {
                app.status = format!("Save failed: {err}");
                app.log_error(format!("Save failed: {err}"));
            }
        }
        KeyCode::Char('[') => app.scroll_log_up(3),
        KeyCode::Char(']') => app.scroll_log_down(3),
        _ => {}
    }
    Ok(())
}

fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.size();
    let theme = Theme::new();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(LOG_PANEL_HEIGHT),
            Constraint::Length(1),
        ])
        .split(area);

    let view = app.catalog.view();
    draw_header(frame, app, &theme, chunks[0], view.displayed_count, view.total_count);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(SIDE_PANEL_WIDTH)])
        .split(chunks[1]);

    if view.rows.is_empty() {
        let message = if app.catalog.loading() {
            "Loading manifest..."
        } else if app.catalog.error().is_some() && app.catalog.total_games_count() == 0 {
            "Manifest unavailable. Press R to retry."
        } else {
            "No games match the current filters."
        };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(theme.muted))
            .block(theme.panel("Games"))
            .alignment(Alignment::Center);
        frame.render_widget(empty, body_chunks[0]);
    } else {
        let rows = build_rows(&view.rows, &theme);
        let sort = app.catalog.selection().sort_by;
        let table = Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Min(16),
                Constraint::Length(10),
                Constraint::Length(7),
                Constraint::Length(6),
                Constraint::Length(6),
                Constraint::Length(9),
            ],
        )
        .header(
            Row::new(vec![
                header_cell("Rank", sort == SortField::Rank, app),
                header_cell("Title", sort == SortField::Name, app),
                header_cell("Release", sort == SortField::ReleaseDate, app),
                header_cell("Harmony", sort == SortField::HarmonyScore, app),
                header_cell("Meta", sort == SortField::Metacritic, app),
                header_cell("Total", sort == SortField::TotalScore, app),
                Cell::from("Deck"),
            ])
            .style(Style::default().fg(theme.text).add_modifier(Modifier::BOLD)),
        )
        .column_spacing(1)
        .block(theme.panel("Games"))
        .highlight_style(
            Style::default()
                .bg(theme.accent_soft)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">");

        let mut state = TableState::default();
        state.select(Some(app.selected));
        frame.render_stateful_widget(table, body_chunks[0], &mut state);
    }

    match app.catalog.selected_game().filter(|_| app.detail_open) {
        Some(game) => draw_detail(frame, app, &theme, body_chunks[1], game),
        None => draw_summary(frame, app, &theme, body_chunks[1]),
    }

    draw_log(frame, app, &theme, chunks[2]);
    draw_status(frame, app, &theme, chunks[3]);

    if app.toast.is_some() {
        draw_toast(frame, app, &theme, chunks[1]);
    }
    if app.help_open {
        draw_help(frame, &theme, area);
    }
}

fn header_cell(label: &'static str, active: bool, app: &App) -> Cell<'static> {
    if active {
        let arrow = app.catalog.selection().sort_direction.arrow();
        Cell::from(format!("{label}{arrow}"))
    } else {
        Cell::from(label)
    }
}

fn draw_header(
    frame: &mut Frame<'_>,
    app: &App,
    theme: &Theme,
    area: Rect,
    displayed: usize,
    total: usize,
) {
    let selection = app.catalog.selection();
    let query = selection.search_query.as_str();
    let header = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(
                "Ludoteca",
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled("Games: ", Style::default().fg(theme.muted)),
            Span::styled(
                format!("{displayed}/{total}"),
                Style::default().fg(theme.success).add_modifier(Modifier::BOLD),
            ),
            if app.catalog.loading() {
                Span::styled(
                    "  LOADING",
                    Style::default().fg(theme.warning).add_modifier(Modifier::BOLD),
                )
            } else {
                Span::raw("")
            },
        ]),
        Line::from(vec![
            Span::styled("Platform: ", Style::default().fg(theme.muted)),
            Span::styled(selection.platform.to_string(), Style::default().fg(theme.text)),
            Span::raw("   "),
            Span::styled("Source: ", Style::default().fg(theme.muted)),
            Span::styled(selection.source.to_string(), Style::default().fg(theme.text)),
            Span::raw("   "),
            Span::styled("Sort: ", Style::default().fg(theme.muted)),
            Span::styled(
                format!(
                    "{} {}",
                    selection.sort_by.label(),
                    selection.sort_direction.arrow()
                ),
                Style::default().fg(theme.text),
            ),
            Span::raw("   "),
            Span::styled("Search: ", Style::default().fg(theme.muted)),
            Span::styled(
                if query.is_empty() { "-".to_string() } else { format!("\"{query}\"") },
                Style::default().fg(theme.accent),
            ),
        ]),
    ])
    .style(Style::default().bg(theme.header_bg))
    .alignment(Alignment::Center);
    frame.render_widget(header, area);
}

fn build_rows<'a>(rows: &[ViewRow<'a>], theme: &Theme) -> Vec<Row<'a>> {
    rows.iter()
        .map(|row| {
            let game = row.game;
            let rank = rank_label(row.rank);
            let style = if row.deemphasized {
                Style::default().fg(theme.muted).add_modifier(Modifier::DIM)
            } else {
                Style::default().fg(theme.text)
            };
            Row::new(vec![
                Cell::from(rank),
                Cell::from(game.title.as_str()),
                Cell::from(game.release_label()),
                Cell::from(score_label(game.harmony_score)),
                Cell::from(score_label(game.metacritic)),
                Cell::from(score_label(game.total_score)),
                Cell::from(
                    game.platforms
                        .get(STEAM_DECK)
                        .map(|support| support.label())
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ])
            .style(style)
        })
        .collect()
}

fn score_label(score: Option<f64>) -> String {
    match score {
        Some(value) if value.fract() == 0.0 => format!("{value:.0}"),
        Some(value) => format!("{value:.1}"),
        None => "-".to_string(),
    }
}

fn draw_detail(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect, game: &Game) {
    let mut lines = vec![
        Line::from(Span::styled(
            game.title.clone(),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("Released: ", Style::default().fg(theme.muted)),
            Span::styled(game.release_label(), Style::default().fg(theme.text)),
        ]),
        Line::from(vec![
            Span::styled("Harmony: ", Style::default().fg(theme.muted)),
            Span::styled(score_label(game.harmony_score), Style::default().fg(theme.text)),
            Span::styled("  Meta: ", Style::default().fg(theme.muted)),
            Span::styled(score_label(game.metacritic), Style::default().fg(theme.text)),
            Span::styled("  Total: ", Style::default().fg(theme.muted)),
            Span::styled(score_label(game.total_score), Style::default().fg(theme.text)),
        ]),
        Line::from(""),
        Line::from(Span::styled("Rankings", Style::default().fg(theme.accent))),
    ];
    let selected_source = app.catalog.selection().source.as_str();
    if game.rankings.is_empty() {
        lines.push(Line::from(Span::styled("  unranked", Style::default().fg(theme.muted))));
    }
    for (source, rank) in &game.rankings {
        let style = if source == selected_source {
            Style::default().fg(theme.success).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("  {source}: "), Style::default().fg(theme.muted)),
            Span::styled(format!("#{rank}"), style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Platforms", Style::default().fg(theme.accent))));
    for (platform, support) in &game.platforms {
        let supported = crate::game::is_platform_supported(game, platform);
        lines.push(Line::from(vec![
            Span::styled(format!("  {platform}: "), Style::default().fg(theme.muted)),
            Span::styled(
                support.label(),
                Style::default().fg(if supported { theme.success } else { theme.warning }),
            ),
        ]));
    }

    let detail = Paragraph::new(lines)
        .block(theme.panel("Details"))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, area);
}

fn draw_summary(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let sources = app.catalog.known_sources();
    let platforms = app.catalog.known_platforms();
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Manifest: ", Style::default().fg(theme.muted)),
            Span::styled(app.location.to_string(), Style::default().fg(theme.text)),
        ]),
        Line::from(vec![
            Span::styled("Updated: ", Style::default().fg(theme.muted)),
            Span::styled(
                app.catalog.last_updated().unwrap_or("unknown").to_string(),
                Style::default().fg(theme.text),
            ),
        ]),
    ];
    if let Some(error) = app.catalog.error() {
        lines.push(Line::from(vec![
            Span::styled("Error: ", Style::default().fg(theme.error)),
            Span::styled(error.to_string(), Style::default().fg(theme.error)),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Sources: ", Style::default().fg(theme.muted)),
        Span::styled(join_or_dash(&sources), Style::default().fg(theme.text)),
    ]));
    lines.push(Line::from(vec![
        Span::styled("Platforms: ", Style::default().fg(theme.muted)),
        Span::styled(join_or_dash(&platforms), Style::default().fg(theme.text)),
    ]));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter details  / search  ? help",
        Style::default().fg(theme.muted),
    )));

    let summary = Paragraph::new(lines)
        .block(theme.panel("Catalog"))
        .wrap(Wrap { trim: true });
    frame.render_widget(summary, area);
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

fn draw_log(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let height = area.height.saturating_sub(2) as usize;
    let end = app.logs.len().saturating_sub(app.log_scroll);
    let start = end.saturating_sub(height);
    let lines: Vec<Line> = app.logs[start..end]
        .iter()
        .map(|entry| {
            let color = match entry.level {
                LogLevel::Info => theme.text,
                LogLevel::Warn => theme.warning,
                LogLevel::Error => theme.error,
            };
            Line::from(Span::styled(entry.message.clone(), Style::default().fg(color)))
        })
        .collect();
    let log = Paragraph::new(lines)
        .style(Style::default().bg(theme.log_bg))
        .block(theme.panel("Log"));
    frame.render_widget(log, area);
}

fn draw_status(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let line = match &app.input_mode {
        InputMode::Search { buffer, .. } => Line::from(vec![
            Span::styled("Search: ", Style::default().fg(theme.accent)),
            Span::styled(buffer.clone(), Style::default().fg(theme.text)),
            Span::styled("_", Style::default().fg(theme.accent)),
        ]),
        InputMode::Normal => Line::from(Span::styled(
            app.status.clone(),
            Style::default().fg(theme.muted),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_toast(frame: &mut Frame<'_>, app: &App, theme: &Theme, body_area: Rect) {
    let Some(toast) = &app.toast else {
        return;
    };
    let color = match toast.level {
        ToastLevel::Info => theme.success,
        ToastLevel::Warn => theme.warning,
        ToastLevel::Error => theme.error,
    };
    let width = (toast.message.chars().count() as u16 + 4).min(body_area.width);
    let area = Rect {
        x: body_area.x + body_area.width.saturating_sub(width + 1),
        y: body_area.y + 1,
        width,
        height: 3,
    };
    frame.render_widget(Clear, area);
    let toast_widget = Paragraph::new(toast.message.clone())
        .style(Style::default().fg(color))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(color)),
        );
    frame.render_widget(toast_widget, area);
}

fn draw_help(frame: &mut Frame<'_>, theme: &Theme, area: Rect) {
    let entries = [
        ("j/k, arrows", "move"),
        ("PgUp/PgDn, g/G", "page, first, last"),
        ("Enter", "toggle details"),
        ("/ or s", "search titles"),
        ("p / P", "next / previous platform"),
        ("o / O", "next / previous source"),
        ("t / T", "next / previous sort field"),
        ("1-6", "sort by rank, release, title, harmony, meta, total"),
        ("r", "reverse sort"),
        ("R / F5", "reload manifest"),
        ("y", "copy title"),
        ("w", "save filters as defaults"),
        ("[ / ]", "scroll log"),
        ("Esc", "close details / clear search"),
        ("q", "quit"),
    ];
    let lines: Vec<Line> = entries
        .iter()
        .map(|(keys, action)| {
            Line::from(vec![
                Span::styled(format!("{keys:<18}"), Style::default().fg(theme.accent)),
                Span::styled(*action, Style::default().fg(theme.text)),
            ])
        })
        .collect();
    let width = 64.min(area.width);
    let height = (lines.len() as u16 + 2).min(area.height);
    let popup = Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    };
    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(lines).block(theme.panel("Keys")), popup);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_labels_drop_trailing_zero() {
        assert_eq!(score_label(Some(93.0)), "93");
        assert_eq!(score_label(Some(87.34)), "87.3");
        assert_eq!(score_label(None), "-");
    }
}
