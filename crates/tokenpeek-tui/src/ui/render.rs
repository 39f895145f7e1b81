use std::time::Instant;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use tokenpeek_core::{Field, Route};

use crate::app::{App, AppState, LoginFocus, SocialProvider, TokenFocus};

use super::styles;

/// Login box dimensions
const LOGIN_WIDTH: u16 = 56;
const LOGIN_HEIGHT: u16 = 22;

/// Visible characters inside a text field
const FIELD_WIDTH: usize = 44;

const NOTICE_WIDTH: u16 = 50;
const NOTICE_HEIGHT: u16 = 7;

pub fn render(frame: &mut Frame, app: &App, now: Instant) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    let route = app.route();
    render_title_bar(frame, route, chunks[0]);
    match route {
        Route::Login => match app.consent_url.as_deref().filter(|_| app.is_signing_in()) {
            Some(url) => {
                let panel_height = consent_panel_height(url, chunks[1]);
                let parts = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(0), Constraint::Length(panel_height)])
                    .split(chunks[1]);
                render_login(frame, app, parts[0]);
                render_consent_url(frame, url, parts[1]);
            }
            None => render_login(frame, app, chunks[1]),
        },
        Route::Token => render_token(frame, app, chunks[1], now),
    }
    render_status_bar(frame, app, route, chunks[2]);

    if matches!(app.state, AppState::ShowingNotice) {
        render_notice_overlay(frame, app);
    }
}

fn render_title_bar(frame: &mut Frame, route: Route, area: Rect) {
    let title = "  tokenpeek";
    let location = format!("{}  ", route.path());

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + location.len()),
        )),
        Span::styled(location, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

// ============================================================================
// Login Screen
// ============================================================================

fn render_login(frame: &mut Frame, app: &App, area: Rect) {
    let area = centered_rect_fixed(LOGIN_WIDTH, LOGIN_HEIGHT, area);
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];

    // Email field
    let email_focused = app.login_focus == LoginFocus::Email;
    lines.push(Line::from(Span::styled("  Email", styles::muted_style())));
    lines.push(text_field(&app.login_email, email_focused));
    lines.push(error_line(app.error_for(Field::Email)));

    // Password field
    let password_focused = app.login_focus == LoginFocus::Password;
    let password_display = if app.show_password {
        app.login_password.clone()
    } else {
        "*".repeat(app.login_password.chars().count())
    };
    lines.push(Line::from(Span::styled("  Password", styles::muted_style())));
    lines.push(text_field(&password_display, password_focused));
    lines.push(error_line(app.error_for(Field::Password)));

    // Show password toggle
    let checkbox = if app.show_password { "[x]" } else { "[ ]" };
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled(
            format!("{} Show password", checkbox),
            styles::button_style(app.login_focus == LoginFocus::ShowPassword, true),
        ),
    ]));
    lines.push(Line::from(""));

    lines.push(button_line("Login", app.login_focus == LoginFocus::Submit, true));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  ──────────────────────── or ────────────────────────",
        styles::muted_style(),
    )));
    lines.push(Line::from(""));

    // Social buttons
    let signing_in = app.is_signing_in();
    for provider in [SocialProvider::Google, SocialProvider::Apple, SocialProvider::Facebook] {
        let focused = app.login_focus == LoginFocus::Social(provider);
        let enabled = !(provider.is_wired() && signing_in);
        lines.push(button_line(provider.label(), focused, enabled));
    }

    if signing_in {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("  Waiting for Google in your browser. ", styles::highlight_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" cancels.", styles::muted_style()),
        ]));
    }

    let block = Block::default()
        .title(Span::styled(format!(" {} ", Route::Login.title()), styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Rows needed to show the whole consent URL plus the panel's top border.
/// Never more than half the main area.
fn consent_panel_height(url: &str, area: Rect) -> u16 {
    let width = area.width.max(1) as usize;
    let rows = url.chars().count().div_ceil(width) + 1;
    (rows as u16).min(area.height / 2)
}

/// The consent URL, hard-wrapped across the full width so it can be selected
/// and opened by hand when no browser was launched
fn render_consent_url(frame: &mut Frame, url: &str, area: Rect) {
    frame.render_widget(Clear, area);

    let width = area.width.max(1) as usize;
    let chars: Vec<char> = url.chars().collect();
    let lines: Vec<Line> = chars
        .chunks(width)
        .map(|chunk| {
            let text: String = chunk.iter().collect();
            Line::from(Span::styled(text, styles::list_item_style()))
        })
        .collect();

    let block = Block::default()
        .title(Span::styled(" If no browser opened, visit ", styles::highlight_style()))
        .borders(Borders::TOP)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// A bracketed single-line input, scrolled so the end of the text stays visible
fn text_field(value: &str, focused: bool) -> Line<'static> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let cursor = if focused { "▌" } else { "" };
    let visible = tail(value, FIELD_WIDTH - 1);
    let display = format!("{}{}", visible, cursor);
    let padding = FIELD_WIDTH.saturating_sub(display.chars().count());

    Line::from(vec![
        Span::styled("  [", styles::muted_style()),
        Span::styled(format!("{}{}", display, " ".repeat(padding)), style),
        Span::styled("]", styles::muted_style()),
    ])
}

fn error_line(error: Option<String>) -> Line<'static> {
    match error {
        Some(message) => Line::from(Span::styled(format!("   {}", message), styles::error_style())),
        None => Line::from(""),
    }
}

fn button_line(label: &str, focused: bool, enabled: bool) -> Line<'static> {
    let text = if focused && enabled {
        format!(" ▶ {} ◀ ", label)
    } else {
        format!("   {}   ", label)
    };
    Line::from(vec![
        Span::raw("  ["),
        Span::styled(text, styles::button_style(focused, enabled)),
        Span::raw("]"),
    ])
}

/// The last `max` characters of `s`
fn tail(s: &str, max: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(max)).collect()
}

// ============================================================================
// Token Screen
// ============================================================================

fn render_token(frame: &mut Frame, app: &App, area: Rect, now: Instant) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Token text
            Constraint::Length(3), // Buttons
        ])
        .split(area);

    let view = &app.token_view;
    let token_style = if view.can_copy() {
        styles::list_item_style()
    } else {
        styles::muted_style()
    };

    let block = Block::default()
        .title(Span::styled(format!(" {} ", Route::Token.title()), styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let paragraph = Paragraph::new(Span::styled(view.display_text(), token_style))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, chunks[0]);

    let copy_label = view.copy_label(now);
    let copy_style = if view.is_copied(now) {
        styles::success_style()
    } else {
        styles::button_style(app.token_focus == TokenFocus::Copy, view.can_copy())
    };
    let back_focused = app.token_focus == TokenFocus::Back;

    let buttons = Line::from(vec![
        Span::raw(" ["),
        Span::styled(
            if back_focused { " ▶ Back to Login ◀ " } else { "   Back to Login   " },
            styles::button_style(back_focused, true),
        ),
        Span::raw("]   ["),
        Span::styled(format!("   {}   ", copy_label), copy_style),
        Span::raw("]"),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(buttons).block(block), chunks[1]);
}

// ============================================================================
// Status Bar and Overlays
// ============================================================================

fn render_status_bar(frame: &mut Frame, app: &App, route: Route, area: Rect) {
    let shortcuts: &[(&str, &str)] = match route {
        Route::Login if app.is_signing_in() => &[("Esc", "cancel sign-in")],
        Route::Login => &[("Tab", "next"), ("Enter", "select"), ("Esc", "quit")],
        Route::Token => &[("c", "copy"), ("b", "back"), ("q", "quit")],
    };

    let left_text = app
        .status_message
        .as_ref()
        .map(|msg| format!(" {} ", msg))
        .unwrap_or_default();

    let mut right = Vec::new();
    let mut right_len = 0;
    for (key, desc) in shortcuts {
        let desc = format!(" {}  ", desc);
        right_len += key.len() + desc.len();
        right.push(Span::styled(*key, styles::help_key_style()));
        right.push(Span::styled(desc, styles::muted_style()));
    }

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_len);

    let mut spans = vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
    ];
    spans.extend(right);

    let paragraph = Paragraph::new(Line::from(spans)).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn render_notice_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(NOTICE_WIDTH, NOTICE_HEIGHT, frame.area());
    frame.render_widget(Clear, area);

    let message = app.notice.as_deref().unwrap_or_default();
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!(" {}", message), styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Press ", styles::muted_style()),
            Span::styled("Enter", styles::help_key_style()),
            Span::styled(" to dismiss", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
