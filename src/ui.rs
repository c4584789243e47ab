pub mod format;

use chrono::Utc;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Widget, Wrap},
};

use crate::api::SessionApi;
use crate::app::App;
use crate::capture::InputMode;
use crate::controller::SessionPhase;
use crate::ui::format::{format_clock, format_deadline, wrapped_height};

const HORIZONTAL_MARGIN: u16 = 4;
const VERTICAL_MARGIN: u16 = 1;

impl<A: SessionApi> Widget for &App<A> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.phase() {
            SessionPhase::Loading => render_loading(self, area, buf),
            SessionPhase::NotStarted => render_start(self, area, buf),
            SessionPhase::InProgress => render_question(self, area, buf),
            SessionPhase::Completed => render_completed(self, area, buf),
            SessionPhase::AlreadySubmitted => render_closed(self, area, buf),
        }

        if self.controller.guard().is_awaiting_confirmation() {
            render_leave_prompt(area, buf);
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_italic() -> Style {
    Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::ITALIC)
}

fn error_style() -> Style {
    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
}

fn warning_style() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn frame(area: Rect) -> Rect {
    Layout::default()
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([Constraint::Min(0)])
        .split(area)[0]
}

fn status_line<A: SessionApi>(app: &App<A>) -> Option<Line<'static>> {
    if let Some(err) = app.controller.last_error() {
        return Some(Line::from(Span::styled(err.to_string(), error_style())));
    }
    app.flash
        .as_ref()
        .map(|msg| Line::from(Span::styled(msg.clone(), warning_style())))
}

fn render_loading<A: SessionApi>(app: &App<A>, area: Rect, buf: &mut Buffer) {
    let mut lines = vec![Line::from(Span::styled(
        format!("Loading interview {}", app.controller.session_id()),
        bold(),
    ))];
    if let Some(status) = status_line(app) {
        lines.push(Line::default());
        lines.push(status);
        lines.push(Line::from(Span::styled(
            "(r)etry / (esc)ape",
            dim_italic(),
        )));
    }
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(centered(area, 70, 8), buf);
}

fn render_start<A: SessionApi>(app: &App<A>, area: Rect, buf: &mut Buffer) {
    let Some(session) = app.controller.session() else {
        return;
    };
    let total_secs: u64 = session
        .questions
        .iter()
        .map(|q| u64::from(q.time_limit.get()))
        .sum();

    let mut lines = vec![
        Line::from(Span::styled(session.title.clone(), bold().fg(Color::Cyan))),
        Line::default(),
    ];
    if let Some(desc) = &session.description {
        lines.push(Line::from(desc.clone()));
        lines.push(Line::default());
    }
    lines.push(Line::from(format!(
        "{} questions, up to {} in total",
        session.questions.len(),
        format_clock(total_secs)
    )));
    if let Some(deadline) = session.deadline {
        lines.push(Line::from(format_deadline(deadline, Utc::now())));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Each question has its own timer and submits itself when time runs out.",
        dim_italic(),
    )));
    lines.push(Line::from(Span::styled(
        "You cannot go back to a question once you move on. Copy and paste are disabled.",
        dim_italic(),
    )));
    lines.push(Line::default());
    if let Some(status) = status_line(app) {
        lines.push(status);
    }
    lines.push(Line::from(Span::styled(
        "(enter) start / (esc)ape",
        bold(),
    )));

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Interview"))
        .render(centered(area, 80, 16), buf);
}

fn render_question<A: SessionApi>(app: &App<A>, area: Rect, buf: &mut Buffer) {
    let controller = &app.controller;
    let Some(question) = controller.current_question() else {
        return;
    };
    let inner = frame(area);
    let capture = controller.capture();
    let answer_height = wrapped_height(capture.text(), inner.width.saturating_sub(2)) + 2;
    let prompt_height = wrapped_height(&question.text, inner.width);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),             // header
            Constraint::Length(1),             // timer gauge
            Constraint::Length(1),             // padding
            Constraint::Length(prompt_height), // prompt
            Constraint::Length(1),             // padding
            Constraint::Min(answer_height.max(3)), // answer
            Constraint::Length(1), // notice / error
            Constraint::Length(1), // legend
        ])
        .split(inner);

    let title = controller
        .session()
        .map(|s| s.title.clone())
        .unwrap_or_default();
    Paragraph::new(Line::from(vec![
        Span::styled(title, bold()),
        Span::raw("   "),
        Span::styled(
            format!(
                "Question {} / {}  (worth {} pts)",
                question.ordinal + 1,
                controller.question_count(),
                question.max_score
            ),
            dim_italic(),
        ),
    ]))
    .render(chunks[0], buf);

    let limit = question.time_limit.get();
    let remaining = controller.remaining_seconds().unwrap_or(limit);
    let ratio = f64::from(remaining) / f64::from(limit);
    let gauge_color = if remaining <= 10 {
        Color::Red
    } else if ratio < 0.33 {
        Color::Yellow
    } else {
        Color::Green
    };
    Gauge::default()
        .gauge_style(Style::default().fg(gauge_color))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(format!("{} left", format_clock(u64::from(remaining))))
        .render(chunks[1], buf);

    Paragraph::new(question.text.clone())
        .style(bold())
        .wrap(Wrap { trim: false })
        .render(chunks[3], buf);

    let mode = match capture.mode() {
        InputMode::Text => "typing",
        InputMode::Dictation => "dictating",
    };
    let answer_title = if controller.is_finalize_pending() {
        "Your answer (submitted, waiting for upload)".to_string()
    } else {
        format!("Your answer ({})", mode)
    };
    let mut answer = capture.text().to_string();
    if !controller.is_finalize_pending() {
        answer.push('▏');
    }
    Paragraph::new(answer)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(answer_title))
        .render(chunks[5], buf);

    let notice = status_line(app).or_else(|| {
        capture
            .notice()
            .map(|n| Line::from(Span::styled(n.message(), warning_style())))
    });
    if let Some(line) = notice {
        Paragraph::new(line).render(chunks[6], buf);
    }

    let legend = if controller.is_finalize_pending() {
        "(enter) retry submission / (esc)ape".to_string()
    } else {
        let submit = if controller.is_last_question() {
            "(enter) finish"
        } else {
            "(enter) next"
        };
        let mut dictate = String::new();
        if capture.is_dictation_supported() {
            dictate.push_str(" / (f2) dictation");
            if app.can_switch_language() {
                dictate.push_str(&format!(" / (f3) {}", capture.language()));
            }
        }
        format!("{} / (alt+enter) new line{} / (esc)ape", submit, dictate)
    };
    Paragraph::new(Span::styled(legend, dim_italic())).render(chunks[7], buf);
}

fn render_completed<A: SessionApi>(app: &App<A>, area: Rect, buf: &mut Buffer) {
    let answered = app.controller.runtime().recorded();
    let lines = vec![
        Line::from(Span::styled(
            "Interview submitted",
            bold().fg(Color::Green),
        )),
        Line::default(),
        Line::from(format!(
            "{} of {} answers were received. You may close this window.",
            answered,
            app.controller.question_count()
        )),
        Line::default(),
        Line::from(Span::styled("(esc)ape", dim_italic())),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(centered(area, 70, 7), buf);
}

fn render_closed<A: SessionApi>(app: &App<A>, area: Rect, buf: &mut Buffer) {
    let inner = frame(area);
    let mut lines = vec![Line::from(Span::styled(
        "This interview has already been submitted and can no longer be taken.",
        warning_style(),
    ))];

    if let Some(view) = app.controller.submitted_view() {
        lines.push(Line::from(Span::styled(
            format!("{} ({})", view.title, view.status),
            bold(),
        )));
        lines.push(Line::default());
        for (i, (question, answer)) in view.entries.iter().enumerate() {
            lines.push(Line::from(Span::styled(
                format!("{}. {}", i + 1, question),
                bold(),
            )));
            lines.push(Line::from(match answer {
                Some(text) if !text.is_empty() => text.clone(),
                Some(_) => "(no answer)".to_string(),
                None => "(answer not shown)".to_string(),
            }));
            lines.push(Line::default());
        }
    }
    lines.push(Line::from(Span::styled("(esc)ape", dim_italic())));

    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Read only"))
        .render(inner, buf);
}

fn render_leave_prompt(area: Rect, buf: &mut Buffer) {
    let popup = centered(area, 56, 5);
    Clear.render(popup, buf);
    Paragraph::new(vec![
        Line::from(Span::styled(
            "Leave the interview? Unsubmitted answers are lost.",
            warning_style(),
        )),
        Line::default(),
        Line::from("(y) leave / any other key to stay"),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).title("Leave"))
    .render(popup, buf);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect::new(
        area.x + (area.width - w) / 2,
        area.y + (area.height - h) / 2,
        w,
        h,
    )
}
