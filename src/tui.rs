use crate::conversation::Role;
use crate::provider::{ModelClient, ModelError, ModelReply};
use crate::turn::{PendingTurn, Session, Submission, TurnOutcome, TurnState};
use anyhow::Context;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;

type ReplyResult = Result<ModelReply, ModelError>;

/// View state that is not part of the conversation.
struct View {
    input: String,
    notice: Option<String>,
    error: Option<String>,
    in_flight: Option<PendingTurn>,
}

pub async fn run_tui(title: &str, client: Arc<dyn ModelClient>, mut session: Session) -> anyhow::Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alt screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel::<Event>();
    std::thread::spawn(move || {
        while let Ok(ev) = crossterm::event::read() {
            if ev_tx.send(ev).is_err() {
                break;
            }
        }
    });

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ReplyResult>();

    let mut view = View {
        input: String::new(),
        notice: Some("Type a message and press Enter. /quit or Esc to exit.".to_string()),
        error: None,
        in_flight: None,
    };

    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(33));

    let res = loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = draw(&mut terminal, title, client.name(), &session, &view) {
                    break Err(e);
                }
            }
            Some(ev) = ev_rx.recv() => {
                if let Event::Key(key) = ev {
                    if handle_key(key, &mut view, &mut session, &client, &reply_tx) {
                        break Ok(());
                    }
                }
            }
            Some(result) = reply_rx.recv() => {
                if let Some(pending) = view.in_flight.take() {
                    if let TurnOutcome::Failed(e) = session.complete_turn(pending, result) {
                        view.error = Some(format!("Error: {e}"));
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

/// Returns true when the user asked to quit.
fn handle_key(
    key: KeyEvent,
    view: &mut View,
    session: &mut Session,
    client: &Arc<dyn ModelClient>,
    reply_tx: &mpsc::UnboundedSender<ReplyResult>,
) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    match key.code {
        KeyCode::Esc => return true,
        KeyCode::Char(c) => view.input.push(c),
        KeyCode::Backspace => {
            view.input.pop();
        }
        KeyCode::Enter => {
            let msg = std::mem::take(&mut view.input);
            if msg.trim() == "/quit" {
                return true;
            }

            match session.begin_turn(&msg) {
                Submission::Ignored => {}
                Submission::Busy => {
                    view.input = msg;
                    view.notice = Some("(waiting for the reply; try again when it arrives)".to_string());
                }
                Submission::Started(pending) => {
                    view.notice = None;
                    view.error = None;

                    let call = client.generate(pending.request().clone());
                    view.in_flight = Some(pending);

                    let tx = reply_tx.clone();
                    tokio::spawn(async move {
                        let _ = tx.send(call.await);
                    });
                }
            }
        }
        _ => {}
    }

    false
}

fn draw(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    title: &str,
    provider: &str,
    session: &Session,
    view: &View,
) -> anyhow::Result<()> {
    terminal.draw(|f| {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(3)])
            .split(f.area());

        let mut text = Text::default();
        if let Some(n) = &view.notice {
            text.lines.push(Line::styled(n.clone(), Style::default().add_modifier(Modifier::ITALIC)));
            text.lines.push(Line::from(""));
        }
        for m in session.transcript() {
            let style = match m.role() {
                Role::User => Style::default().add_modifier(Modifier::BOLD),
                Role::Assistant => Style::default(),
            };
            text.lines.push(Line::styled(format!("{}: ", m.role().as_str()), style));
            text.lines.extend(Text::from(m.content().to_string()).lines);
            for src in m.sources() {
                text.lines.push(Line::styled(
                    format!("  [{}] {}", src.title, src.uri),
                    Style::default().add_modifier(Modifier::DIM),
                ));
            }
            text.lines.push(Line::from(""));
        }
        if session.state() == TurnState::AwaitingResponse {
            text.lines.push(Line::styled("assistant: …", Style::default().add_modifier(Modifier::DIM)));
        }
        if let Some(e) = &view.error {
            text.lines.push(Line::styled(e.clone(), Style::default().add_modifier(Modifier::BOLD)));
        }

        let chat = Paragraph::new(text).wrap(Wrap { trim: false });
        let scroll = bottom_scroll(&chat, chunks[0]);
        let chat = chat
            .block(Block::default().borders(Borders::ALL).title(format!("{title} ({provider})")))
            .scroll((scroll, 0));

        let input_w = Paragraph::new(view.input.clone())
            .block(Block::default().borders(Borders::ALL).title("input"));

        f.render_widget(chat, chunks[0]);
        f.render_widget(input_w, chunks[1]);

        let x = chunks[1].x + 1 + view.input.chars().count() as u16;
        let y = chunks[1].y + 1;
        f.set_cursor_position((x.min(chunks[1].x + chunks[1].width.saturating_sub(2)), y));
    })?;
    Ok(())
}

/// Rows to skip so the last wrapped line of `chat` (no block yet) sits at
/// the bottom of the bordered `area`.
fn bottom_scroll(chat: &Paragraph<'_>, area: Rect) -> u16 {
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2) as usize;
    let rows = chat.line_count(inner_width).saturating_sub(inner_height);
    u16::try_from(rows).unwrap_or(u16::MAX)
}
