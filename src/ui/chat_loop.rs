//! Main chat event loop and UI rendering
//!
//! This module contains the event loop that polls terminal input, drains
//! settled call outcomes, and redraws the transcript and input areas. It
//! is the single mutator of the conversation: spawned call tasks only
//! report back over the dispatcher channel.

use std::{error::Error, io, sync::Arc, time::Duration};

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
        MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::core::chat_call::{
    CallDispatcher, ChatCallService, HttpTransport, RetryPolicy,
};
use crate::core::conversation::ConversationController;
use crate::utils::logging::LoggingState;

/// Height of the bordered input area at the bottom of the screen.
const INPUT_AREA_HEIGHT: u16 = 3;

/// Everything the chat loop needs, resolved from CLI flags, config file,
/// and environment before the terminal is touched.
pub struct ChatSetup {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub retry_policy: RetryPolicy,
    pub log_file: Option<String>,
}

struct ChatUi {
    controller: ConversationController,
    logging: LoggingState,
    model: String,
    scroll_offset: u16,
    auto_scroll: bool,
}

impl ChatUi {
    fn build_display_lines(&self) -> Vec<Line<'_>> {
        let mut lines = Vec::new();

        if self.controller.messages().is_empty() {
            lines.push(Line::from(Span::styled(
                "Welcome!",
                Style::default().fg(Color::DarkGray),
            )));
            lines.push(Line::from(Span::styled(
                "Start chatting by typing below.",
                Style::default().fg(Color::DarkGray),
            )));
            return lines;
        }

        for msg in self.controller.messages() {
            if msg.is_user() {
                lines.push(Line::from(vec![
                    Span::styled(
                        "You: ",
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(&msg.content, Style::default().fg(Color::Cyan)),
                ]));
                lines.push(Line::from(""));
            } else {
                for content_line in msg.content.lines() {
                    if content_line.trim().is_empty() {
                        lines.push(Line::from(""));
                    } else {
                        lines.push(Line::from(Span::styled(
                            content_line,
                            Style::default().fg(Color::White),
                        )));
                    }
                }
                lines.push(Line::from(""));
            }
        }

        if self.controller.is_busy() {
            lines.push(Line::from(Span::styled(
                "...",
                Style::default().fg(Color::DarkGray),
            )));
        }

        lines
    }

    fn calculate_max_scroll_offset(&self, available_height: u16) -> u16 {
        let total_lines = self.build_display_lines().len() as u16;
        total_lines.saturating_sub(available_height)
    }

    fn scroll_to_bottom(&mut self, available_height: u16) {
        self.scroll_offset = self.calculate_max_scroll_offset(available_height);
    }

    fn log_last_message(&self) {
        if let Some(msg) = self.controller.messages().back() {
            if let Err(e) = self.logging.log_transcript_message(msg) {
                tracing::warn!("failed to log transcript message: {e}");
            }
        }
    }
}

fn available_chat_height(terminal_height: u16) -> u16 {
    // Input area plus the transcript title line
    terminal_height
        .saturating_sub(INPUT_AREA_HEIGHT)
        .saturating_sub(1)
}

fn ui(f: &mut Frame, app: &ChatUi) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(INPUT_AREA_HEIGHT)])
        .split(f.area());

    let lines = app.build_display_lines();

    let available_height = chunks[0].height.saturating_sub(1);
    let total_lines = lines.len() as u16;
    let max_offset = total_lines.saturating_sub(available_height);
    let scroll_offset = app.scroll_offset.min(max_offset);

    let messages_paragraph = Paragraph::new(lines)
        .block(Block::default().title(format!("Chat - {}", app.model)))
        .wrap(Wrap { trim: true })
        .scroll((scroll_offset, 0));

    f.render_widget(messages_paragraph, chunks[0]);

    let busy = app.controller.is_busy();
    let input_style = if busy {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Yellow)
    };
    let input_title = if busy {
        "Waiting for reply..."
    } else {
        "Type your message (Enter to send, Ctrl+C to quit)"
    };

    let input = Paragraph::new(app.controller.pending_input())
        .style(input_style)
        .block(Block::default().borders(Borders::ALL).title(input_title))
        .wrap(Wrap { trim: true });

    f.render_widget(input, chunks[1]);

    if !busy {
        f.set_cursor_position((
            chunks[1].x + app.controller.pending_input().chars().count() as u16 + 1,
            chunks[1].y + 1,
        ));
    }
}

pub async fn run_chat(setup: ChatSetup) -> Result<(), Box<dyn Error>> {
    let logging = LoggingState::new(setup.log_file.clone())?;

    let transport = HttpTransport::new(
        reqwest::Client::new(),
        &setup.base_url,
        &setup.model,
        setup.api_key.clone(),
    );
    let service = Arc::new(ChatCallService::new(transport, setup.retry_policy));
    let (dispatcher, mut outcomes) = CallDispatcher::new();

    let mut app = ChatUi {
        controller: ConversationController::new(),
        logging,
        model: setup.model.clone(),
        scroll_offset: 0,
        auto_scroll: true,
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = loop {
        terminal.draw(|f| ui(f, &app))?;

        let terminal_height = terminal.size().map(|s| s.height).unwrap_or_default();
        let available_height = available_chat_height(terminal_height);

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        break Ok(());
                    }
                    KeyCode::Enter => {
                        // The controller re-guards, but the boundary also
                        // rejects input while a call is in flight
                        if app.controller.is_busy() {
                            continue;
                        }
                        if let Some(submission) = app.controller.submit() {
                            app.log_last_message();
                            dispatcher.spawn_call(
                                service.clone(),
                                submission.request_id,
                                submission.prompt,
                            );
                            if app.auto_scroll {
                                app.scroll_to_bottom(available_height);
                            }
                        }
                    }
                    KeyCode::Char(c) => {
                        if !app.controller.is_busy() {
                            app.controller.push_input_char(c);
                        }
                    }
                    KeyCode::Backspace => {
                        if !app.controller.is_busy() {
                            app.controller.backspace_input();
                        }
                    }
                    KeyCode::Up => {
                        app.auto_scroll = false;
                        app.scroll_offset = app.scroll_offset.saturating_sub(1);
                    }
                    KeyCode::Down => {
                        let max_scroll = app.calculate_max_scroll_offset(available_height);
                        app.scroll_offset = app.scroll_offset.saturating_add(1).min(max_scroll);
                        if app.scroll_offset >= max_scroll {
                            app.auto_scroll = true;
                        }
                    }
                    _ => {}
                },
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => {
                        app.auto_scroll = false;
                        app.scroll_offset = app.scroll_offset.saturating_sub(3);
                    }
                    MouseEventKind::ScrollDown => {
                        let max_scroll = app.calculate_max_scroll_offset(available_height);
                        app.scroll_offset = app.scroll_offset.saturating_add(3).min(max_scroll);
                        if app.scroll_offset >= max_scroll {
                            app.auto_scroll = true;
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        // Drain settled calls; each settlement appends the reply (or an
        // inline error) and re-enables the input
        let mut settled_any = false;
        while let Ok((request_id, outcome)) = outcomes.try_recv() {
            app.controller.settle(request_id, outcome);
            app.log_last_message();
            settled_any = true;
        }
        if settled_any && app.auto_scroll {
            app.scroll_to_bottom(available_height);
        }
    };

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> ChatUi {
        ChatUi {
            controller: ConversationController::new(),
            logging: LoggingState::new(None).unwrap(),
            model: "gemini-1.5-flash".to_string(),
            scroll_offset: 0,
            auto_scroll: true,
        }
    }

    fn push_pair(app: &mut ChatUi, prompt: &str, reply: &str) {
        for c in prompt.chars() {
            app.controller.push_input_char(c);
        }
        let submission = app.controller.submit().unwrap();
        app.controller.settle(submission.request_id, Ok(reply.to_string()));
    }

    #[test]
    fn empty_transcript_shows_welcome_banner() {
        let app = test_app();
        let lines = app.build_display_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].spans[0].content, "Welcome!");
    }

    #[test]
    fn user_lines_carry_prefix_and_assistant_lines_do_not() {
        let mut app = test_app();
        push_pair(&mut app, "hello", "hi\nthere");

        let lines = app.build_display_lines();
        // user line, spacer, two assistant lines, spacer
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].spans[0].content, "You: ");
        assert_eq!(lines[2].spans[0].content, "hi");
        assert_eq!(lines[3].spans[0].content, "there");
    }

    #[test]
    fn busy_conversation_renders_thinking_indicator() {
        let mut app = test_app();
        for c in "hello".chars() {
            app.controller.push_input_char(c);
        }
        app.controller.submit().unwrap();

        let lines = app.build_display_lines();
        assert_eq!(lines.last().unwrap().spans[0].content, "...");
    }

    #[test]
    fn scroll_offset_is_clamped_to_content() {
        let mut app = test_app();
        for i in 0..10 {
            push_pair(&mut app, &format!("q{i}"), &format!("a{i}"));
        }

        let max = app.calculate_max_scroll_offset(5);
        assert!(max > 0);
        // Short viewport, tall transcript: scrolling to bottom hits the max
        app.scroll_to_bottom(5);
        assert_eq!(app.scroll_offset, max);
        // A taller viewport than content means no scrolling at all
        assert_eq!(app.calculate_max_scroll_offset(u16::MAX), 0);
    }
}
