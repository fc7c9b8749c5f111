use crate::agent::SymptomAgent;
use crate::history::format_transcript;
use crate::models::chat::{ ChatMessage, Role };
use crate::reveal::Typewriter;
use crate::session::{ ChatSession, SessionError, SessionEvent };

use log::info;
use std::error::Error;
use std::io::{ self, Write };
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{ AsyncBufReadExt, BufReader };
use uuid::Uuid;

const TYPING_PLACEHOLDER: &str = "입력중...";
const BUSY_NOTICE: &str = "(답변을 준비하고 있어요. 잠시만 기다려 주세요.)";
const INPUT_HINT: &str = "여러 증상을 자세히 설명해주세요... (/help)";
const HELP: &str = "/history  대화 기록 보기\n/clear    대화 초기화\n/quit     종료";
const CLEAR_LINE: &str = "\r\x1b[2K";

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Say(&'a str),
    History,
    Clear,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Command<'_> {
    match line.trim() {
        "/quit" | "/exit" => Command::Quit,
        "/history" => Command::History,
        "/clear" => Command::Clear,
        "/help" => Command::Help,
        _ => Command::Say(line),
    }
}

/// Renders session events onto a line-oriented terminal.
pub struct TerminalView<W: Write> {
    out: W,
    revealing: Option<Typewriter>,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out, revealing: None }
    }

    pub fn print_message(&mut self, message: &ChatMessage) -> io::Result<()> {
        writeln!(self.out, "{}", labelled(message.role, &message.content))?;
        self.out.flush()
    }

    pub fn print_transcript(&mut self, transcript: &str) -> io::Result<()> {
        write!(self.out, "{}", transcript)?;
        self.out.flush()
    }

    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()
    }

    pub fn render(&mut self, event: &SessionEvent) -> io::Result<()> {
        match event {
            // The terminal already echoed what the user typed.
            SessionEvent::Appended(message) if message.role == Role::User => {}
            SessionEvent::Appended(message) => {
                write!(self.out, "{}B: ", CLEAR_LINE)?;
                self.revealing = Some(Typewriter::new(message.content.clone()));
            }
            SessionEvent::Typing => {
                write!(self.out, "B: {}", TYPING_PLACEHOLDER)?;
            }
            SessionEvent::Reveal(ch) => {
                if let Some(typewriter) = self.revealing.as_mut() {
                    typewriter.advance();
                }
                write!(self.out, "{}", ch)?;
            }
            SessionEvent::RevealComplete => {
                self.revealing = None;
                writeln!(self.out)?;
            }
            SessionEvent::RevealCancelled => {
                if let Some(mut typewriter) = self.revealing.take() {
                    write!(self.out, "{}", typewriter.finish())?;
                }
                writeln!(self.out)?;
            }
            SessionEvent::Cleared(conversation) => {
                self.revealing = None;
                write!(self.out, "{}", CLEAR_LINE)?;
                for message in &conversation.messages {
                    writeln!(self.out, "{}", labelled(message.role, &message.content))?;
                }
            }
            SessionEvent::Failed(message) => {
                writeln!(self.out, "{}오류: {}", CLEAR_LINE, message)?;
            }
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn labelled(role: Role, content: &str) -> String {
    match role {
        Role::User => format!("U: {}", content),
        Role::Bot => format!("B: {}", content),
    }
}

/// Runs the interactive chat on stdin/stdout until `/quit`, EOF or Ctrl-C.
pub async fn run_chat(
    agent: Arc<SymptomAgent>,
    reveal_interval: Duration
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let conversation_id = Uuid::new_v4().to_string();
    let (mut session, mut events, conversation) = ChatSession::open(
        Arc::clone(&agent),
        conversation_id.clone(),
        reveal_interval
    ).await?;
    info!("Terminal chat started (Conv ID: {})", conversation_id);

    let mut view = TerminalView::new(io::stdout());
    for message in &conversation.messages {
        view.print_message(message)?;
    }
    view.notice(INPUT_HINT)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => break,
                };
                match parse_command(&line) {
                    Command::Quit => break,
                    Command::Help => view.notice(HELP)?,
                    Command::History => {
                        let conversation = session.history().await?;
                        view.print_transcript(&format_transcript(&conversation))?;
                    }
                    Command::Clear => {
                        session.clear().await?;
                    }
                    Command::Say(text) => match session.submit(text).await {
                        Ok(_) => {}
                        Err(SessionError::Busy) => view.notice(BUSY_NOTICE)?,
                        Err(e) => return Err(e.into()),
                    },
                }
            }
            Some(event) = events.recv() => view.render(&event)?,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(session);
    agent.close_conversation(&conversation_id).await?;
    info!("Terminal chat ended (Conv ID: {})", conversation_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Conversation;

    fn rendered(events: &[SessionEvent]) -> String {
        let mut view = TerminalView::new(Vec::new());
        for event in events {
            view.render(event).unwrap();
        }
        String::from_utf8(view.into_inner()).unwrap()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command(" /history "), Command::History);
        assert_eq!(parse_command("/clear"), Command::Clear);
        assert_eq!(parse_command("머리가 아파요"), Command::Say("머리가 아파요"));
    }

    #[test]
    fn completed_reveal_prints_whole_reply() {
        let output = rendered(
            &[
                SessionEvent::Appended(ChatMessage::user("기침")),
                SessionEvent::Typing,
                SessionEvent::Appended(ChatMessage::bot("네")),
                SessionEvent::Reveal('네'),
                SessionEvent::RevealComplete,
            ]
        );
        assert_eq!(output, format!("B: {}{}B: 네\n", TYPING_PLACEHOLDER, CLEAR_LINE));
    }

    #[test]
    fn clear_while_thinking_replaces_placeholder() {
        let conversation = Conversation {
            id: "c".into(),
            messages: vec![ChatMessage::bot("안녕하세요")],
        };
        let output = rendered(
            &[
                SessionEvent::Appended(ChatMessage::user("기침")),
                SessionEvent::Typing,
                SessionEvent::Cleared(conversation),
            ]
        );
        assert_eq!(output, format!("B: {}{}B: 안녕하세요\n", TYPING_PLACEHOLDER, CLEAR_LINE));
    }

    #[test]
    fn cancelled_reveal_flushes_rest() {
        let output = rendered(
            &[
                SessionEvent::Appended(ChatMessage::bot("기침이요")),
                SessionEvent::Reveal('기'),
                SessionEvent::RevealCancelled,
            ]
        );
        assert!(output.ends_with("B: 기침이요\n"));
    }
}
