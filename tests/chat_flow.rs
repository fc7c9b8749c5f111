use std::sync::Arc;
use std::time::Duration;

use symptom_agent::agent::SymptomAgent;
use symptom_agent::analyzer::analyze;
use symptom_agent::config::knowledge::LoadedKnowledge;
use symptom_agent::history::MemoryHistoryStore;
use symptom_agent::knowledge::{ builtin, Severity };
use symptom_agent::models::chat::Role;
use symptom_agent::response::{ generate, CLOSING, FALLBACK, GREETING };
use symptom_agent::session::{ ChatSession, SessionEvent };

#[test]
fn headache_and_fever_turn() {
    let kb = builtin::knowledge_base();
    let result = analyze(kb, "머리가 아프고 열이 나요");
    assert_eq!(result.matches.len(), 2);
    assert_eq!(result.severity, Severity::Mild);

    let content = generate(&result).content;
    assert!(content.contains("📊 종합 분석"));
    let warnings = format!(
        "{}\n\n{}",
        kb.get("두통").unwrap().warning,
        kb.get("발열").unwrap().warning
    );
    assert!(content.contains(&warnings));
    assert!(content.ends_with(CLOSING));
}

#[test]
fn unmatched_turn_returns_fallback_verbatim() {
    let result = analyze(builtin::knowledge_base(), "아무 문제 없어요");
    assert!(result.matches.is_empty());
    assert_eq!(generate(&result).content, FALLBACK);
}

#[test]
fn severe_headache_turn() {
    let kb = builtin::knowledge_base();
    let result = analyze(kb, "매우 심한 두통");
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].name, "두통");
    assert_eq!(result.severity, Severity::Severe);
    assert!(
        generate(&result).content.contains(kb.get("두통").unwrap().severity_advice.severe.as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn session_round_trip() {
    let agent = Arc::new(
        SymptomAgent::with_parts(
            LoadedKnowledge::builtin(),
            Arc::new(MemoryHistoryStore::new()),
            Duration::from_millis(500)
        )
    );
    let (mut session, mut events, conversation) = ChatSession::open(
        agent,
        "integration",
        Duration::from_millis(20)
    ).await.unwrap();
    assert_eq!(conversation.messages[0].content, GREETING);

    session.submit("매우 심한 두통").await.unwrap();

    let mut bot_reply = None;
    let mut revealed = String::new();
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Appended(message) if message.role == Role::Bot => {
                bot_reply = Some(message.content);
            }
            SessionEvent::Reveal(ch) => revealed.push(ch),
            SessionEvent::RevealComplete => {
                break;
            }
            _ => {}
        }
    }

    let bot_reply = bot_reply.expect("bot reply appended");
    assert_eq!(revealed, bot_reply);

    let history = session.history().await.unwrap();
    let roles: Vec<Role> = history.messages
        .iter()
        .map(|m| m.role)
        .collect();
    assert_eq!(roles, vec![Role::Bot, Role::User, Role::Bot]);
    assert_eq!(history.messages[2].content, bot_reply);
}
