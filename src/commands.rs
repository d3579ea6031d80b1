//! Command Surface
//!
//! Maps the two external trigger sources onto agent actions:
//!
//! - **Chat**: the four fixed commands `guard`, `stop`, `follow me`, and
//!   `stay` drive the sentry mode machine; everything else is logged.
//! - **Console**: lines prefixed with `//` are forwarded to the server
//!   as slash-commands, anything else is sent verbatim as chat.
//!
//! Acknowledgments are best-effort; a failed send is logged, never
//! retried.

use crate::behaviors::sentry::Sentry;
use crate::client::{EntityId, Vec3};
use crate::session::Session;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Console lines starting with this go to the server as slash-commands.
pub const CONSOLE_COMMAND_PREFIX: &str = "//";

const ACK_START: &str = "I will!";
const ACK_STOP: &str = "I will stop!";

/// The chat commands the agent understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    Guard,
    Stop,
    FollowMe,
    Stay,
}

/// Parse a chat message into a command, if it is one.
pub fn parse_chat_command(text: &str) -> Option<ChatCommand> {
    match text.trim() {
        "guard" => Some(ChatCommand::Guard),
        "stop" => Some(ChatCommand::Stop),
        "follow me" => Some(ChatCommand::FollowMe),
        "stay" => Some(ChatCommand::Stay),
        _ => None,
    }
}

/// Handle an incoming chat message: log it, and if it is a command and
/// this agent runs the sentry module, execute the transition.
pub async fn handle_chat(
    session: &Arc<Session>,
    sentry: Option<&Arc<Sentry>>,
    sender: &str,
    text: &str,
) {
    if sender == session.config.username {
        return;
    }
    info!("[{sender}] {text}");

    let Some(command) = parse_chat_command(text) else {
        return;
    };
    let Some(sentry) = sentry else {
        debug!(
            "Ignoring '{text}' from {sender}: no sentry module in the {} profile",
            session.config.profile.as_str()
        );
        return;
    };

    match command {
        ChatCommand::Guard => {
            let Some(anchor) = sender_position(session, sender) else {
                debug!("Cannot guard for {sender}: no resolvable position");
                return;
            };
            sentry.command_guard(session, anchor);
            ack(session, ACK_START).await;
        }
        ChatCommand::Stop => {
            sentry.command_stop(session);
            ack(session, ACK_STOP).await;
        }
        ChatCommand::FollowMe => {
            let Some(target) = sender_entity(session, sender) else {
                debug!("Cannot follow {sender}: no resolvable entity");
                return;
            };
            sentry.command_follow(session, target);
            ack(session, ACK_START).await;
        }
        ChatCommand::Stay => {
            sentry.command_stay(session);
            ack(session, ACK_START).await;
        }
    }
}

/// Route one console line to the server.
pub async fn handle_console_line(session: &Session, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let result = if let Some(rest) = line.strip_prefix(CONSOLE_COMMAND_PREFIX) {
        session.actions.send_chat(&format!("/{rest}")).await
    } else {
        session.actions.send_chat(line).await
    };
    if let Err(e) = result {
        warn!("Failed to send console message: {e}");
    }
}

fn sender_position(session: &Session, sender: &str) -> Option<Vec3> {
    session
        .actions
        .query_players()
        .iter()
        .find(|p| p.username == sender)
        .and_then(|p| p.position)
}

fn sender_entity(session: &Session, sender: &str) -> Option<EntityId> {
    session
        .actions
        .query_players()
        .iter()
        .find(|p| p.username == sender)
        .and_then(|p| p.entity_id)
}

async fn ack(session: &Session, text: &str) {
    if let Err(e) = session.actions.send_chat(text).await {
        warn!("Failed to send acknowledgment: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::sentry::Mode;
    use crate::behaviors::BehaviorProfile;
    use crate::config::Config;
    use crate::sim::SimHarness;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(parse_chat_command("guard"), Some(ChatCommand::Guard));
        assert_eq!(parse_chat_command(" stop "), Some(ChatCommand::Stop));
        assert_eq!(parse_chat_command("follow me"), Some(ChatCommand::FollowMe));
        assert_eq!(parse_chat_command("stay"), Some(ChatCommand::Stay));
    }

    #[test]
    fn test_parse_rejects_everything_else() {
        assert_eq!(parse_chat_command("guard the gate"), None);
        assert_eq!(parse_chat_command("follow"), None);
        assert_eq!(parse_chat_command("hello"), None);
        assert_eq!(parse_chat_command(""), None);
    }

    fn sentry_harness() -> (SimHarness, Arc<Sentry>) {
        let mut config = Config::default();
        config.profile = BehaviorProfile::Sentry;
        let harness = SimHarness::new(Arc::new(config));
        harness
            .world
            .add_player("karin", 42, Vec3::new(3.0, 0.0, 3.0));
        harness.session.on_spawn().expect("spawn");
        let sentry = Sentry::start(&harness.session);
        (harness, sentry)
    }

    #[tokio::test]
    async fn test_guard_command_acknowledged() {
        let (harness, sentry) = sentry_harness();

        handle_chat(&harness.session, Some(&sentry), "karin", "guard").await;

        assert_eq!(sentry.mode(), Mode::Guarding);
        assert_eq!(sentry.guard_anchor(), Some(Vec3::new(3.0, 0.0, 3.0)));
        assert_eq!(harness.actions.chat_sent(), vec!["I will!".to_string()]);
    }

    #[tokio::test]
    async fn test_stop_command_acknowledged() {
        let (harness, sentry) = sentry_harness();
        handle_chat(&harness.session, Some(&sentry), "karin", "guard").await;

        handle_chat(&harness.session, Some(&sentry), "karin", "stop").await;

        assert_eq!(sentry.mode(), Mode::Patrolling);
        assert_eq!(
            harness.actions.chat_sent(),
            vec!["I will!".to_string(), "I will stop!".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_sender_position_ignored() {
        let (harness, sentry) = sentry_harness();

        handle_chat(&harness.session, Some(&sentry), "ghost", "guard").await;

        assert_eq!(sentry.mode(), Mode::Patrolling);
        assert!(harness.actions.chat_sent().is_empty());
    }

    #[tokio::test]
    async fn test_own_messages_ignored() {
        let (harness, sentry) = sentry_harness();
        let own_name = harness.session.config.username.clone();

        handle_chat(&harness.session, Some(&sentry), &own_name, "guard").await;

        assert_eq!(sentry.mode(), Mode::Patrolling);
    }

    #[tokio::test]
    async fn test_commands_without_sentry_are_noops() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.session.on_spawn().expect("spawn");

        handle_chat(&harness.session, None, "karin", "guard").await;

        assert!(harness.actions.chat_sent().is_empty());
    }

    #[tokio::test]
    async fn test_console_slash_command_routing() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.session.on_spawn().expect("spawn");

        handle_console_line(&harness.session, "//home set").await;
        handle_console_line(&harness.session, "hello there").await;
        handle_console_line(&harness.session, "   ").await;

        assert_eq!(
            harness.actions.chat_sent(),
            vec!["/home set".to_string(), "hello there".to_string()]
        );
    }
}
