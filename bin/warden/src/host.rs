//! Executes parsed commands against the security manager.

use serde::Serialize;
use warden_identity::{
    AnonymousSession, AuthenticationRequest, CallbackRequest, Session, SessionCloseRequest,
    SessionId,
};
use warden_security::SecurityManager;

use crate::command::{Command, HELP};

/// What the command loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Print(String),
    Quit,
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("{{\"error\": \"{err}\"}}"))
}

/// Runs one command.
pub async fn execute(manager: &SecurityManager, command: Command) -> Outcome {
    let output = match command {
        Command::Auth {
            resource_id,
            parameters,
        } => {
            let mut request = AuthenticationRequest::new(resource_id);
            request.parameters = parameters;
            json(&manager.authenticate(request).await)
        }
        Command::Revoke {
            session_id,
            parameters,
        } => {
            let mut request = SessionCloseRequest::new(session_id);
            request.parameters = parameters;
            json(&manager.revoke(request).await)
        }
        Command::Callback {
            provider_id,
            parameters,
        } => {
            let mut request = CallbackRequest::new();
            request.parameters = parameters;
            json(&manager.callback(&provider_id, request).await)
        }
        Command::Authorize { resource_id, roles } => {
            let session: Session =
                AnonymousSession::new(SessionId::generate(), roles.into_iter().collect()).into();
            format!("{:?}", manager.authorize(&resource_id, &session))
        }
        Command::Resource {
            resource_type,
            resource_id,
            permissions,
        } => {
            manager.add_resource(resource_type, &resource_id, permissions);
            format!("registered {resource_type} {resource_id}")
        }
        Command::Reload => {
            manager.load().await;
            format!("{} providers loaded", manager.get_providers().len())
        }
        Command::Profiles => json(&manager.get_profiles()),
        Command::Providers => {
            let providers = manager.get_providers();
            let ids: Vec<&str> = providers.iter().map(|p| p.id()).collect();
            json(&ids)
        }
        Command::Help => HELP.to_string(),
        Command::Quit => return Outcome::Quit,
    };
    Outcome::Print(output)
}
