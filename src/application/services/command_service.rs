use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use super::command_table::CommandTable;
use crate::application::errors::CommandError;
use crate::application::messaging::parser::double_quoted_text;
use crate::domain::entities::{Command, MatchStrategy};

pub const ADD_COMMAND: &str = "/addcmd";
pub const DELETE_COMMAND: &str = "/delcmd";
pub const LIST_COMMAND: &str = "/cmdlist";
pub const BACKUP_COMMAND: &str = "/cmdbackup";

pub const USAGE: &str = "
    /addcmd {command} {message} [start|match|startonly]
    Matching strategies:
      start: Match command at the start of the message (followed by a message or not)
      match: Match command anywhere in the message
      startonly: Match the whole message
    /delcmd {command}
    /cmdlist
    /cmdbackup
";

/// One chat message as seen by the command service
#[derive(Debug, Clone)]
pub struct CommandRequest<'a> {
    pub scope: &'a str,
    pub scope_name: &'a str,
    pub text: &'a str,
    pub authorized: bool,
}

/// What to send back for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Reply to the author
    Reply(String),
    /// Plain message to the channel
    Send(String),
    /// File to the channel
    File { name: String, data: Vec<u8> },
    Ignored,
}

/// Service for managing and matching custom commands
pub struct CommandService {
    table: Arc<CommandTable>,
}

impl CommandService {
    pub fn new(table: Arc<CommandTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<CommandTable> {
        &self.table
    }

    pub async fn handle(&self, request: &CommandRequest<'_>) -> CommandOutcome {
        let tokens: Vec<&str> = request.text.split_whitespace().collect();

        let result = match tokens.first().copied() {
            Some(ADD_COMMAND) => self.add(request, &tokens).await.map(CommandOutcome::Reply),
            Some(DELETE_COMMAND) => self.delete(request, &tokens).await.map(CommandOutcome::Reply),
            Some(LIST_COMMAND) => self.list(request.scope).await.map(CommandOutcome::Reply),
            Some(BACKUP_COMMAND) => self.backup(request).await,
            _ => self.dispatch(request).await,
        };

        match result {
            Ok(outcome) => outcome,
            // unauthorized requests get no answer at all
            Err(CommandError::Unauthorized) => CommandOutcome::Ignored,
            Err(CommandError::MissingName) if tokens.first() == Some(&ADD_COMMAND) => {
                CommandOutcome::Reply(format!(
                    "Missing command name. Usage: /addcmd {} \"Display something\". \
                     The double quotes are optional if the content is only one word.",
                    bold("commandname")
                ))
            }
            Err(e) => CommandOutcome::Reply(describe(&e)),
        }
    }

    async fn add(&self, request: &CommandRequest<'_>, tokens: &[&str]) -> Result<String, CommandError> {
        if !request.authorized {
            return Err(CommandError::Unauthorized);
        }
        let name = tokens.get(1).ok_or(CommandError::MissingName)?;
        let content = double_quoted_text(tokens, 2)?;

        let matching = match tokens.get(content.next) {
            Some(token) => token.parse::<MatchStrategy>()?,
            None => MatchStrategy::default(),
        };

        let command = Command::new(request.scope, *name, content.text, matching);
        self.table.add(command.clone()).await?;
        info!(guild = request.scope, command = %command.name, matching = %matching, "Registered command");

        Ok(format!(
            "\nRegistered command: {}\nUsage: {}\nMatching strategy: {}\nCommand content: {}",
            bold(&command.name),
            bold(&command.name),
            bold(matching.as_str()),
            bold(&command.content)
        ))
    }

    async fn delete(&self, request: &CommandRequest<'_>, tokens: &[&str]) -> Result<String, CommandError> {
        if !request.authorized {
            return Err(CommandError::Unauthorized);
        }
        let name = tokens.get(1).ok_or(CommandError::MissingName)?;

        self.table.remove(request.scope, name).await?;
        info!(guild = request.scope, command = %name, "Removed command");
        Ok(format!("Command {} removed", bold(name)))
    }

    async fn list(&self, scope: &str) -> Result<String, CommandError> {
        let commands = self.table.commands(scope).await?;
        if commands.is_empty() {
            return Ok(format!(
                "No command registered. Register your first command by using {}",
                bold(ADD_COMMAND)
            ));
        }

        let mut reply = format!(
            "{}{}\n",
            commands.len(),
            if commands.len() > 1 { " commands are available:" } else { " command is available:" }
        );
        for entry in commands.iter() {
            reply.push_str(&bold(&entry.command.name));
            reply.push('\n');
        }
        Ok(reply)
    }

    async fn backup(&self, request: &CommandRequest<'_>) -> Result<CommandOutcome, CommandError> {
        let commands: Vec<Command> = self
            .table
            .load(request.scope)
            .await?
            .iter()
            .map(|entry| entry.command.clone())
            .collect();
        let data = serde_json::to_vec_pretty(&commands)
            .map_err(|e| crate::application::errors::StorageError::Serialization(e.to_string()))?;

        Ok(CommandOutcome::File {
            name: format!(
                "cmd-backup-{}-{}.json",
                request.scope_name,
                Utc::now().format("%Y%m%d-%H%M%S")
            ),
            data,
        })
    }

    /// Passive matching of ordinary messages
    async fn dispatch(&self, request: &CommandRequest<'_>) -> Result<CommandOutcome, CommandError> {
        Ok(match self.table.find_match(request.scope, request.text).await? {
            Some(command) => CommandOutcome::Send(command.content),
            None => CommandOutcome::Ignored,
        })
    }
}

fn bold(text: &str) -> String {
    format!("**{}**", text)
}

fn describe(error: &CommandError) -> String {
    match error {
        CommandError::MissingName => "Missing command name".to_string(),
        CommandError::MissingContent => "Missing command content".to_string(),
        CommandError::UnterminatedQuote => "Missing double quote".to_string(),
        CommandError::InvalidStrategy(_) => {
            "Wrong matching strategy: must be start, startonly or match".to_string()
        }
        CommandError::AlreadyExists(name) => format!("Command {} already exists.", bold(name)),
        CommandError::NotFound(name) => format!("Command {} does not exist", bold(name)),
        CommandError::Unauthorized => "Permission denied".to_string(),
        CommandError::Storage(e) => {
            error!(error = %e, "Command store failure");
            "The command store is unavailable, try again later".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::{Collection, Filter};
    use crate::infrastructure::storage::MemoryCollection;

    fn service() -> (CommandService, Arc<MemoryCollection>) {
        let store = Arc::new(MemoryCollection::new());
        let table = Arc::new(CommandTable::new(store.clone()));
        (CommandService::new(table), store)
    }

    fn admin(text: &str) -> CommandRequest<'_> {
        CommandRequest { scope: "g1", scope_name: "guild", text, authorized: true }
    }

    fn member(text: &str) -> CommandRequest<'_> {
        CommandRequest { authorized: false, ..admin(text) }
    }

    fn reply_text(outcome: CommandOutcome) -> String {
        match outcome {
            CommandOutcome::Reply(text) => text,
            other => panic!("expected reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (service, _) = service();

        let confirm = reply_text(service.handle(&admin("/addcmd ping pong start")).await);
        assert!(confirm.contains("Registered command: **ping**"));
        assert!(confirm.contains("Matching strategy: **start**"));
        assert!(confirm.contains("Command content: **pong**"));

        let list = reply_text(service.handle(&member("/cmdlist")).await);
        assert_eq!(list, "1 command is available:\n**ping**\n");

        assert_eq!(service.handle(&member("ping")).await, CommandOutcome::Send("pong".into()));
        assert_eq!(service.handle(&member("pingpong")).await, CommandOutcome::Ignored);

        let removed = reply_text(service.handle(&admin("/delcmd ping")).await);
        assert_eq!(removed, "Command **ping** removed");
        assert_eq!(service.handle(&member("ping")).await, CommandOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_quoted_content_and_strategy() {
        let (service, _) = service();
        service.handle(&admin("/addcmd hi \"hello there friend\" match")).await;

        assert_eq!(
            service.handle(&member("well hi")).await,
            CommandOutcome::Send("hello there friend".into())
        );
    }

    #[tokio::test]
    async fn test_protocol_errors_are_replies() {
        let (service, store) = service();

        let missing = reply_text(service.handle(&admin("/addcmd")).await);
        assert!(missing.starts_with("Missing command name. Usage: /addcmd **commandname**"));
        assert_eq!(reply_text(service.handle(&admin("/addcmd ping")).await), "Missing command content");
        assert_eq!(
            reply_text(service.handle(&admin("/addcmd ping \"pong")).await),
            "Missing double quote"
        );
        assert_eq!(
            reply_text(service.handle(&admin("/addcmd ping pong begin")).await),
            "Wrong matching strategy: must be start, startonly or match"
        );
        assert_eq!(reply_text(service.handle(&admin("/delcmd")).await), "Missing command name");
        assert_eq!(
            reply_text(service.handle(&admin("/delcmd nope")).await),
            "Command **nope** does not exist"
        );
        assert_eq!(store.count(&Filter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_reply() {
        let (service, _) = service();
        service.handle(&admin("/addcmd ping pong")).await;
        assert_eq!(
            reply_text(service.handle(&admin("/addcmd ping other")).await),
            "Command **ping** already exists."
        );
        assert_eq!(service.handle(&member("ping")).await, CommandOutcome::Send("pong".into()));
    }

    #[tokio::test]
    async fn test_unauthorized_requests_are_ignored() {
        let (service, store) = service();
        service.handle(&admin("/addcmd ping pong")).await;
        let before = store.count(&Filter::all()).await.unwrap();

        assert_eq!(service.handle(&member("/addcmd other thing")).await, CommandOutcome::Ignored);
        assert_eq!(service.handle(&member("/delcmd ping")).await, CommandOutcome::Ignored);
        assert_eq!(store.count(&Filter::all()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_empty_list() {
        let (service, _) = service();
        assert_eq!(
            reply_text(service.handle(&member("/cmdlist")).await),
            "No command registered. Register your first command by using **/addcmd**"
        );
    }

    #[tokio::test]
    async fn test_backup_is_json_of_scope() {
        let (service, _) = service();
        service.handle(&admin("/addcmd ping pong")).await;
        service.handle(&CommandRequest { scope: "g2", ..admin("/addcmd other x") }).await;

        match service.handle(&member("/cmdbackup")).await {
            CommandOutcome::File { name, data } => {
                assert!(name.starts_with("cmd-backup-guild-"));
                assert!(name.ends_with(".json"));
                let commands: Vec<Command> = serde_json::from_slice(&data).unwrap();
                assert_eq!(commands, vec![Command::new("g1", "ping", "pong", MatchStrategy::Start)]);
            }
            other => panic!("expected file, got {:?}", other),
        }
    }
}
