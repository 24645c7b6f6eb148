use std::sync::Arc;

use anyhow::Result;
use log::{debug, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::ui::ChatUi;
use super::commands::{parse_port, ConsoleCommand, Directive};
use super::server::ChatServer;

/// Prefix for operator chat lines relayed to clients
pub const SERVER_MSG_PREFIX: &str = "SERVER MSG> ";

/// What the console loop should do after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    Continue,
    Exit,
}

/// Operator console bound to one server.
///
/// Lines starting with `#` are commands against the server's listening
/// state; any other line is operator chat, broadcast to every client.
pub struct ServerConsole<U: ChatUi> {
    server: Arc<ChatServer>,
    ui: U,
}

impl<U: ChatUi> ServerConsole<U> {
    pub fn new(server: Arc<ChatServer>, ui: U) -> Self {
        ServerConsole { server, ui }
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    /// Read lines until EOF or `#quit`
    pub async fn run<R>(&self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if self.handle_line(&line).await == ConsoleAction::Exit {
                break;
            }
        }
        debug!("console input finished");
        Ok(())
    }

    pub async fn handle_line(&self, line: &str) -> ConsoleAction {
        match Directive::parse(line) {
            Some(directive) => self.handle_command(&directive, line.trim()).await,
            None => {
                self.ui.display(line);
                self.server.send_to_all_clients(&format!("{}{}", SERVER_MSG_PREFIX, line));
                ConsoleAction::Continue
            }
        }
    }

    async fn handle_command(&self, directive: &Directive<'_>, raw: &str) -> ConsoleAction {
        match ConsoleCommand::from_directive(directive) {
            ConsoleCommand::Quit => {
                self.server.close().await;
                self.ui.display("Server exiting...");
                return ConsoleAction::Exit;
            }
            ConsoleCommand::Stop => {
                if self.server.stop_listening().await {
                    self.ui.display("Server has stopped listening for connections.");
                } else {
                    self.ui.display("Server is not listening.");
                }
            }
            ConsoleCommand::Close => {
                self.server.close().await;
                self.ui.display("Server closed.");
            }
            ConsoleCommand::SetPort(None) => self.ui.display("Usage: #setport <port>"),
            ConsoleCommand::SetPort(Some(raw_port)) => {
                if self.server.is_listening().await || self.server.number_of_clients() > 0 {
                    self.ui.display("Error: setport only allowed when server is closed.");
                } else {
                    match parse_port(raw_port) {
                        Ok(port) => match self.server.set_port(port).await {
                            Ok(()) => self.ui.display(&format!("Port set to {}", port)),
                            Err(e) => self.ui.display(&format!("Error: {}", e)),
                        },
                        Err(e) => self.ui.display(&format!("Error: {}", e)),
                    }
                }
            }
            ConsoleCommand::Start => {
                if self.server.is_listening().await {
                    self.ui.display("Error: server already listening.");
                } else {
                    match self.server.listen().await {
                        Ok(addr) => {
                            info!("Operator started listener on {}", addr);
                            self.ui.display(&format!("Server listening for connections on port {}", addr.port()));
                        }
                        Err(e) => self.ui.display(&format!("Error: could not start listening: {}", e)),
                    }
                }
            }
            ConsoleCommand::GetPort => {
                self.ui.display(&format!("Port: {}", self.server.port().await));
            }
            ConsoleCommand::Unknown => {
                self.ui.display(&format!("Unknown server command: {}", raw));
            }
        }
        ConsoleAction::Continue
    }
}
