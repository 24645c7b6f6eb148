//! Chat client: connects to a relay, logs in automatically and shows every
//! line the server sends. Lines typed by the user are sent as chat unless
//! they are `#` commands.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::ChatError;
use crate::relay::commands::{parse_port, ClientCommand, Directive};
use crate::ui::ChatUi;

/// What the client loop should do after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAction {
    Continue,
    Exit,
}

struct ActiveConnection {
    writer: OwnedWriteHalf,
    reader_task: JoinHandle<()>,
    local_close: Option<oneshot::Sender<()>>,
}

pub struct ChatClient<U: ChatUi + 'static> {
    host: String,
    port: u16,
    login_id: String,
    ui: Arc<U>,
    connection: Option<ActiveConnection>,
    lost_tx: mpsc::UnboundedSender<()>,
    lost_rx: mpsc::UnboundedReceiver<()>,
}

impl<U: ChatUi + 'static> ChatClient<U> {
    pub fn new(config: &ClientConfig, login_id: impl Into<String>, ui: U) -> Self {
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        ChatClient {
            host: config.host.clone(),
            port: config.port,
            login_id: login_id.into(),
            ui: Arc::new(ui),
            connection: None,
            lost_tx,
            lost_rx,
        }
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn login_id(&self) -> &str {
        &self.login_id
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| !c.reader_task.is_finished())
            .unwrap_or(false)
    }

    /// Connect to the configured host/port and send `#login <id>`
    pub async fn open_connection(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(anyhow!("already connected"));
        }
        while self.lost_rx.try_recv().is_ok() {}

        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let (read_half, writer) = stream.into_split();
        let (close_tx, close_rx) = oneshot::channel();
        let reader_task = tokio::spawn(read_loop(read_half, self.ui.clone(), close_rx, self.lost_tx.clone()));
        self.connection = Some(ActiveConnection { writer, reader_task, local_close: Some(close_tx) });
        info!("Connected to {}:{}", self.host, self.port);

        let login = format!("#login {}", self.login_id);
        if let Err(e) = self.send_to_server(&login).await {
            self.ui.display(&format!("Failed to send login: {}", e));
        }
        Ok(())
    }

    /// Close the connection if open. Best-effort: shutdown errors are ignored.
    pub async fn close_connection(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            if let Some(tx) = conn.local_close.take() {
                let _ = tx.send(());
            }
            let _ = conn.writer.shutdown().await;
            let _ = conn.reader_task.await;
            debug!("connection to {}:{} closed", self.host, self.port);
        }
    }

    pub async fn send_to_server(&mut self, line: &str) -> Result<(), ChatError> {
        let conn = self.connection.as_mut().ok_or(ChatError::NotConnected)?;
        if conn.reader_task.is_finished() {
            return Err(ChatError::ConnectionClosed);
        }
        conn.writer.write_all(format!("{}\n", line).as_bytes()).await?;
        Ok(())
    }

    /// Read user lines until EOF, `#quit`, or the server going away
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if self.handle_message_from_ui(&line).await == ClientAction::Exit {
                            break;
                        }
                    }
                    None => {
                        self.close_connection().await;
                        break;
                    }
                },
                Some(()) = self.lost_rx.recv() => {
                    warn!("Server connection lost; terminating client");
                    self.connection = None;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Handle one line typed by the user
    pub async fn handle_message_from_ui(&mut self, message: &str) -> ClientAction {
        if let Some(directive) = Directive::parse(message) {
            return self.handle_command(&directive, message.trim()).await;
        }
        match self.send_to_server(message).await {
            Ok(()) => ClientAction::Continue,
            Err(e) => {
                debug!("send failed: {}", e);
                self.ui.display("Could not send message to server.  Terminating client.");
                self.quit().await
            }
        }
    }

    async fn handle_command(&mut self, directive: &Directive<'_>, raw: &str) -> ClientAction {
        match ClientCommand::from_directive(directive) {
            ClientCommand::Quit => return self.quit().await,
            ClientCommand::Logoff => self.close_connection().await,
            ClientCommand::SetHost(host) => {
                if self.is_connected() {
                    self.ui.display("ERROR: sethost only allowed while logged off.");
                } else if let Some(host) = host {
                    self.host = host.to_string();
                    self.ui.display(&format!("Host set to {}", self.host));
                } else {
                    self.ui.display("Usage: #sethost <host>");
                }
            }
            ClientCommand::SetPort(port) => {
                if self.is_connected() {
                    self.ui.display("ERROR: setport only allowed while logged off.");
                } else if let Some(raw_port) = port {
                    match parse_port(raw_port) {
                        Ok(port) => {
                            self.port = port;
                            self.ui.display(&format!("Port set to {}", self.port));
                        }
                        Err(e) => self.ui.display(&format!("ERROR: {}", e)),
                    }
                } else {
                    self.ui.display("Usage: #setport <port>");
                }
            }
            ClientCommand::Login => {
                if self.is_connected() {
                    self.ui.display("Error: you are already connected");
                } else {
                    match self.open_connection().await {
                        Ok(()) => self.ui.display(&format!("Connected to {}:{}", self.host, self.port)),
                        Err(e) => self.ui.display(&format!("Error: could not connect: {}", e)),
                    }
                }
            }
            ClientCommand::GetHost => self.ui.display(&format!("Host: {}", self.host)),
            ClientCommand::GetPort => self.ui.display(&format!("Port: {}", self.port)),
            ClientCommand::Unknown => self.ui.display(&format!("Unknown command: {}", raw)),
        }
        ClientAction::Continue
    }

    async fn quit(&mut self) -> ClientAction {
        self.close_connection().await;
        ClientAction::Exit
    }
}

/// Show every server line until the server hangs up or the client closes.
async fn read_loop<R, U>(
    reader: R,
    ui: Arc<U>,
    mut local_close: oneshot::Receiver<()>,
    lost: mpsc::UnboundedSender<()>,
) where
    R: AsyncRead + Unpin,
    U: ChatUi + ?Sized,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        tokio::select! {
            biased;
            _ = &mut local_close => {
                ui.display("Connection closed");
                return;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => ui.display(&line),
                Ok(None) | Err(_) => {
                    ui.display("The server is shut down");
                    let _ = lost.send(());
                    return;
                }
            }
        }
    }
}
