use futures_util::{
    SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use log::*;
use thiserror::Error;
use tokio::{
    net::TcpStream,
    select,
    sync::mpsc::{self, Receiver},
};
use tokio_tungstenite::{
    WebSocketStream,
    accept_async,
    tungstenite::{self, Message},
};

use crate::{
    home::{Home, Hydration, inventory::ItemChange, navigation::Target},
    protocol::{Operation, Reply},
    server::ServerHandle,
    session::Identity,
    status::{CloseCode, ErrorKind, send_status},
};

/// Who a connection says it is.
#[derive(Debug, Clone)]
pub struct Auth {
    pub user: Option<String>,
    pub revoked: bool,
}

impl Auth {
    pub fn new(user: Option<String>) -> Self {
        Self {
            user,
            revoked: false,
        }
    }
}

impl Identity for Auth {
    fn current_user(&self) -> Option<String> {
        self.user.clone()
    }

    fn revoke(&mut self) {
        self.revoked = true;
    }
}

#[derive(Debug)]
pub enum ClientSignal {
    Close { kind: ErrorKind },
}

#[derive(Debug)]
pub enum Origin {
    Server,
    Client,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("can't encode reply: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stream is finished")]
    StreamFinished,
    #[error("server is dead, can't recieve")]
    DeadServerRx,
    #[error("protocol violation")]
    ProtocolViolation,
    #[error("connection closed by {0:?}")]
    Closed(Origin),
    #[error("server refused to register client")]
    CantRegister,
    #[error("session revoked, user lookup failed with {0}")]
    Revoked(u16),
}

type WsSender = SplitSink<WebSocketStream<TcpStream>, Message>;

/// One connected renderer and the home state it drives.
pub struct Client {
    pub id: u64,
    rx: Receiver<ClientSignal>,
    server: ServerHandle,
    home: Home,
    ws_sender: WsSender,
    ws_receiver: SplitStream<WebSocketStream<TcpStream>>,
}

impl Client {
    pub async fn try_handshake(
        mut server: ServerHandle,
        tcp_stream: TcpStream,
    ) -> Result<Self, ClientError> {
        // accept as websocket; close if error
        let ws_stream = accept_async(tcp_stream).await?;

        // server -> client communication
        let (tx, rx) = mpsc::channel(server.config.mpsc_channel_buffer);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let msg = match ws_receiver.next().await {
            Some(msg) => msg?,
            None => return Err(ClientError::StreamFinished),
        };

        let Some(Operation::Handshake { user }) = parse_operation(&msg) else {
            send_status(&mut ws_sender, ErrorKind::Generic).await;
            return Err(ClientError::ProtocolViolation);
        };
        let mut auth = Auth::new(user);
        let Some(id) = server.register(tx, auth.clone()).await else {
            send_status(&mut ws_sender, ErrorKind::Overloaded).await;
            return Err(ClientError::CantRegister);
        };

        let mut home = Home::new(&server.config.home_settings());
        let hydration = home.hydrate(&mut auth, server.store.as_ref()).await;
        if let Hydration::Revoked(status) = hydration {
            server.unregister(id).await;
            send_status(&mut ws_sender, ErrorKind::Revoked).await;
            return Err(ClientError::Revoked(status));
        }
        info!("Client {id} {auth:?} connected, {hydration:?}");

        let mut client = Self {
            id,
            rx,
            server,
            home,
            ws_sender,
            ws_receiver,
        };
        if let Err(e) = client.send_state().await {
            client.server.unregister(id).await;
            return Err(e);
        }
        Ok(client)
    }

    pub async fn run(mut self) -> Result<(), ClientError> {
        let result = loop {
            select! {
                msg = self.ws_receiver.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => break Err(e.into()),
                        None => break Err(ClientError::StreamFinished),
                    };
                    match self.process_message(msg).await {
                        Ok(()) => {}
                        Err(ClientError::Closed(Origin::Client)) => {
                            send_status(&mut self.ws_sender, ErrorKind::Normal(CloseCode::Normal)).await;
                            break Ok(());
                        }
                        Err(e) => {
                            send_status(&mut self.ws_sender, ErrorKind::Generic).await;
                            break Err(e);
                        }
                    }
                }
                signal = self.rx.recv() => {
                    match signal {
                        None => break Err(ClientError::DeadServerRx),
                        Some(ClientSignal::Close { kind }) => {
                            send_status(&mut self.ws_sender, kind).await;
                            break Err(ClientError::Closed(Origin::Server));
                        }
                    }
                }
            }
        };
        self.server.unregister(self.id).await;
        result
    }

    async fn process_message(&mut self, msg: Message) -> Result<(), ClientError> {
        match msg {
            Message::Text(bytes) => {
                let op: Operation = serde_json::from_str(bytes.as_str())
                    .map_err(|_| ClientError::ProtocolViolation)?;
                let outcome = match op {
                    Operation::Handshake { .. } => return Err(ClientError::ProtocolViolation),
                    Operation::SelectRoom { target } => self.home.select_room(Target::from(target)),
                    Operation::AddRoom { name, stuff } => self.home.add_room(name, stuff),
                    Operation::UpdateItem { room, changes } => ItemChange::from_changes(changes)
                        .and_then(|change| self.home.update_item(&room, change)),
                };
                match outcome {
                    Ok(()) => self.send_state().await,
                    Err(e) => {
                        debug!("Client {} rejected: {e}", self.id);
                        let reply = Reply::Error {
                            kind: e.kind(),
                            message: e.to_string(),
                        };
                        self.send(&reply).await
                    }
                }
            }
            Message::Ping(_) | Message::Pong(_) => Ok(()),
            Message::Close(_) => {
                info!("Client {} closed connection", self.id);
                Err(ClientError::Closed(Origin::Client))
            }
            _ => Err(ClientError::ProtocolViolation),
        }
    }

    async fn send_state(&mut self) -> Result<(), ClientError> {
        let reply = Reply::State {
            state: self.home.view(),
        };
        self.send(&reply).await
    }

    async fn send(&mut self, reply: &Reply) -> Result<(), ClientError> {
        let msg = serde_json::to_string(reply)?;
        Ok(self.ws_sender.send(Message::Text(msg.into())).await?)
    }
}

fn parse_operation(msg: &Message) -> Option<Operation> {
    if !msg.is_text() {
        return None;
    }
    serde_json::from_str(msg.to_text().ok()?).ok()
}
