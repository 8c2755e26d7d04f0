use futures_util::{SinkExt, stream::SplitSink};
use tokio::net::TcpStream;
pub use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{Message, protocol::CloseFrame},
};

#[derive(Debug, Clone, Copy)]
pub enum ErrorKind {
    Generic,
    Overloaded,
    Revoked,
    Normal(CloseCode),
}

impl ErrorKind {
    pub fn code(&self) -> u16 {
        match self {
            ErrorKind::Generic => 4000,
            ErrorKind::Overloaded => 4003,
            ErrorKind::Revoked => 4006,
            ErrorKind::Normal(c) => (*c).into(),
        }
    }

    pub fn reason(&self) -> String {
        match self {
            ErrorKind::Generic => "Protocol violation".to_owned(),
            ErrorKind::Overloaded => "Server full".to_owned(),
            ErrorKind::Revoked => "Session revoked".to_owned(),
            ErrorKind::Normal(c) => c.to_string(),
        }
    }
}

pub async fn send_status(
    ws_sender: &mut SplitSink<WebSocketStream<TcpStream>, Message>,
    kind: ErrorKind,
) {
    ws_sender
        .send(Message::Close(Some(CloseFrame {
            code: kind.code().into(),
            reason: kind.reason().into(),
        })))
        .await
        .ok();
    ws_sender.flush().await.ok();
}
