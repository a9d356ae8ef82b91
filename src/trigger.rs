use rosc::{encoder, OscMessage, OscPacket};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::info;

use crate::error::TriggerError;

/// リレー側が待ち受けるデフォルトアドレス
pub const DEFAULT_TRIGGER_ADDR: &str = "127.0.0.1:9200";

/// 箱を開けるOSCアドレス
pub const DEFAULT_OSC_ADDRESS: &str = "/jackbox/open";

/// 目標回数到達の通知先
///
/// 完了イベントごとに1回だけ呼ばれる。送りっぱなしで応答は待たず、
/// 失敗しても呼び出し側はログに残すだけで再送しない。
pub trait CompletionTrigger {
    fn signal_completion(&self) -> Result<(), TriggerError>;
}

impl<T: CompletionTrigger + ?Sized> CompletionTrigger for Box<T> {
    fn signal_completion(&self) -> Result<(), TriggerError> {
        (**self).signal_completion()
    }
}

/// 引数なしのOSCメッセージを構築
pub fn build_osc_message(address: &str) -> OscMessage {
    OscMessage {
        addr: address.to_string(),
        args: vec![],
    }
}

/// OSCメッセージをバイト列にエンコード
pub fn encode_osc_message(msg: &OscMessage) -> Result<Vec<u8>, TriggerError> {
    let packet = OscPacket::Message(msg.clone());
    encoder::encode(&packet).map_err(|e| TriggerError::Encode(format!("{:?}", e)))
}

/// UDP/OSC で完了を通知する
pub struct OscTrigger {
    socket: UdpSocket,
    target_addr: SocketAddr,
    message: Vec<u8>,
}

impl OscTrigger {
    pub fn new(target_addr: &str, osc_address: &str) -> Result<Self, TriggerError> {
        let target_addr = target_addr.to_socket_addrs()?.next().ok_or_else(|| {
            TriggerError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("no address for {}", target_addr),
            ))
        })?;
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        // 送信でループを止めない
        socket.set_nonblocking(true)?;
        let message = encode_osc_message(&build_osc_message(osc_address))?;
        Ok(Self {
            socket,
            target_addr,
            message,
        })
    }

    pub fn target_addr(&self) -> SocketAddr {
        self.target_addr
    }
}

impl CompletionTrigger for OscTrigger {
    fn signal_completion(&self) -> Result<(), TriggerError> {
        self.socket.send_to(&self.message, self.target_addr)?;
        info!(target_addr = %self.target_addr, "completion signal sent");
        Ok(())
    }
}

/// アクチュエータなしで動かすとき用。ログだけ出す
#[derive(Debug, Default)]
pub struct LogTrigger;

impl CompletionTrigger for LogTrigger {
    fn signal_completion(&self) -> Result<(), TriggerError> {
        info!("target reached (no actuator configured)");
        Ok(())
    }
}
