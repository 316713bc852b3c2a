//! NotiStream 클라이언트 - 알림 구독 및 수집
//!
//! 서버에 연결해 알림을 구독하고, 청크를 모아 원본 버퍼를 복원한 뒤
//! 서버가 알려준 CRC32 로 검증한다.
//!
//! 사용법:
//!   cargo run --release --bin notistream-client -- [OPTIONS]
//!
//! 예시:
//!   # 기본 수신
//!   cargo run --release --bin notistream-client -- --server 127.0.0.1:9100 --output received.bin
//!
//!   # 2개 청크 후 구독 해제/재구독 (처음부터 다시 받는지 확인)
//!   cargo run --release --bin notistream-client -- --resubscribe-after 2

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use notistream::event::{client_config, ConnectionHandle};
use notistream::message::{
    ConnectAckMessage, DisconnectMessage, Message, WriteClientConfigMessage, MAX_DATAGRAM_SIZE,
};
use notistream::{CollectState, NotificationCollector};

/// 원격 사용자 종료
const REASON_REMOTE_USER: u8 = 0x13;

/// 클라이언트 설정
struct ClientConfig {
    bind_addr: SocketAddr,
    server_addr: SocketAddr,
    output_path: Option<PathBuf>,
    resubscribe_after: Option<u32>,
    timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            server_addr: SocketAddr::from(([127, 0, 0, 1], 9100)),
            output_path: None,
            resubscribe_after: None,
            timeout_secs: 30,
        }
    }
}

fn parse_args() -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--bind" | "-b", Some(v)) => {
                config.bind_addr = v.parse()?;
                i += 1;
            }
            ("--server" | "-s", Some(v)) => {
                config.server_addr = v.parse()?;
                i += 1;
            }
            ("--output" | "-o", Some(v)) => {
                config.output_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--resubscribe-after", Some(v)) => {
                config.resubscribe_after = Some(v.parse()?);
                i += 1;
            }
            ("--timeout", Some(v)) => {
                config.timeout_secs = v.parse()?;
                i += 1;
            }
            ("--help" | "-h", _) => {
                println!(
                    r#"NotiStream Client - 알림 구독 및 수집 클라이언트

사용법:
  cargo run --release --bin notistream-client -- [OPTIONS]

옵션:
  -b, --bind <ADDR>             바인드 주소 (기본: 127.0.0.1:0)
  -s, --server <ADDR>           서버 주소 (기본: 127.0.0.1:9100)
  -o, --output <PATH>           수신 데이터 저장 경로
      --resubscribe-after <N>   N개 청크 수신 후 구독 해제/재구독 (1회)
      --timeout <SECS>          수신 타임아웃 초 (기본: 30)
  -h, --help                    이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            (other, _) => {
                warn!("알 수 없는 옵션 무시: {}", other);
            }
        }
        i += 1;
    }

    Ok(config)
}

struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    ack: ConnectAckMessage,
}

impl Client {
    async fn connect(
        bind_addr: SocketAddr,
        server_addr: SocketAddr,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind(bind_addr).await?;
        socket
            .send_to(&Message::Connect.to_bytes()?, server_addr)
            .await?;

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let ack = loop {
            let (len, addr) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf)).await??;
            if addr != server_addr {
                continue;
            }
            match Message::from_bytes(&buf[..len])? {
                Message::ConnectAck(ack) => break ack,
                Message::Disconnect(d) => {
                    return Err(format!("connection refused, reason 0x{:02x}", d.reason).into())
                }
                _ => continue,
            }
        };

        Ok(Self {
            socket,
            server_addr,
            ack,
        })
    }

    fn connection(&self) -> ConnectionHandle {
        self.ack.connection
    }

    async fn write_client_config(&self, flags: u16) -> Result<(), Box<dyn std::error::Error>> {
        let msg = Message::WriteClientConfig(WriteClientConfigMessage {
            connection: self.ack.connection,
            characteristic: self.ack.characteristic,
            flags,
        });
        self.socket.send_to(&msg.to_bytes()?, self.server_addr).await?;
        Ok(())
    }

    /// 구독 해제 후 재구독 (서버는 처음부터 다시 보냄)
    async fn resubscribe(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.write_client_config(client_config::DISABLED).await?;
        self.write_client_config(client_config::NOTIFICATION).await
    }

    async fn disconnect(&self) -> Result<(), Box<dyn std::error::Error>> {
        let msg = Message::Disconnect(DisconnectMessage {
            connection: self.ack.connection,
            reason: REASON_REMOTE_USER,
        });
        self.socket.send_to(&msg.to_bytes()?, self.server_addr).await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let opts = parse_args()?;

    info!("NotiStream Client starting...");
    info!("Server address: {}", opts.server_addr);

    let client = Client::connect(opts.bind_addr, opts.server_addr).await?;
    info!("Connected as {}", client.connection());
    info!("  Total length: {} bytes", client.ack.total_length);
    info!("  Max packet size: {} bytes", client.ack.max_packet_size);
    info!("  Checksum: {:08X}", client.ack.checksum);

    let mut collector = NotificationCollector::new(
        client.ack.total_length as usize,
        client.ack.max_packet_size as usize,
    );

    client.write_client_config(client_config::NOTIFICATION).await?;
    info!("Subscribed, waiting for notifications...");

    let start = Instant::now();
    let mut resubscribe_after = opts.resubscribe_after;
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let recv_timeout = Duration::from_secs(opts.timeout_secs);

    loop {
        let (len, addr) = timeout(recv_timeout, client.socket.recv_from(&mut buf)).await??;
        if addr != client.server_addr {
            continue;
        }

        let notification = match Message::from_bytes(&buf[..len]) {
            Ok(Message::Notification(n)) if n.connection == client.connection() => n,
            Ok(Message::Disconnect(d)) => {
                warn!("Server closed connection, reason 0x{:02x}", d.reason);
                return Err("connection closed by server".into());
            }
            Ok(_) => continue,
            Err(e) => {
                warn!("잘못된 메시지 무시: {}", e);
                continue;
            }
        };

        match collector.push(&notification.payload) {
            Ok(CollectState::Complete) => break,
            Ok(CollectState::InProgress { received, remaining }) => {
                info!(
                    "Chunk #{}: {} bytes (received {}, remaining {})",
                    collector.chunks_received(),
                    notification.payload.len(),
                    received,
                    remaining
                );

                if resubscribe_after == Some(collector.chunks_received()) {
                    info!("Resubscribing after {} chunks", collector.chunks_received());
                    resubscribe_after = None;
                    collector.reset();
                    client.resubscribe().await?;
                }
            }
            Err(e) => {
                // 규칙 위반: 처음부터 다시 받음
                warn!("청크 검증 실패, 재구독: {}", e);
                collector.reset();
                client.resubscribe().await?;
            }
        }
    }

    let elapsed = start.elapsed();
    let checksum = collector.checksum();
    let verified = checksum == client.ack.checksum;

    info!("Transfer complete!");
    info!("  Time: {:.2}s", elapsed.as_secs_f64());
    info!("  Chunks: {}", collector.chunks_received());
    info!(
        "  Checksum: {:08X} ({})",
        checksum,
        if verified { "OK" } else { "MISMATCH" }
    );

    client.write_client_config(client_config::DISABLED).await?;
    client.disconnect().await?;

    if let Some(path) = &opts.output_path {
        std::fs::write(path, collector.received())?;
        info!("Saved to {:?}", path);
    }

    if !verified {
        return Err("checksum mismatch".into());
    }

    Ok(())
}
