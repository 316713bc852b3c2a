//! NotiStream 서버 - 구독 기반 주기적 청크 알림
//!
//! 무선 스택 대신 UDP 루프백으로 피어를 받아들이고,
//! 피어가 구독하면 소스 버퍼를 틱마다 한 청크씩 알림으로 보낸다.
//!
//! 사용법:
//!   cargo run --release --bin notistream-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 테스트 패턴 (510 bytes / 244 bytes / 1초)
//!   cargo run --release --bin notistream-server -- --bind 127.0.0.1:9100
//!
//!   # 파일 전송, 빠른 틱
//!   cargo run --release --bin notistream-server -- -f data.bin --tick-ms 20

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use notistream::event::{ConnectionHandle, PeerEvent, StatusFlags};
use notistream::message::{ConnectAckMessage, DisconnectMessage, Message};
use notistream::sink::PeerTable;
use notistream::{Config, Notifier, SourceBuffer, UdpSink};

/// 연결 거부 사유 (이미 다른 피어가 연결됨)
const REASON_REJECTED: u8 = 0x0D;

/// 원격 사용자 종료
const REASON_REMOTE_USER: u8 = 0x13;

/// 데이터 소스
enum DataSource {
    TestPattern,
    Random,
    File(PathBuf),
}

/// 서버 설정
struct ServerConfig {
    bind_addr: SocketAddr,
    source: DataSource,
    stats_interval_secs: u64,
    config: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9100)),
            source: DataSource::TestPattern,
            stats_interval_secs: 10,
            config: Config::default(),
        }
    }
}

fn parse_args() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--bind" | "-b", Some(v)) => {
                config.bind_addr = v.parse()?;
                i += 1;
            }
            ("--file" | "-f", Some(v)) => {
                config.source = DataSource::File(PathBuf::from(v));
                i += 1;
            }
            ("--length" | "-l", Some(v)) => {
                config.config.total_length = v.parse()?;
                i += 1;
            }
            ("--packet-size" | "-p", Some(v)) => {
                config.config.max_packet_size = v.parse()?;
                i += 1;
            }
            ("--tick-ms" | "-t", Some(v)) => {
                config.config.tick_interval_ms = v.parse()?;
                i += 1;
            }
            ("--max-failures", Some(v)) => {
                config.config.max_consecutive_failures = v.parse()?;
                i += 1;
            }
            ("--stats-secs", Some(v)) => {
                config.stats_interval_secs = v.parse()?;
                i += 1;
            }
            ("--random", _) => {
                config.source = DataSource::Random;
            }
            ("--help" | "-h", _) => {
                println!(
                    r#"NotiStream Server - 구독 기반 주기적 청크 알림 서버

피어가 알림을 구독하면 소스 버퍼를 틱마다 한 청크씩 전송
- 마지막 청크를 제외하면 모두 최대 패킷 크기
- 구독을 다시 켜면 처음부터 재전송

사용법:
  cargo run --release --bin notistream-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>         바인드 주소 (기본: 127.0.0.1:9100)
  -f, --file <PATH>         전송할 파일 (길이는 파일 크기, 최대 65535)
      --random              난수 버퍼 사용
  -l, --length <N>          테스트 패턴/난수 버퍼 길이 (기본: 510)
  -p, --packet-size <N>     최대 패킷 크기 (기본: 244)
  -t, --tick-ms <MS>        틱 주기 밀리초 (기본: 1000)
      --max-failures <N>    연속 실패 진단 임계값 (기본: 5)
      --stats-secs <S>      통계 출력 주기 초 (기본: 10, 0이면 끔)
  -h, --help                이 도움말 출력

로그 레벨은 RUST_LOG 로 조정 (예: RUST_LOG=notistream=debug)
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

fn load_buffer(server_config: &mut ServerConfig) -> notistream::Result<SourceBuffer> {
    let buffer = match &server_config.source {
        DataSource::TestPattern => {
            info!("Using test pattern ({} bytes)", server_config.config.total_length);
            SourceBuffer::test_pattern(server_config.config.total_length)?
        }
        DataSource::Random => {
            info!("Using random data ({} bytes)", server_config.config.total_length);
            SourceBuffer::random(server_config.config.total_length)?
        }
        DataSource::File(path) => {
            info!("Loading file: {:?}", path);
            let buffer = SourceBuffer::from_file(path)?;
            server_config.config.total_length = buffer.len();
            buffer
        }
    };
    Ok(buffer)
}

/// 제어 메시지 처리 상태
struct ControlState {
    socket: Arc<UdpSocket>,
    peers: PeerTable,
    events: mpsc::Sender<PeerEvent>,
    config: Config,
    checksum: u32,
    next_handle: u8,
}

impl ControlState {
    fn connection_for(&self, addr: SocketAddr) -> Option<ConnectionHandle> {
        self.peers
            .iter()
            .find(|entry| *entry.value() == addr)
            .map(|entry| *entry.key())
    }

    async fn reply(&self, msg: Message, addr: SocketAddr) -> notistream::Result<()> {
        self.socket.send_to(&msg.to_bytes()?, addr).await?;
        Ok(())
    }

    async fn handle(&mut self, msg: Message, addr: SocketAddr) -> notistream::Result<()> {
        match msg {
            Message::Connect => {
                let connection = match self.connection_for(addr) {
                    Some(existing) => existing,
                    None if !self.peers.is_empty() => {
                        info!("Connection refused (single peer): {}", addr);
                        return self
                            .reply(
                                Message::Disconnect(DisconnectMessage {
                                    connection: ConnectionHandle(u8::MAX),
                                    reason: REASON_REJECTED,
                                }),
                                addr,
                            )
                            .await;
                    }
                    None => {
                        let connection = ConnectionHandle(self.next_handle);
                        self.next_handle = self.next_handle.wrapping_add(1) % u8::MAX;
                        self.peers.insert(connection, addr);
                        self.events
                            .send(PeerEvent::ConnectionOpened { connection })
                            .await
                            .map_err(|_| notistream::Error::ChannelError)?;
                        connection
                    }
                };

                info!("Peer connected: {} ({})", addr, connection);
                let total_length = u32::try_from(self.config.total_length).map_err(|_| {
                    notistream::Error::Configuration("total_length가 u32 범위 초과".into())
                })?;
                let max_packet_size = u16::try_from(self.config.max_packet_size).map_err(|_| {
                    notistream::Error::Configuration("max_packet_size가 u16 범위 초과".into())
                })?;
                self.reply(
                    Message::ConnectAck(ConnectAckMessage {
                        connection,
                        characteristic: self.config.characteristic,
                        total_length,
                        max_packet_size,
                        checksum: self.checksum,
                    }),
                    addr,
                )
                .await?;
            }

            Message::WriteClientConfig(write) => {
                if self.connection_for(addr) != Some(write.connection) {
                    debug!("Unknown peer config write ignored: {}", addr);
                    return Ok(());
                }
                self.events
                    .send(PeerEvent::CharacteristicStatus {
                        connection: write.connection,
                        characteristic: write.characteristic,
                        status_flags: StatusFlags::ClientConfig,
                        client_config_flags: write.flags,
                    })
                    .await
                    .map_err(|_| notistream::Error::ChannelError)?;
            }

            Message::Disconnect(disconnect) => {
                if self.connection_for(addr) != Some(disconnect.connection) {
                    return Ok(());
                }
                self.peers.remove(&disconnect.connection);
                info!("Peer disconnected: {} ({})", addr, disconnect.connection);
                self.events
                    .send(PeerEvent::ConnectionClosed {
                        connection: disconnect.connection,
                        reason: disconnect.reason,
                    })
                    .await
                    .map_err(|_| notistream::Error::ChannelError)?;
            }

            other => {
                debug!("Unexpected message from {}: {:?}", addr, other.msg_type());
            }
        }

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

    let mut server_config = parse_args()?;

    info!("NotiStream Server starting...");

    // 소스 버퍼 준비 (설정 오류는 여기서 종료)
    let buffer = load_buffer(&mut server_config)?;
    let config = server_config.config.clone();
    config.validate()?;
    UdpSink::check_packet_size(config.max_packet_size)?;

    info!("Bind address: {}", server_config.bind_addr);
    info!("Packet size: {} bytes", config.max_packet_size);
    info!("Tick interval: {} ms", config.tick_interval_ms);
    info!("Packets per stream: {}", config.packets_per_stream());

    let socket = Arc::new(UdpSocket::bind(server_config.bind_addr).await?);
    let peers: PeerTable = Arc::new(DashMap::new());

    let sink = UdpSink::new(socket.clone(), peers.clone(), config.characteristic);
    let checksum = buffer.checksum();
    let notifier = Notifier::new(config.clone(), buffer, sink)?;
    let stats = notifier.stats();

    let (event_tx, event_rx) = mpsc::channel::<PeerEvent>(64);
    let notifier_task = tokio::spawn(notifier.run(event_rx));

    // 주기적 통계 출력
    if server_config.stats_interval_secs > 0 {
        let stats = stats.clone();
        let period = Duration::from_secs(server_config.stats_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                info!("{}", stats.read().summary());
            }
        });
    }

    let mut control = ControlState {
        socket: socket.clone(),
        peers,
        events: event_tx,
        config,
        checksum,
        next_handle: 1,
    };

    info!("Waiting for peer connection...");

    let mut buf = vec![0u8; 2048];
    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (len, addr) = match result {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("수신 에러: {}", e);
                        continue;
                    }
                };

                let msg = match Message::from_bytes(&buf[..len]) {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!("잘못된 메시지 무시 ({}): {}", addr, e);
                        continue;
                    }
                };

                if let Err(e) = control.handle(msg, addr).await {
                    warn!("메시지 처리 에러: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    // 연결된 피어에 종료 통보
    for entry in control.peers.iter() {
        let msg = Message::Disconnect(DisconnectMessage {
            connection: *entry.key(),
            reason: REASON_REMOTE_USER,
        });
        let _ = socket.send_to(&msg.to_bytes()?, *entry.value()).await;
    }

    drop(control);
    let final_stats = notifier_task.await??;
    info!("Final: {}", final_stats.summary());

    Ok(())
}
