use std::io::IsTerminal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use codec::{Bundle, Message, PacketDecoder};
use dispatch::Dispatcher;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing_subscriber::EnvFilter;
use transport::{
    FrameCodec, Receiver, ReceiverState, Sender, TcpReceiver, TcpSender, TransportError,
    UdpReceiver, UdpSender,
};

// test suite "constructor"
#[ctor::ctor]
fn init() {
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);

    if std::io::stderr().is_terminal() || in_ci {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init();
    }

    // error traces
    let _ = color_eyre::install();
}

const TIMEOUT: Duration = Duration::from_secs(5);

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

/// A dispatcher forwarding every message matching `pattern` into a channel.
fn forwarding(pattern: &str) -> (Arc<Dispatcher>, UnboundedReceiver<Message>) {
    let (tx, rx) = unbounded_channel();
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register(pattern, forward(tx));
    (dispatcher, rx)
}

fn forward(
    tx: UnboundedSender<Message>,
) -> impl Fn(&Message) -> Result<(), dispatch::HandlerError> + Send + Sync + 'static {
    move |msg: &Message| {
        tx.send(msg.clone())?;
        Ok(())
    }
}

async fn next<T>(rx: &mut UnboundedReceiver<T>) -> eyre::Result<T> {
    tokio::time::timeout(TIMEOUT, rx.recv())
        .await?
        .ok_or_else(|| eyre::eyre!("channel closed"))
}

async fn eventually(condition: impl Fn() -> bool) -> eyre::Result<()> {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            eyre::bail!("condition not reached in time");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

#[tokio::test]
async fn udp_messages_reach_handlers() -> eyre::Result<()> {
    let settings = config::from_str("[udp]\nreceive_buffer_size = 2048\n")?;
    let (tx, mut rx) = unbounded_channel();
    let dispatcher = Arc::new(Dispatcher::with_decoder(PacketDecoder::new(
        settings.decode.max_bundle_depth,
    )));
    dispatcher.register("/synth/*/freq", forward(tx));

    let mut receiver = UdpReceiver::from_settings(dispatcher, &settings.udp);
    let addr = receiver.bind(loopback()).await?;
    receiver.listen()?;
    assert_eq!(receiver.state(), ReceiverState::Listening);

    let mut sender = UdpSender::bind(loopback(), addr).await?;
    sender
        .send(&Message::new("/synth/1/freq").with(440.0f32))
        .await?;
    sender
        .send(
            &Bundle::new()
                .with(&Message::new("/synth/2/freq").with(220.0f32))
                .with(&Message::new("/synth/2/gain").with(0.5f32)),
        )
        .await?;

    let first = next(&mut rx).await?;
    assert_eq!(first.address(), "/synth/1/freq");
    assert_eq!(first.arg(0)?.float32()?, 440.0);
    let second = next(&mut rx).await?;
    assert_eq!(second.address(), "/synth/2/freq");

    receiver.close().await;
    Ok(())
}

#[tokio::test]
async fn udp_malformed_datagram_is_dropped() -> eyre::Result<()> {
    let (dispatcher, mut rx) = forwarding("/*");
    let mut receiver = UdpReceiver::new(dispatcher);
    let addr = receiver.bind(loopback()).await?;
    receiver.listen()?;

    let mut sender = UdpSender::bind(loopback(), addr).await?;
    sender.send_bytes(Bytes::from_static(b"garbage")).await?;
    sender.send_bytes(Bytes::from_static(b"/a\0\0,b\0\0\0\0\0\xff")).await?;
    sender.send(&Message::new("/ok")).await?;

    assert_eq!(next(&mut rx).await?.address(), "/ok");
    assert_eq!(receiver.state(), ReceiverState::Listening);
    receiver.close().await;
    Ok(())
}

#[tokio::test]
async fn receiver_lifecycle() -> eyre::Result<()> {
    let (dispatcher, _rx) = forwarding("/*");
    let mut receiver = UdpReceiver::new(dispatcher);
    assert_eq!(receiver.state(), ReceiverState::Idle);
    assert!(receiver.local_addr().is_none());

    assert!(matches!(
        receiver.listen(),
        Err(TransportError::InvalidState {
            operation: "listen",
            state: ReceiverState::Idle
        })
    ));

    let addr = receiver.bind(loopback()).await?;
    assert_eq!(receiver.state(), ReceiverState::Bound);
    assert_eq!(receiver.local_addr(), Some(addr));
    assert!(matches!(
        receiver.bind(loopback()).await,
        Err(TransportError::InvalidState { .. })
    ));

    receiver.listen()?;
    assert!(receiver.listen().is_err());

    receiver.close().await;
    receiver.close().await;
    assert_eq!(receiver.state(), ReceiverState::Closed);
    assert!(receiver.listen().is_err());
    Ok(())
}

#[tokio::test]
async fn tcp_messages_arrive_in_order() -> eyre::Result<()> {
    let (dispatcher, mut rx) = forwarding("/seq/*");
    let mut receiver = TcpReceiver::new(dispatcher);
    let addr = receiver.bind(loopback()).await?;
    receiver.listen()?;

    let mut sender = TcpSender::connect_to(addr).await?;
    for i in 0..10 {
        sender.send(&Message::new(format!("/seq/{i}")).with(i)).await?;
    }

    for i in 0..10 {
        let msg = next(&mut rx).await?;
        assert_eq!(msg.arg(0)?.int32()?, i);
    }

    let connections = receiver.connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].peer, sender.local_addr()?);

    sender.close().await?;
    eventually(|| receiver.connection_count() == 0).await?;
    receiver.close().await;
    Ok(())
}

#[tokio::test]
async fn tcp_tracks_each_connection() -> eyre::Result<()> {
    let (dispatcher, mut rx) = forwarding("/hello");
    let mut receiver = TcpReceiver::new(dispatcher);
    let addr = receiver.bind(loopback()).await?;
    receiver.listen()?;

    let mut first = TcpSender::connect_to(addr).await?;
    let mut second = TcpSender::connect_to(addr).await?;
    first.send(&Message::new("/hello")).await?;
    second.send(&Message::new("/hello")).await?;
    next(&mut rx).await?;
    next(&mut rx).await?;
    assert_eq!(receiver.connection_count(), 2);

    first.close().await?;
    eventually(|| receiver.connection_count() == 1).await?;
    assert_eq!(receiver.connections()[0].peer, second.local_addr()?);

    receiver.close().await;
    assert_eq!(receiver.connection_count(), 0);
    Ok(())
}

#[tokio::test]
async fn tcp_malformed_packet_keeps_connection() -> eyre::Result<()> {
    let (dispatcher, mut rx) = forwarding("/after");
    let mut receiver = TcpReceiver::new(dispatcher);
    let addr = receiver.bind(loopback()).await?;
    receiver.listen()?;

    let mut sender = TcpSender::connect_to(addr).await?;
    sender.send_bytes(Bytes::from_static(b"nope")).await?;
    sender.send(&Message::new("/after")).await?;

    assert_eq!(next(&mut rx).await?.address(), "/after");
    assert_eq!(receiver.connection_count(), 1);
    receiver.close().await;
    Ok(())
}

#[tokio::test]
async fn tcp_oversized_frame_is_reported() -> eyre::Result<()> {
    let (dispatcher, _rx) = forwarding("/*");
    let mut receiver = TcpReceiver::with_codec(dispatcher, FrameCodec::with_max_size(64));
    let addr = receiver.bind(loopback()).await?;

    let (errors_tx, mut errors) = unbounded_channel();
    receiver.set_error_handler(move |e: &TransportError, peer: Option<SocketAddr>| {
        let too_large = matches!(e, TransportError::FrameTooLarge { size: 1000, max: 64 });
        let _ = errors_tx.send((too_large, peer));
    });
    receiver.listen()?;

    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(&1000u32.to_be_bytes()).await?;

    let (too_large, peer) = next(&mut errors).await?;
    assert!(too_large);
    assert_eq!(peer, Some(stream.local_addr()?));
    eventually(|| receiver.connection_count() == 0).await?;
    receiver.close().await;
    Ok(())
}

#[tokio::test]
async fn close_stops_dispatch() -> eyre::Result<()> {
    let (dispatcher, mut rx) = forwarding("/*");
    let mut receiver = TcpReceiver::new(dispatcher);
    let addr = receiver.bind(loopback()).await?;
    receiver.listen()?;

    let mut sender = TcpSender::connect_to(addr).await?;
    sender.send(&Message::new("/before")).await?;
    assert_eq!(next(&mut rx).await?.address(), "/before");

    receiver.close().await;
    assert_eq!(receiver.state(), ReceiverState::Closed);
    assert_eq!(receiver.connection_count(), 0);

    // the peer is gone, so this may or may not fail
    let _ = sender.send(&Message::new("/after")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn split_stream_round_trip() -> eyre::Result<()> {
    let listener = TcpListener::bind(loopback()).await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        let (mut reader, mut writer) = transport::split(stream);
        while let Some(messages) = reader.next().await {
            for msg in messages? {
                let reply = Message::new("/echo").with(msg.address());
                writer.send(&reply).await?;
            }
        }
        Ok::<_, TransportError>(())
    });

    let (mut reader, mut writer) = transport::connect(addr).await?;
    writer.send(&Message::new("/one")).await?;
    writer.send(&Bundle::new().with(&Message::new("/two"))).await?;

    let mut replies = Vec::new();
    while replies.len() < 2 {
        let messages = tokio::time::timeout(TIMEOUT, reader.next())
            .await?
            .ok_or_else(|| eyre::eyre!("stream ended"))??;
        for msg in messages {
            replies.push(msg.arg(0)?.string()?.to_string());
        }
    }
    assert_eq!(replies, vec!["/one", "/two"]);

    writer.close().await?;
    server.await??;
    Ok(())
}
