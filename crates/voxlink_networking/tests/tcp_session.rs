//! A session over real sockets on the loopback interface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use voxlink_core::{ContentDatabase, ResourceKey};
use voxlink_networking::{
    ClientConfig, GameClient, NetworkServer, Phase, ServerConfig, TcpServerListener, TcpTransport,
};
use voxlink_world::{ChunkPos, FlatGenerator};

#[test]
fn test_client_joins_over_tcp() {
    let content = Arc::new(ContentDatabase::with_core().unwrap());
    let listener = TcpServerListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig {
        tick_rate: 200,
        view_radius: 1,
        ..ServerConfig::default()
    };
    let mut server = NetworkServer::new(config, Arc::clone(&content), Box::new(FlatGenerator::new(1, 2, 3))).unwrap();
    server.add_listener(Box::new(listener));

    let running = Arc::new(AtomicBool::new(true));
    let server_thread = {
        let running = Arc::clone(&running);
        thread::spawn(move || server.run(&running))
    };

    let transport = TcpTransport::connect(addr).unwrap();
    let mut client = GameClient::connect(Box::new(transport), ClientConfig::named("ada"), content).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while client.world().loaded_count() < 27 {
        client.poll();
        assert!(client.is_alive(), "closed: {:?}", client.close_reason());
        assert!(Instant::now() < deadline, "timed out with {} chunks", client.world().loaded_count());
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(client.phase(), Phase::Gameplay);
    assert!(client.world().chunk(ChunkPos::new(-1, -1, -1)).is_some());
    assert_eq!(client.block_key_at([0, 15, 0]), Some(&ResourceKey::core("grass")));

    running.store(false, Ordering::Release);
    server_thread.join().unwrap();

    // The server says goodbye on shutdown.
    let deadline = Instant::now() + Duration::from_secs(10);
    while client.is_alive() {
        client.poll();
        assert!(Instant::now() < deadline, "server shutdown not observed");
        thread::sleep(Duration::from_millis(2));
    }
}
