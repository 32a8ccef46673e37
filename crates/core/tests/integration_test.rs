//! Integration tests for the full intake server over real TCP.
//!
//! These tests play the agency side by hand: encode frames, pad them to
//! one block, push them through a socket, and read padded blocks back —
//! the same exchange a production agency client performs.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tombola_core::packet::{Bet, Frame, Packet};
use tombola_core::server::{Server, ServerConfig};
use tombola_core::storage::{BetStore, FixedDraw, MemoryStore};
use tombola_core::BLOCK_SIZE;

/// Minimal agency-side client speaking the block protocol.
struct AgencyClient {
    stream: TcpStream,
    id: u8,
}

impl AgencyClient {
    fn connect(addr: SocketAddr, id: u8) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to server");
        Self { stream, id }
    }

    fn send(&mut self, packet: Packet) {
        let bytes = packet.into_frame(self.id).encode();
        let mut block = vec![0u8; BLOCK_SIZE];
        block[..bytes.len()].copy_from_slice(&bytes);
        self.stream.write_all(&block).expect("send block");
    }

    fn recv(&mut self) -> Packet {
        let mut block = vec![0u8; BLOCK_SIZE];
        self.stream.read_exact(&mut block).expect("read block");
        let declared = u16::from_le_bytes([block[2], block[3]]) as usize;
        let frame = Frame::decode(&block[..declared]).expect("decode frame");
        Packet::from_frame(&frame).expect("decode packet")
    }
}

fn bet(agency: u8, document: &str, number: &str) -> Bet {
    Bet {
        agency,
        first_name: "Carla".to_string(),
        last_name: "Suarez".to_string(),
        document: document.to_string(),
        birth_date: "1991-06-23".to_string(),
        number: number.to_string(),
    }
}

fn start_server(agencies: u8, winning: &str) -> (SocketAddr, Arc<MemoryStore>, thread::JoinHandle<()>) {
    let store = Arc::new(MemoryStore::new());
    let server = Server::bind(
        &ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            agencies,
        },
        Arc::clone(&store) as Arc<dyn BetStore>,
        Arc::new(FixedDraw::new(winning)),
    )
    .expect("bind server");

    let addr = server.local_addr().unwrap();
    let runner = thread::spawn(move || server.run().expect("server run"));
    (addr, store, runner)
}

#[test]
fn test_full_intake_and_gated_winner_disclosure() {
    let (addr, store, runner) = start_server(3, "7574");

    // Agency 1 submits a batch with one winner and finishes.
    let mut agency1 = AgencyClient::connect(addr, 1);
    agency1.send(Packet::Batch(vec![
        bet(1, "100", "7574"),
        bet(1, "101", "2222"),
    ]));
    assert_eq!(
        agency1.recv(),
        Packet::BatchAck {
            status: "1".to_string()
        }
    );
    agency1.send(Packet::Finished);
    agency1.recv();

    // Not everyone has finished: the query must come back "not ready".
    agency1.send(Packet::WinnerQuery);
    assert_eq!(
        agency1.recv(),
        Packet::WinnerResult {
            ready: false,
            numbers: vec![]
        }
    );

    // Agency 2 submits two winners; agency 3 finishes without bets.
    let mut agency2 = AgencyClient::connect(addr, 2);
    agency2.send(Packet::Batch(vec![
        bet(2, "200", "7574"),
        bet(2, "201", "7574"),
    ]));
    agency2.recv();
    agency2.send(Packet::Finished);
    agency2.recv();

    let mut agency3 = AgencyClient::connect(addr, 3);
    agency3.send(Packet::Finished);
    agency3.recv();

    // Barrier is open: each agency sees exactly its own winners.
    agency1.send(Packet::WinnerQuery);
    assert_eq!(
        agency1.recv(),
        Packet::WinnerResult {
            ready: true,
            numbers: vec!["7574".to_string()]
        }
    );

    agency2.send(Packet::WinnerQuery);
    assert_eq!(
        agency2.recv(),
        Packet::WinnerResult {
            ready: true,
            numbers: vec!["7574".to_string(), "7574".to_string()]
        }
    );

    agency3.send(Packet::WinnerQuery);
    assert_eq!(
        agency3.recv(),
        Packet::WinnerResult {
            ready: true,
            numbers: vec![]
        }
    );

    // Disclosure closed agency 1-3's connections server-side; dropping our
    // ends lets the run complete.
    drop(agency1);
    drop(agency2);
    drop(agency3);
    runner.join().unwrap();

    assert_eq!(store.scan_all().unwrap().len(), 4);
}

#[test]
fn test_single_bet_is_acked_and_stored() {
    let (addr, store, runner) = start_server(1, "7574");

    let mut agency = AgencyClient::connect(addr, 1);
    agency.send(Packet::Bet(bet(1, "30412765", "7574")));
    assert_eq!(
        agency.recv(),
        Packet::BetAck {
            document: "30412765".to_string(),
            number: "7574".to_string(),
            status: "1".to_string()
        }
    );

    drop(agency);
    runner.join().unwrap();

    let stored = store.scan_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].document, "30412765");
}

#[test]
fn test_malformed_frame_closes_only_that_connection() {
    let (addr, store, runner) = start_server(2, "7574");

    // One client sends garbage; the server must close just that socket.
    let mut bad = TcpStream::connect(addr).unwrap();
    let mut block = vec![0u8; BLOCK_SIZE];
    block[0] = 99; // unknown packet type
    block[2] = 4;
    bad.write_all(&block).unwrap();

    let mut probe = [0u8; 1];
    let closed = match bad.read(&mut probe) {
        Ok(0) => true,
        Ok(_) => false,
        Err(_) => true,
    };
    assert!(closed, "server should close the offending connection");

    // A well-behaved client on the same run is unaffected.
    let mut good = AgencyClient::connect(addr, 1);
    good.send(Packet::Batch(vec![bet(1, "1", "7574")]));
    assert_eq!(
        good.recv(),
        Packet::BatchAck {
            status: "1".to_string()
        }
    );

    drop(good);
    drop(bad);
    runner.join().unwrap();
    assert_eq!(store.scan_all().unwrap().len(), 1);
}

#[test]
fn test_shutdown_stops_accepting_and_joins_workers() {
    let store: Arc<dyn BetStore> = Arc::new(MemoryStore::new());
    let server = Server::bind(
        &ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            agencies: 3,
        },
        store,
        Arc::new(FixedDraw::new("7574")),
    )
    .unwrap();

    let addr = server.local_addr().unwrap();
    let flag = server.shutdown_flag();
    let runner = thread::spawn(move || server.run().expect("server run"));

    // One agency connects and idles; shutdown is requested mid-run.
    let mut agency = AgencyClient::connect(addr, 1);
    agency.send(Packet::Finished);
    agency.recv();

    flag.trigger();

    // The worker notices the flag at its next frame boundary once the
    // client speaks (or hangs up) — hang up here.
    drop(agency);

    // run() must return: accept loop stops within one poll interval and
    // all workers have exited.
    runner.join().unwrap();
}

#[test]
fn test_unfinished_run_waits_for_stragglers() {
    let (addr, _store, runner) = start_server(2, "7574");

    let mut first = AgencyClient::connect(addr, 1);
    first.send(Packet::Finished);
    first.recv();
    drop(first);

    // The run is still waiting for agency 2; give the accept loop a
    // moment, then connect and hang up to let it complete.
    thread::sleep(Duration::from_millis(100));
    let second = TcpStream::connect(addr).unwrap();
    drop(second);

    runner.join().unwrap();
}
