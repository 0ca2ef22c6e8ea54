//! End-to-end tests driving the real wire protocol over real named
//! pipes against an in-process server (one server per test, each on
//! its own pipe path, so tests run in parallel without colliding).

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

use tfs_types::{ALL_TAKEN, BLOCK_SIZE, DIRECT_BLOCKS, NAME_SIZE, OpCode, OpenFlags, SESSION_COUNT};

fn unique_path(tag: &str) -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    // Kept short: client/server pipe paths travel inside a fixed-width
    // `NAME_SIZE`-byte wire field.
    std::env::temp_dir().join(format!("tfs{tag}{}x{n}", std::process::id() % 10_000))
}

fn wait_for_file(path: &Path) {
    for _ in 0..200 {
        if path.exists() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("server pipe never appeared at {}", path.display());
}

fn start_server() -> PathBuf {
    let server_path = unique_path("server");
    let path_for_thread = server_path.clone();
    std::thread::spawn(move || {
        let _ = tfs_server::run(&path_for_thread);
    });
    wait_for_file(&server_path);
    server_path
}

fn name_field(s: &str) -> [u8; NAME_SIZE] {
    tfs_types::WireName::from_str(s).unwrap().as_wire()
}

struct Client {
    server_write: std::fs::File,
    client_read: std::fs::File,
    session_id: i32,
}

impl Client {
    fn mount(server_path: &Path) -> Self {
        let client_path = unique_path("client");
        mkfifo(&client_path, Mode::from_bits_truncate(0o600)).unwrap();

        let reader_path = client_path.clone();
        let reader = std::thread::spawn(move || OpenOptions::new().read(true).open(&reader_path).unwrap());

        let mut server_write = OpenOptions::new().write(true).open(server_path).unwrap();
        let mut frame = vec![OpCode::Mount.to_byte()];
        frame.extend_from_slice(&name_field(client_path.to_str().unwrap()));
        server_write.write_all(&frame).unwrap();

        let mut client_read = reader.join().unwrap();
        let mut session_bytes = [0u8; 4];
        client_read.read_exact(&mut session_bytes).unwrap();
        let session_id = tfs_proto::decode_i32(session_bytes);

        Self { server_write, client_read, session_id }
    }

    fn send(&mut self, frame: &[u8]) {
        self.server_write.write_all(frame).unwrap();
    }

    fn read_i32(&mut self) -> i32 {
        let mut buf = [0u8; 4];
        self.client_read.read_exact(&mut buf).unwrap();
        tfs_proto::decode_i32(buf)
    }

    fn read_i64(&mut self) -> i64 {
        let mut buf = [0u8; 8];
        self.client_read.read_exact(&mut buf).unwrap();
        i64::from_le_bytes(buf)
    }

    fn open(&mut self, name: &str, flags: OpenFlags) -> i32 {
        let mut frame = vec![OpCode::Open.to_byte()];
        frame.extend_from_slice(&tfs_proto::encode_i32(self.session_id));
        frame.extend_from_slice(&name_field(name));
        frame.extend_from_slice(&tfs_proto::encode_i32(flags.bits()));
        self.send(&frame);
        self.read_i32()
    }

    fn close(&mut self, handle: i32) -> i32 {
        let mut frame = vec![OpCode::Close.to_byte()];
        frame.extend_from_slice(&tfs_proto::encode_i32(self.session_id));
        frame.extend_from_slice(&tfs_proto::encode_i32(handle));
        self.send(&frame);
        self.read_i32()
    }

    fn write(&mut self, handle: i32, data: &[u8]) -> i64 {
        let mut frame = vec![OpCode::Write.to_byte()];
        frame.extend_from_slice(&tfs_proto::encode_i32(self.session_id));
        frame.extend_from_slice(&tfs_proto::encode_i32(handle));
        frame.extend_from_slice(&tfs_proto::encode_u64(data.len() as u64));
        frame.extend_from_slice(data);
        self.send(&frame);
        self.read_i64()
    }

    fn read(&mut self, handle: i32, len: u64) -> Vec<u8> {
        let mut frame = vec![OpCode::Read.to_byte()];
        frame.extend_from_slice(&tfs_proto::encode_i32(self.session_id));
        frame.extend_from_slice(&tfs_proto::encode_i32(handle));
        frame.extend_from_slice(&tfs_proto::encode_u64(len));
        self.send(&frame);
        let total = self.read_i64();
        if total < 0 {
            return Vec::new();
        }
        let mut data = vec![0u8; total as usize];
        self.client_read.read_exact(&mut data).unwrap();
        data
    }

    fn unmount(mut self) {
        let mut frame = vec![OpCode::Unmount.to_byte()];
        frame.extend_from_slice(&tfs_proto::encode_i32(self.session_id));
        self.send(&frame);
    }

    fn shutdown(&mut self) -> i32 {
        let mut frame = vec![OpCode::ShutdownAfterAllClosed.to_byte()];
        frame.extend_from_slice(&tfs_proto::encode_i32(self.session_id));
        self.send(&frame);
        self.read_i32()
    }
}

#[test]
fn open_write_read_round_trip() {
    let server_path = start_server();
    let mut client = Client::mount(&server_path);
    assert!(client.session_id >= 0);

    let handle = client.open("/greeting", OpenFlags::CREAT);
    assert!(handle >= 0);
    assert_eq!(client.write(handle, b"hello, tecnicofs"), 16);
    assert_eq!(client.close(handle), 0);

    let reopened = client.open("/greeting", OpenFlags::empty());
    assert_eq!(client.read(reopened, 16), b"hello, tecnicofs");
    assert_eq!(client.close(reopened), 0);

    assert_eq!(client.shutdown(), 0);
    drop(client);
}

#[test]
fn truncate_and_append_flags_behave_as_documented() {
    let server_path = start_server();
    let mut client = Client::mount(&server_path);

    let h = client.open("/notes", OpenFlags::CREAT);
    client.write(h, b"0123456789");
    client.close(h);

    let truncated = client.open("/notes", OpenFlags::TRUNC);
    assert!(client.read(truncated, 10).is_empty());
    client.write(truncated, b"abc");
    client.close(truncated);

    let appended = client.open("/notes", OpenFlags::APPEND);
    client.write(appended, b"def");
    client.close(appended);

    let readback = client.open("/notes", OpenFlags::empty());
    assert_eq!(client.read(readback, 6), b"abcdef");
    client.close(readback);

    client.shutdown();
    drop(client);
}

#[test]
fn write_crosses_direct_into_indirect_blocks() {
    let server_path = start_server();
    let mut client = Client::mount(&server_path);

    let h = client.open("/big", OpenFlags::CREAT);
    let payload = vec![b'z'; BLOCK_SIZE * DIRECT_BLOCKS + 37];
    assert_eq!(client.write(h, &payload), payload.len() as i64);
    client.close(h);

    let h2 = client.open("/big", OpenFlags::empty());
    assert_eq!(client.read(h2, payload.len() as u64), payload);
    client.close(h2);

    client.shutdown();
    drop(client);
}

#[test]
fn write_one_byte_past_a_block_boundary_uses_a_second_direct_block() {
    let server_path = start_server();
    let mut client = Client::mount(&server_path);

    let h = client.open("/b", OpenFlags::CREAT | OpenFlags::TRUNC);
    let payload = vec![0xAAu8; BLOCK_SIZE + 1];
    assert_eq!(client.write(h, &payload), payload.len() as i64);
    client.close(h);

    let h2 = client.open("/b", OpenFlags::empty());
    let data = client.read(h2, payload.len() as u64);
    assert_eq!(data, payload);
    assert!(data.iter().all(|&b| b == 0xAA));
    client.close(h2);

    client.shutdown();
    drop(client);
}

#[test]
fn open_missing_file_without_creat_fails() {
    let server_path = start_server();
    let mut client = Client::mount(&server_path);

    assert_eq!(client.open("/does-not-exist", OpenFlags::empty()), -1);

    client.shutdown();
    drop(client);
}

#[test]
fn close_of_unknown_handle_fails() {
    let server_path = start_server();
    let mut client = Client::mount(&server_path);

    assert_eq!(client.close(999), -1);

    client.shutdown();
    drop(client);
}

#[test]
fn concurrent_sessions_get_distinct_ids_and_independent_handles() {
    let server_path = start_server();
    let mut first = Client::mount(&server_path);
    let mut second = Client::mount(&server_path);
    assert_ne!(first.session_id, second.session_id);

    let h1 = first.open("/from-first", OpenFlags::CREAT);
    let h2 = second.open("/from-second", OpenFlags::CREAT);
    first.write(h1, b"one");
    second.write(h2, b"two");
    first.close(h1);
    second.close(h2);

    let check1 = second.open("/from-first", OpenFlags::empty());
    assert_eq!(second.read(check1, 3), b"one");
    second.close(check1);

    first.shutdown();
    drop(first);
    drop(second);
}

#[test]
fn mount_beyond_session_capacity_returns_all_taken() {
    let server_path = start_server();
    let mut clients: Vec<Client> = (0..SESSION_COUNT).map(|_| Client::mount(&server_path)).collect();
    assert!(clients.iter().all(|c| c.session_id >= 0));

    let overflow = Client::mount(&server_path);
    assert_eq!(overflow.session_id, ALL_TAKEN);

    let mut last = clients.pop().unwrap();
    last.shutdown();
    drop(last);
    for client in clients {
        client.unmount();
    }
}
