//! Disambiguation request server.
//!
//! Plain TCP with one OS thread per connection. Requests and responses are
//! framed as a big-endian `u32` byte length followed by a JSON body; the
//! body is a [`DisambiguationRequest`], echoed back with confidences
//! filled in. Each connection owns a relatedness pool, so concurrent
//! clients never contend on scratch state, only on the store's read lock.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use crate::disambiguation::{self, DisambiguationRequest, PipelineConfig};
use crate::error::ServerError;
use crate::graph::GraphStore;
use crate::pool::RelatednessPool;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    /// Worker threads per connection pool.
    pub pool_threads: usize,
    /// Upper bound on a single request frame.
    pub max_frame: usize,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8382".to_string(),
            pool_threads: 4,
            max_frame: 16 << 20,
            pipeline: PipelineConfig::default(),
        }
    }
}

pub struct Server {
    listener: TcpListener,
    store: Arc<GraphStore>,
    config: ServerConfig,
}

impl Server {
    pub fn bind(store: Arc<GraphStore>, config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.addr).map_err(|source| ServerError::Bind {
            addr: config.addr.clone(),
            source,
        })?;
        info!(addr = %config.addr, "listening for disambiguation requests");
        Ok(Self {
            listener,
            store,
            config,
        })
    }

    /// Address the listener actually bound (relevant with port 0).
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|source| ServerError::Io { source })
    }

    /// Accept connections forever, one handler thread per client.
    pub fn run(&self) -> Result<(), ServerError> {
        for stream in self.listener.incoming() {
            let stream = stream.map_err(|source| ServerError::Io { source })?;
            let store = Arc::clone(&self.store);
            let config = self.config.clone();
            thread::Builder::new()
                .name("semrel-conn".to_string())
                .spawn(move || {
                    let peer = stream
                        .peer_addr()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|_| "<unknown>".to_string());
                    match handle_connection(store, &config, stream) {
                        Ok(served) => info!(peer = %peer, served, "connection closed"),
                        Err(err) => warn!(peer = %peer, error = %err, "connection failed"),
                    }
                })
                .map_err(|source| ServerError::Io { source })?;
        }
        Ok(())
    }
}

fn handle_connection(
    store: Arc<GraphStore>,
    config: &ServerConfig,
    mut stream: TcpStream,
) -> Result<u64, ServerError> {
    let mut pool = RelatednessPool::new(
        store,
        config.pool_threads,
        config.pipeline.relatedness,
        config.pipeline.max_dist,
    );
    let mut served = 0u64;
    loop {
        let Some(body) = read_frame(&mut stream, config.max_frame)? else {
            return Ok(served);
        };
        let mut request: DisambiguationRequest =
            serde_json::from_slice(&body).map_err(|source| ServerError::Decode { source })?;
        disambiguation::disambiguate(&mut pool, &config.pipeline, &mut request)
            .map_err(|err| ServerError::Io {
                source: io::Error::other(err.to_string()),
            })?;
        let response = serde_json::to_vec(&request).map_err(|source| ServerError::Decode { source })?;
        write_frame(&mut stream, &response)?;
        served += 1;
    }
}

/// Read one length-prefixed frame; `None` on clean end of stream.
fn read_frame(stream: &mut TcpStream, max_frame: usize) -> Result<Option<Vec<u8>>, ServerError> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(source) => return Err(ServerError::Io { source }),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_frame {
        return Err(ServerError::FrameTooLarge {
            len,
            max: max_frame,
        });
    }
    let mut body = vec![0u8; len];
    stream
        .read_exact(&mut body)
        .map_err(|source| ServerError::Io { source })?;
    Ok(Some(body))
}

fn write_frame(stream: &mut TcpStream, body: &[u8]) -> Result<(), ServerError> {
    let len = u32::try_from(body.len()).map_err(|_| ServerError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;
    stream
        .write_all(&len.to_be_bytes())
        .and_then(|()| stream.write_all(body))
        .map_err(|source| ServerError::Io { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::{EdgeBatch, StoreConfig};

    fn test_store() -> Arc<GraphStore> {
        let store = GraphStore::new(StoreConfig::default());
        let pred = store.intern("p");
        let x = store.intern("X");
        let y = store.intern("Y");
        let mut batch = EdgeBatch::new();
        batch.add(x, y, pred);
        store.commit_blocking(&mut batch).unwrap();
        store.topology_mut().set_edge_weight(0, 1.0).unwrap();
        Arc::new(store)
    }

    fn spawn_server() -> std::net::SocketAddr {
        let config = ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            pool_threads: 2,
            ..ServerConfig::default()
        };
        let server = Server::bind(test_store(), config).unwrap();
        let addr = server.local_addr().unwrap();
        thread::spawn(move || {
            let _ = server.run();
        });
        addr
    }

    fn roundtrip(stream: &mut TcpStream, request: &serde_json::Value) -> serde_json::Value {
        let body = serde_json::to_vec(request).unwrap();
        stream.write_all(&(body.len() as u32).to_be_bytes()).unwrap();
        stream.write_all(&body).unwrap();
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).unwrap();
        let mut body = vec![0u8; u32::from_be_bytes(len_buf) as usize];
        stream.read_exact(&mut body).unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn serves_a_disambiguation_request() {
        let addr = spawn_server();
        let mut stream = TcpStream::connect(addr).unwrap();
        let request = serde_json::json!({
            "terms": [
                {"term": "x", "candidates": [{"uri": "X"}]},
                {"term": "y", "candidates": [{"uri": "Y"}]},
            ],
            "max_dist": 1,
        });
        let response = roundtrip(&mut stream, &request);
        assert_eq!(response["terms"][0]["candidates"][0]["confidence"], 1.0);
        assert_eq!(response["terms"][1]["candidates"][0]["confidence"], 1.0);
    }

    #[test]
    fn connection_handles_several_requests_in_sequence() {
        let addr = spawn_server();
        let mut stream = TcpStream::connect(addr).unwrap();
        let request = serde_json::json!({
            "terms": [{"term": "x", "candidates": [{"uri": "X"}]}],
        });
        for _ in 0..3 {
            let response = roundtrip(&mut stream, &request);
            assert_eq!(response["terms"][0]["candidates"][0]["confidence"], 1.0);
        }
    }

    #[test]
    fn oversized_frame_drops_the_connection() {
        let addr = spawn_server();
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(&u32::MAX.to_be_bytes()).unwrap();
        stream.flush().unwrap();
        let mut buf = [0u8; 1];
        // Server closes without responding.
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }
}
