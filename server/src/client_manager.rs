//! Connection tracking for the UDP transport
//!
//! A connection is identified by the remote socket address. This module
//! decides which addresses the server talks to:
//! - Admitting new addresses up to the configured capacity
//! - Recording activity so idle connections can be expired
//! - Reporting timed-out addresses so their sessions can be closed
//!
//! Game sessions themselves live in the world state; this layer only knows
//! about addresses and traffic.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A remote peer the server has heard from
#[derive(Debug)]
pub struct Client {
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received a valid packet from this peer
    pub last_seen: Instant,
    /// Valid packets received so far
    pub packets_received: u64,
}

impl Client {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            last_seen: Instant::now(),
            packets_received: 0,
        }
    }

    /// Records a datagram from this peer
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
        self.packets_received += 1;
    }

    /// Returns true if nothing was received within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Tracks every connection and enforces the server's capacity.
pub struct ClientManager {
    clients: HashMap<SocketAddr, Client>,
    /// Maximum number of concurrent connections allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Admits `addr` on a join, or refreshes it if already known.
    ///
    /// Returns false if `addr` is unknown and the server is at capacity;
    /// the join should then be rejected.
    pub fn admit(&mut self, addr: SocketAddr) -> bool {
        if self.touch(addr) {
            return true;
        }

        // Enforce server capacity limits
        if self.clients.len() >= self.max_clients {
            return false;
        }

        let mut client = Client::new(addr);
        client.touch();
        info!("Connection from {}", addr);
        self.clients.insert(addr, client);
        true
    }

    /// Records a datagram from a known `addr`. Returns false for unknown
    /// addresses, which are never admitted this way.
    pub fn touch(&mut self, addr: SocketAddr) -> bool {
        match self.clients.get_mut(&addr) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Forgets a connection. Returns false if it was already gone.
    pub fn remove_client(&mut self, addr: &SocketAddr) -> bool {
        if self.clients.remove(addr).is_some() {
            info!("Connection from {} closed", addr);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.clients.contains_key(addr)
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&Client> {
        self.clients.get(addr)
    }

    /// Removes connections idle for longer than `timeout` and returns
    /// their addresses so the matching sessions can be closed.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<SocketAddr> {
        let timed_out: Vec<SocketAddr> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.addr)
            .collect();

        for addr in &timed_out {
            info!("Connection from {} timed out", addr);
            self.clients.remove(addr);
        }

        timed_out
    }

    /// Returns the number of tracked connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new(test_addr());
        assert_eq!(client.addr, test_addr());
        assert_eq!(client.packets_received, 0);
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(test_addr());

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_admit_and_touch_count_packets() {
        let mut manager = ClientManager::new(2);

        assert!(manager.admit(test_addr()));
        assert!(manager.touch(test_addr()));
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get(&test_addr()).unwrap().packets_received, 2);
    }

    #[test]
    fn test_touch_never_admits() {
        let mut manager = ClientManager::new(2);

        assert!(!manager.touch(test_addr()));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_admit_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.admit(test_addr()));
        assert!(!manager.admit(test_addr2()));
        assert_eq!(manager.len(), 1);
        assert!(!manager.contains(&test_addr2()));

        // Known peers are still let through
        assert!(manager.admit(test_addr()));
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        manager.admit(test_addr());

        assert!(manager.remove_client(&test_addr()));
        assert!(!manager.remove_client(&test_addr()));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(4);
        manager.admit(test_addr());
        manager.admit(test_addr2());

        if let Some(client) = manager.clients.get_mut(&test_addr()) {
            client.last_seen = Instant::now() - Duration::from_secs(30);
        }

        let expired = manager.check_timeouts(Duration::from_secs(10));
        assert_eq!(expired, vec![test_addr()]);
        assert!(!manager.contains(&test_addr()));
        assert!(manager.contains(&test_addr2()));
    }
}
