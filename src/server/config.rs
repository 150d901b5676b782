//! Server configuration

use std::net::SocketAddr;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Serve the output directory under `/stream/`
    pub serve_output: bool,

    /// Serve the HTML form at `/`
    pub index_page: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            serve_output: true,
            index_page: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Leave `/stream/` to an external file server
    pub fn disable_output_serving(mut self) -> Self {
        self.serve_output = false;
        self
    }

    /// Do not serve the HTML form
    pub fn disable_index_page(mut self) -> Self {
        self.index_page = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 3000);
        assert!(config.serve_output);
        assert!(config.index_page);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
        assert!(config.serve_output);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:3001".parse().unwrap();
        let config = ServerConfig::with_addr(addr)
            .disable_output_serving()
            .disable_index_page();

        assert_eq!(config.bind_addr, addr);
        assert!(!config.serve_output);
        assert!(!config.index_page);
    }
}
